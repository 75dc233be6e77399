// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, arg, value_parser};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(arg!(--json "Print as pretty JSON"))
        .arg(arg!(--jsonl "Print as JSON lines"))
}

fn item_arg(help: &'static str) -> Arg {
    Arg::new("item")
        .long("item")
        .value_name("SPEC")
        .help(help)
        .action(ArgAction::Append)
}

fn vendor_fields(cmd: Command) -> Command {
    cmd.arg(arg!(--name <NAME> "Vendor name").required(true))
        .arg(arg!(--contact <PERSON> "Contact person"))
        .arg(arg!(--phone <PHONE> "Phone number"))
        .arg(arg!(--email <EMAIL> "Email address"))
        .arg(arg!(--address <ADDRESS> "Postal address"))
}

fn order_fields(cmd: Command) -> Command {
    cmd.arg(arg!(--vendor <VENDOR_ID> "Vendor id").required(true))
        .arg(arg!(--date <DATE> "Order date (YYYY-MM-DD)").required(true))
        .arg(arg!(--notes <NOTES> "Free-form notes"))
        .arg(item_arg("Line item PRODUCT:QTY:COST:SELL[:EXPIRY], repeatable").required(true))
}

pub fn build_cli() -> Command {
    Command::new("stockbook")
        .about("Purchase orders, stock receiving and vendor payables")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            arg!(--actor <ID> "Audit identity for writes")
                .value_parser(value_parser!(i64))
                .global(true),
        )
        .arg(arg!(--db <PATH> "Database file (overrides config)").global(true))
        .subcommand(Command::new("init").about("Create the database and schema"))
        .subcommand(
            Command::new("vendor")
                .about("Vendor directory")
                .subcommand_required(true)
                .subcommand(vendor_fields(Command::new("add")))
                .subcommand(vendor_fields(
                    Command::new("update").arg(arg!(--id <ID>).required(true)),
                ))
                .subcommand(json_flags(
                    Command::new("list").arg(arg!(--all "Include deactivated vendors")),
                ))
                .subcommand(Command::new("show").arg(arg!(--id <ID>).required(true)))
                .subcommand(Command::new("rm").arg(arg!(--id <ID>).required(true))),
        )
        .subcommand(
            Command::new("product")
                .about("Product catalog")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .arg(arg!(--name <NAME>).required(true))
                        .arg(arg!(--description <TEXT>)),
                )
                .subcommand(json_flags(
                    Command::new("list").arg(arg!(--all "Include deactivated products")),
                ))
                .subcommand(Command::new("show").arg(arg!(--id <ID>).required(true)))
                .subcommand(Command::new("rm").arg(arg!(--id <ID>).required(true))),
        )
        .subcommand(
            Command::new("po")
                .about("Purchase orders")
                .subcommand_required(true)
                .subcommand(order_fields(Command::new("create")))
                .subcommand(order_fields(
                    Command::new("update")
                        .arg(arg!(--id <ID>).required(true))
                        .arg(arg!(--status <STATUS> "draft, ordered or cancelled")),
                ))
                .subcommand(Command::new("cancel").arg(arg!(--id <ID>).required(true)))
                .subcommand(
                    Command::new("show")
                        .arg(arg!(--id <ID>).required(true))
                        .arg(arg!(--json "Print as pretty JSON")),
                )
                .subcommand(json_flags(
                    Command::new("list").arg(arg!(--vendor <VENDOR_ID> "Only this vendor")),
                )),
        )
        .subcommand(
            Command::new("receive")
                .about("Stock receipts")
                .subcommand_required(true)
                .subcommand(
                    Command::new("create")
                        .arg(arg!(--po <ORDER_ID> "Purchase order id").required(true))
                        .arg(arg!(--date <DATE> "Received date (YYYY-MM-DD)").required(true))
                        .arg(arg!(--notes <NOTES>))
                        .arg(item_arg("Received line ORDER_ITEM_ID:QTY, repeatable").required(true)),
                )
                .subcommand(Command::new("show").arg(arg!(--id <ID>).required(true)))
                .subcommand(json_flags(
                    Command::new("list").arg(arg!(--po <ORDER_ID> "Only this order")),
                )),
        )
        .subcommand(
            Command::new("pay")
                .about("Vendor payments")
                .subcommand_required(true)
                .subcommand(
                    Command::new("create")
                        .arg(arg!(--vendor <VENDOR_ID>).required(true))
                        .arg(arg!(--amount <AMOUNT>).required(true))
                        .arg(arg!(--date <DATE> "Payment date (YYYY-MM-DD)").required(true))
                        .arg(
                            arg!(--method <METHOD> "cash, bank_transfer, cheque or upi")
                                .required(true),
                        )
                        .arg(arg!(--reference <REF>))
                        .arg(arg!(--notes <NOTES>))
                        .arg(arg!(--json "Print the allocation as JSON")),
                )
                .subcommand(Command::new("show").arg(arg!(--id <ID>).required(true)))
                .subcommand(json_flags(
                    Command::new("list").arg(arg!(--vendor <VENDOR_ID> "Only this vendor")),
                )),
        )
        .subcommand(
            Command::new("batch")
                .about("Inventory batches")
                .subcommand_required(true)
                .subcommand(json_flags(
                    Command::new("list").arg(arg!(--product <PRODUCT_ID> "Only this product")),
                )),
        )
        .subcommand(
            Command::new("report")
                .about("Payables reports")
                .subcommand_required(true)
                .subcommand(json_flags(Command::new("payables")))
                .subcommand(json_flags(
                    Command::new("aging").arg(arg!(--"as-of" <DATE> "Age as of (default today)")),
                )),
        )
        .subcommand(
            Command::new("export")
                .about("Export data")
                .subcommand_required(true)
                .subcommand(
                    Command::new("statement")
                        .arg(arg!(--vendor <VENDOR_ID>).required(true))
                        .arg(
                            arg!(--format <FORMAT> "csv or json")
                                .value_parser(["csv", "json"])
                                .default_value("csv"),
                        )
                        .arg(arg!(--out <PATH>).required(true)),
                ),
        )
        .subcommand(
            Command::new("doctor")
                .about("Check ledger and order consistency")
                .arg(arg!(--json "Print issues as JSON")),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn items_are_repeatable_and_actor_is_global() {
        let m = build_cli().get_matches_from([
            "stockbook", "po", "create", "--vendor", "v1", "--date", "2025-01-01", "--item",
            "p1:1:2:3", "--item", "p2:4:5:6", "--actor", "42",
        ]);
        assert_eq!(m.get_one::<i64>("actor"), Some(&42));
        let (_, po) = m.subcommand().unwrap();
        let (_, create) = po.subcommand().unwrap();
        assert_eq!(create.get_many::<String>("item").unwrap().count(), 2);
    }
}
