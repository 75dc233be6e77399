// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use std::path::PathBuf;

use stockbook::config::{self, Settings};
use stockbook::models::Actor;
use stockbook::{cli, commands, db};

fn main() -> Result<()> {
    let cli = cli::build_cli();
    let matches = cli.get_matches();

    let mut settings = Settings::load().context("Failed to load configuration")?;
    if let Some(path) = matches.get_one::<String>("db") {
        settings.database.path = Some(PathBuf::from(path));
    }
    config::init_tracing(&settings.log);

    let actor = Actor(
        matches
            .get_one::<i64>("actor")
            .copied()
            .unwrap_or(settings.actor_id),
    );
    let mut conn = db::open_or_init(&settings)?;

    match matches.subcommand() {
        Some(("init", _)) => {
            println!(
                "Database initialized at {}",
                db::resolve_path(&settings)?.display()
            );
        }
        Some(("vendor", sub)) => commands::vendors::handle(&conn, actor, sub)?,
        Some(("product", sub)) => commands::products::handle(&conn, actor, sub)?,
        Some(("po", sub)) => commands::purchases::handle(&mut conn, actor, sub)?,
        Some(("receive", sub)) => commands::receiving::handle(&mut conn, actor, sub)?,
        Some(("pay", sub)) => commands::payments::handle(&mut conn, actor, sub)?,
        Some(("batch", sub)) => commands::inventory::handle(&conn, sub)?,
        Some(("report", sub)) => commands::reports::handle(&conn, sub)?,
        Some(("export", sub)) => commands::exporter::handle(&conn, sub)?,
        Some(("doctor", sub)) => commands::doctor::handle(&conn, sub)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
