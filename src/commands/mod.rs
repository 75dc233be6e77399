// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod doctor;
pub mod exporter;
pub mod inventory;
pub mod payments;
pub mod products;
pub mod purchases;
pub mod receiving;
pub mod reports;
pub mod vendors;
