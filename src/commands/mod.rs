// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod charges;
pub mod contracts;
pub mod doctor;
pub mod dorms;
pub mod exporter;
pub mod invoices;
pub mod readings;
pub mod rooms;
pub mod settlements;
