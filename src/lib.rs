/*
 * SPDX-FileCopyrightText: 2024 Tickcal contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

#![doc = include_str!("../README.md")]
// for now we don't need any new feature but we might remove this in the future
#![deny(unstable_features)]
#![deny(trivial_casts)]
#![deny(unconditional_recursion)]
#![deny(clippy::empty_loop)]
#![deny(unreachable_code)]
#![deny(unreachable_pub)]
#![deny(unreachable_patterns)]
#![deny(unused_macro_rules)]
#![deny(unused_doc_comments)]

pub mod calibrate;
#[cfg(feature = "cli")]
pub mod cli;
pub mod counters;
pub mod metrics;
pub mod profile;
pub mod repetition;
pub mod ticks;
pub mod workload;

/// Prelude module to import everything from this crate
pub mod prelude {
    pub use crate::calibrate::*;
    pub use crate::counters::*;
    pub use crate::metrics::*;
    pub use crate::profile::*;
    pub use crate::repetition::*;
    pub use crate::ticks::*;
    pub use crate::workload::*;
}
