/*
 * SPDX-FileCopyrightText: 2024 Tickcal contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::{calibrate_counter, parse_size, CalibrationArgs, CounterArgs, GlobalArgs};
use crate::profile::Profiler;
use crate::workload::{spin, write_all_bytes};
use anyhow::{ensure, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "profile",
    about = "Times a sequence of tight loops, and optionally a buffer fill, on the cycle counter.",
    long_about = None
)]
pub struct CliArgs {
    #[arg(
        short = 'i',
        long,
        value_delimiter = ',',
        default_values_t = [1_000u64, 100_000, 1_000_000, 100_000, 10_000]
    )]
    /// The iterations of each tight loop, comma separated.
    pub iterations: Vec<u64>,

    #[arg(short = 'b', long, value_parser = parse_size)]
    /// Also fill a buffer of this size. You can use the SI and NIST
    /// multipliers k, M, G, T, ki, Mi, Gi, and Ti.
    pub fill_bytes: Option<usize>,

    #[clap(flatten)]
    pub counter: CounterArgs,

    #[clap(flatten)]
    pub calibration: CalibrationArgs,
}

pub fn main(_global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    ensure!(
        !args.iterations.is_empty() || args.fill_bytes.is_some(),
        "Nothing to profile"
    );
    let (counter, calibration) = calibrate_counter(&args.counter, &args.calibration)?;
    let mut profiler = Profiler::new(counter, calibration.estimated_frequency_hz);

    let mut buffer = args.fill_bytes.map(|bytes| vec![0u8; bytes]);

    for (i, &iterations) in args.iterations.iter().enumerate() {
        profiler.time(&format!("spin #{} ({})", i + 1, iterations), || spin(iterations));
    }

    if let Some(buffer) = buffer.as_mut() {
        let token = profiler.begin_with_bytes("write_all_bytes", buffer.len() as u64);
        write_all_bytes(buffer);
        profiler.end(token);
    }

    print!("{}", profiler.report());
    Ok(())
}
