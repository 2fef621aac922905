/*
 * SPDX-FileCopyrightText: 2024 Tickcal contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::{calibrate_counter, parse_size, CalibrationArgs, CounterArgs, GlobalArgs};
use crate::repetition::RepetitionTester;
use crate::workload::write_all_bytes;
use anyhow::{ensure, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "repeat",
    about = "Repeatedly fills a buffer for a time budget and reports the fastest, average, and slowest run.",
    long_about = None
)]
pub struct CliArgs {
    #[arg(short = 'b', long, value_parser = parse_size, default_value = "1Mi")]
    /// The size of the buffer. You can use the SI and NIST multipliers k, M,
    /// G, T, ki, Mi, Gi, and Ti.
    pub bytes: usize,

    #[arg(long, default_value_t = 10)]
    /// The time budget, in seconds.
    pub seconds: u64,

    #[clap(flatten)]
    pub counter: CounterArgs,

    #[clap(flatten)]
    pub calibration: CalibrationArgs,
}

pub fn main(global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    ensure!(args.bytes > 0, "The buffer must not be empty");
    let (counter, calibration) = calibrate_counter(&args.counter, &args.calibration)?;

    let mut tester = RepetitionTester::new(
        counter,
        args.counter.timer.timer(),
        calibration.estimated_frequency_hz,
        args.seconds.saturating_mul(1_000),
    );
    if let Some(duration) = global_args.log_interval {
        tester = tester.log_interval(duration);
    }

    let mut buffer = vec![0u8; args.bytes];
    let report = tester.run(args.bytes as u64, || write_all_bytes(&mut buffer))?;

    print!("{}", report);
    Ok(())
}
