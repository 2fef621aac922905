/*
 * SPDX-FileCopyrightText: 2024 Tickcal contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::{calibrate_counter, CalibrationArgs, CounterArgs, GlobalArgs};
use crate::counters::HardwareCounter;
use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "calibrate",
    about = "Estimates the frequency of the cycle counter by spinning on an OS timer.",
    long_about = None
)]
pub struct CliArgs {
    #[clap(flatten)]
    pub counter: CounterArgs,

    #[clap(flatten)]
    pub calibration: CalibrationArgs,
}

pub fn main(_global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    let (counter, calibration) = calibrate_counter(&args.counter, &args.calibration)?;

    println!("     OS Freq: {}", calibration.os_frequency);
    println!("  OS Elapsed: {}", calibration.os_elapsed_ticks);
    if let Some(seconds) = calibration.os_seconds() {
        println!("  OS Seconds: {:.4}", seconds);
    }
    println!(" CPU Elapsed: {}", calibration.cpu_elapsed_ticks);

    if !calibration.is_available() {
        println!("    CPU Freq: unavailable");
        return Ok(());
    }
    println!("    CPU Freq: {}", calibration.estimated_frequency_hz);

    match counter.reported_frequency() {
        Some(reported) => {
            println!("    Reported: {}", reported);
            if let Some(error) = calibration.relative_error(reported) {
                println!("  Difference: {:.3}%", error * 100.0);
            }
        }
        None => println!("    Reported: none"),
    }
    Ok(())
}
