/*
 * SPDX-FileCopyrightText: 2024 Tickcal contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::{CounterArgs, GlobalArgs};
use crate::calibrate::wait_ticks;
use crate::counters::{measure_os_timer_with, OsTimer};
use anyhow::{ensure, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "os-timer",
    about = "Spins on an OS timer and prints its readings next to the cycle counter's.",
    long_about = None
)]
pub struct CliArgs {
    #[arg(short = 'w', long, default_value_t = 1_000)]
    /// How long to spin on the OS timer, in milliseconds.
    pub wait_ms: u64,

    #[clap(flatten)]
    pub counter: CounterArgs,
}

pub fn main(_global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    ensure!(args.wait_ms > 0, "The wait must be at least one millisecond");
    let timer = args.counter.timer.timer();
    let counter = args.counter.counter();
    let target = wait_ticks(timer.frequency(), args.wait_ms);
    log::info!("Spinning for {} OS ticks...", target);

    let (os, cpu) = measure_os_timer_with(&timer, &counter, target);

    println!("    OS Freq: {}", os.frequency);
    println!(
        "   OS Timer: {} -> {} = {} elapsed",
        os.span.start,
        os.span.end,
        os.elapsed()
    );
    if let Some(seconds) = os.seconds() {
        println!(" OS Seconds: {:.4}", seconds);
    }
    println!(
        "  CPU Timer: {} -> {} = {} elapsed",
        cpu.start,
        cpu.end,
        cpu.elapsed()
    );
    Ok(())
}
