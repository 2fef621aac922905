/*
 * SPDX-FileCopyrightText: 2024 Tickcal contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Command-line interface structs, functions, and methods.
//!
//! Each command is implemented as a submodule exposing a `CliArgs` struct
//! and a `main` function.

use crate::calibrate::{Calibration, FrequencyCalibrator};
use crate::counters::{CycleCounter, MicrosecondTimer, MonotonicTimer, OsTimer};
use anyhow::{anyhow, bail, ensure, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::shells::Shell;
use jiff::fmt::friendly::{Designator, Spacing, SpanPrinter};
use jiff::SpanRound;
use std::io::Write;
use std::time::{Duration, SystemTime};

pub mod calibrate;
pub mod os_timer;
pub mod profile;
pub mod repeat;

pub mod build_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));

    pub fn version_string() -> String {
        format!(
            "{}
git info: {} {} {}
build info: built on {} for {} with {}",
            PKG_VERSION,
            GIT_VERSION.unwrap_or(""),
            GIT_COMMIT_HASH.unwrap_or(""),
            match GIT_DIRTY {
                None => "",
                Some(true) => "(dirty)",
                Some(false) => "(clean)",
            },
            BUILT_TIME_UTC,
            TARGET,
            RUSTC_VERSION
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
/// The OS timers usable as calibration reference.
pub enum OsTimerKind {
    /// gettimeofday, in microseconds.
    Micro,
    /// clock_gettime(CLOCK_MONOTONIC), in nanoseconds.
    Mono,
}

impl OsTimerKind {
    pub fn timer(&self) -> Box<dyn OsTimer> {
        match self {
            OsTimerKind::Micro => Box::new(MicrosecondTimer),
            OsTimerKind::Mono => Box::new(MonotonicTimer),
        }
    }
}

/// Shared CLI arguments for commands reading counters.
#[derive(Args, Debug)]
pub struct CounterArgs {
    #[arg(short = 't', long, value_enum, default_value = "micro")]
    /// The OS timer used as reference.
    pub timer: OsTimerKind,

    #[arg(short = 's', long)]
    /// Issue a barrier (isb or lfence) before each hardware-counter read.
    pub serialize: bool,
}

impl CounterArgs {
    pub fn counter(&self) -> CycleCounter {
        if self.serialize {
            CycleCounter::serialized()
        } else {
            CycleCounter::new()
        }
    }
}

/// Shared CLI arguments for commands that calibrate the counter first.
#[derive(Args, Debug)]
pub struct CalibrationArgs {
    #[arg(short = 'w', long, default_value_t = 100)]
    /// How long to spin on the OS timer, in milliseconds.
    pub wait_ms: u64,

    #[arg(long, default_value_t = 10_000)]
    /// The longest accepted calibration wait, in milliseconds.
    pub max_wait_ms: u64,
}

/// Calibrates the cycle counter selected by `counter_args`.
///
/// Fails if the wait is zero or above the configured maximum. An
/// unavailable calibration is not an error, and is logged.
pub fn calibrate_counter(
    counter_args: &CounterArgs,
    calibration_args: &CalibrationArgs,
) -> Result<(CycleCounter, Calibration)> {
    ensure!(
        calibration_args.wait_ms <= calibration_args.max_wait_ms,
        "The calibration wait ({} ms) exceeds the maximum ({} ms)",
        calibration_args.wait_ms,
        calibration_args.max_wait_ms
    );
    let counter = counter_args.counter();
    let calibrator = FrequencyCalibrator::new(counter, counter_args.timer.timer());
    log::info!(
        "Calibrating the cycle counter for {} ms against the {:?} timer...",
        calibration_args.wait_ms,
        counter_args.timer
    );
    let calibration = calibrator.calibrate(calibration_args.wait_ms)?;
    if calibration.is_available() {
        log::info!(
            "Estimated counter frequency: {} Hz",
            calibration.estimated_frequency_hz
        );
    }
    Ok((counter, calibration))
}

/// Parses a size in bytes.
///
/// This function accepts a number possibly followed by a SI or NIST
/// multiplier k, M, G, T, ki, Mi, Gi, or Ti.
pub fn parse_size(arg: &str) -> Result<usize> {
    const PREF_SYMS: [(&str, u64); 8] = [
        ("k", 1E3 as u64),
        ("m", 1E6 as u64),
        ("g", 1E9 as u64),
        ("t", 1E12 as u64),
        ("ki", 1 << 10),
        ("mi", 1 << 20),
        ("gi", 1 << 30),
        ("ti", 1 << 40),
    ];
    let arg = arg.trim().to_ascii_lowercase();
    ensure!(!arg.is_empty(), "empty string");

    arg.chars().position(|c| c.is_alphabetic()).map_or_else(
        || Ok(arg.parse::<usize>()?),
        |pos| {
            let (num, pref_sym) = arg.split_at(pos);
            let multiplier = PREF_SYMS
                .iter()
                .find(|(x, _)| *x == pref_sym)
                .map(|(_, m)| m)
                .ok_or(anyhow!("invalid prefix symbol"))?;
            let size = num
                .trim()
                .parse::<u64>()?
                .checked_mul(*multiplier)
                .ok_or(anyhow!("size overflow"))?;
            Ok(size.try_into()?)
        },
    )
}

/// Parse a duration from a string.
/// If no suffix is given, it is assumed to be in milliseconds.
/// You can use suffixes, the available ones are:
/// - `s` for seconds
/// - `m` for minutes
/// - `h` for hours
/// - `d` for days
///
/// Example: `1d2h3m4s567` this is parsed as: 1 day, 2 hours, 3 minutes, 4 seconds, and 567 milliseconds.
pub fn parse_duration(value: &str) -> Result<Duration> {
    if value.is_empty() {
        bail!("Empty duration string, if you want every 0 milliseconds use `0`.");
    }
    let mut duration = Duration::from_secs(0);
    let mut acc = String::new();
    for c in value.chars() {
        if c.is_ascii_digit() {
            acc.push(c);
        } else if c.is_whitespace() {
            continue;
        } else {
            let dur = acc.parse::<u64>()?;
            let secs = match c {
                's' => Some(dur),
                'm' => dur.checked_mul(60),
                'h' => dur.checked_mul(60 * 60),
                'd' => dur.checked_mul(60 * 60 * 24),
                _ => return Err(anyhow!("Invalid duration suffix: {}", c)),
            };
            duration = secs
                .and_then(|secs| duration.checked_add(Duration::from_secs(secs)))
                .ok_or_else(|| anyhow!("Duration overflow: {}", value))?;
            acc.clear();
        }
    }
    if !acc.is_empty() {
        let dur = acc.parse::<u64>()?;
        duration = duration
            .checked_add(Duration::from_millis(dur))
            .ok_or_else(|| anyhow!("Duration overflow: {}", value))?;
    }
    Ok(duration)
}

fn span_printer() -> SpanPrinter {
    SpanPrinter::new()
        .spacing(Spacing::None)
        .designator(Designator::Compact)
}

fn span_round() -> SpanRound<'static> {
    SpanRound::new()
        .largest(jiff::Unit::Day)
        .smallest(jiff::Unit::Millisecond)
        .days_are_24_hours()
}

fn elapsed_span(elapsed: Duration) -> jiff::Span {
    jiff::Span::new()
        .seconds(elapsed.as_secs() as i64)
        .milliseconds(elapsed.subsec_millis() as i64)
}

/// Pretty-prints a duration in a human-readable format, e.g., `1h2m3s456ms`.
pub fn pretty_print_elapsed(elapsed: Duration) -> String {
    let span = elapsed_span(elapsed);
    match span.round(span_round()) {
        Ok(span) => span_printer().span_to_string(&span),
        Err(_) => format!("{:.3}s", elapsed.as_secs_f64()),
    }
}

pub fn init_envlogger() -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    let start = std::time::Instant::now();
    let printer = span_printer();
    let span_round = span_round();

    builder.format(move |buf, record| {
        let Ok(ts) = jiff::Timestamp::try_from(SystemTime::now()) else {
            return Err(std::io::Error::other("Failed to get timestamp"));
        };
        let style = buf.default_level_style(record.level());
        let span = elapsed_span(start.elapsed())
            .round(span_round)
            .map_err(std::io::Error::other)?;
        writeln!(
            buf,
            "{} {} {style}{}{style:#} [{:?}] {} - {}",
            ts.strftime("%F %T%.3f"),
            printer.span_to_string(&span),
            record.level(),
            std::thread::current().id(),
            record.target(),
            record.args()
        )
    });
    builder.init();
    Ok(())
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    #[arg(long, value_parser = parse_duration, global=true, display_order = 1000)]
    /// How often to log progress. Default is 10s. You can use the suffixes "s"
    /// for seconds, "m" for minutes, "h" for hours, and "d" for days. If no
    /// suffix is provided it is assumed to be in milliseconds.
    /// Example: "1d2h3m4s567" is parsed as 1 day + 2 hours + 3 minutes + 4
    /// seconds + 567 milliseconds = 93784567 milliseconds.
    pub log_interval: Option<Duration>,
}

/// Generates shell completions. Use with `source <(tickcal completions $SHELL)`.
#[derive(Parser, Debug)]
pub struct CompleteArgs {
    shell: Shell,
}

#[derive(Subcommand, Debug)]
pub enum SubCommands {
    Calibrate(calibrate::CliArgs),
    OsTimer(os_timer::CliArgs),
    Profile(profile::CliArgs),
    Repeat(repeat::CliArgs),
    Completions(CompleteArgs),
}

#[derive(Parser, Debug)]
#[command(name = "tickcal", version=build_info::version_string())]
/// Tools to calibrate hardware cycle counters against OS timers and to time
/// workloads with them.
///
/// Noteworthy environment variables:
///
/// RUST_LOG: configuration for env_logger, e.g., `debug` to see the raw
/// calibration readings, or `tickcal=debug` to see only the tickcal logs.
pub struct Cli {
    #[command(subcommand)]
    pub command: SubCommands,
    #[clap(flatten)]
    pub args: GlobalArgs,
}

/// The entry point of the command-line interface.
pub fn cli_main<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let start = std::time::Instant::now();
    let cli = Cli::parse_from(args);
    match cli.command {
        SubCommands::Calibrate(args) => calibrate::main(cli.args, args)?,
        SubCommands::OsTimer(args) => os_timer::main(cli.args, args)?,
        SubCommands::Profile(args) => profile::main(cli.args, args)?,
        SubCommands::Repeat(args) => repeat::main(cli.args, args)?,
        SubCommands::Completions(args) => {
            clap_complete::generate(
                args.shell,
                &mut Cli::command(),
                "tickcal",
                &mut std::io::stdout(),
            );
            return Ok(());
        }
    }

    log::info!(
        "The command took {}",
        pretty_print_elapsed(start.elapsed())
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() -> Result<()> {
        assert_eq!(parse_size("4096")?, 4096);
        assert_eq!(parse_size("4k")?, 4000);
        assert_eq!(parse_size("4Ki")?, 4096);
        assert_eq!(parse_size(" 1Mi ")?, 1 << 20);
        assert!(parse_size("").is_err());
        assert!(parse_size("1x").is_err());
        assert!(parse_size("k").is_err());
        Ok(())
    }

    #[test]
    fn test_parse_duration() -> Result<()> {
        assert_eq!(parse_duration("567")?, Duration::from_millis(567));
        assert_eq!(
            parse_duration("1d2h3m4s567")?,
            Duration::from_millis(93_784_567)
        );
        assert!(parse_duration("").is_err());
        assert!(parse_duration("3x").is_err());
        assert!(parse_duration("999999999999999d").is_err());
        assert!(parse_duration("18446744073709551615s1s").is_err());
        assert_eq!(
            parse_duration("18446744073709551615s")?,
            Duration::from_secs(u64::MAX)
        );
        Ok(())
    }

    #[test]
    fn test_pretty_print_elapsed() {
        assert_eq!(
            pretty_print_elapsed(Duration::from_millis(3_723_456)),
            "1h2m3s456ms"
        );
    }

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_max_wait_is_enforced() {
        let counter_args = CounterArgs {
            timer: OsTimerKind::Micro,
            serialize: false,
        };
        let calibration_args = CalibrationArgs {
            wait_ms: 20_000,
            max_wait_ms: 10_000,
        };
        assert!(calibrate_counter(&counter_args, &calibration_args).is_err());
    }

    #[test]
    fn test_zero_wait_is_rejected() {
        let counter_args = CounterArgs {
            timer: OsTimerKind::Mono,
            serialize: true,
        };
        let calibration_args = CalibrationArgs {
            wait_ms: 0,
            max_wait_ms: 10_000,
        };
        let err = calibrate_counter(&counter_args, &calibration_args).unwrap_err();
        assert!(err
            .downcast_ref::<crate::calibrate::CalibrationError>()
            .is_some());
    }
}
