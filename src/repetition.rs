/*
 * SPDX-FileCopyrightText: 2024 Tickcal contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Repetition testing.
//!
//! A single timing of a workload is noisy: caches, page faults, and
//! interrupts all show up in it. A [`RepetitionTester`] runs the workload
//! over and over for a fixed time budget, timing each run on the hardware
//! counter, and reports the fastest, average, and slowest run.

use crate::calibrate::wait_ticks;
use crate::counters::{HardwareCounter, OsTimer};
use crate::metrics::{Metrics, MetricsError, MetricsStream};
use crate::ticks::Stamp;
use dsi_progress_logger::prelude::*;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RepetitionTester<H, O> {
    counter: H,
    timer: O,
    frequency: u64,
    budget_ms: u64,
    log_interval: Option<Duration>,
}

impl<H: HardwareCounter, O: OsTimer> RepetitionTester<H, O> {
    /// Creates a tester timing runs on `counter`, whose frequency is
    /// `frequency` Hz (zero if unknown), and measuring the budget of
    /// `budget_ms` milliseconds on `timer`.
    pub fn new(counter: H, timer: O, frequency: u64, budget_ms: u64) -> Self {
        Self {
            counter,
            timer,
            frequency,
            budget_ms,
            log_interval: None,
        }
    }

    /// Sets how often progress is logged.
    pub fn log_interval(mut self, interval: Duration) -> Self {
        self.log_interval = Some(interval);
        self
    }

    /// Runs `workload` until the budget is exhausted, and at least once.
    ///
    /// `bytes` is the number of bytes processed by each run, and is used
    /// only to compute throughput.
    pub fn run(
        &self,
        bytes: u64,
        mut workload: impl FnMut(),
    ) -> Result<RepetitionReport, MetricsError> {
        let target = wait_ticks(self.timer.frequency(), self.budget_ms);
        let mut stream = MetricsStream::new();

        let mut pl = ProgressLogger::default();
        pl.item_name("run");
        if let Some(interval) = self.log_interval {
            pl.log_interval(interval);
        }
        pl.start(format!("Repeating for {} ms...", self.budget_ms));

        let start = self.timer.read();
        loop {
            let stamp = Stamp::now(&self.counter);
            workload();
            let elapsed = stamp.elapsed(&self.counter);
            stream.update(elapsed.get() as f64)?;
            pl.light_update();
            if self.timer.read().saturating_sub(start) >= target {
                break;
            }
        }
        pl.done();

        Ok(RepetitionReport {
            ticks: stream.finalize()?,
            frequency: self.frequency,
            bytes,
        })
    }
}

/// Statistics of the runs of a [`RepetitionTester`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepetitionReport {
    /// Statistics of the counter ticks of each run.
    pub ticks: Metrics,
    pub frequency: u64,
    pub bytes: u64,
}

impl RepetitionReport {
    pub fn runs(&self) -> usize {
        self.ticks.count
    }

    /// Converts a number of ticks to seconds, if the frequency is known.
    pub fn seconds(&self, ticks: f64) -> Option<f64> {
        (self.frequency != 0).then(|| ticks / self.frequency as f64)
    }

    /// Returns the bytes per second of a run taking `ticks` ticks, if the
    /// frequency is known and the run processed some bytes.
    pub fn throughput(&self, ticks: f64) -> Option<f64> {
        self.seconds(ticks)
            .filter(|&s| s > 0.0 && self.bytes > 0)
            .map(|s| self.bytes as f64 / s)
    }
}

impl fmt::Display for RepetitionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Runs: {}", self.runs())?;
        for (label, ticks) in [
            ("Min", self.ticks.min),
            ("Avg", self.ticks.avg),
            ("Max", self.ticks.max),
        ] {
            write!(f, "{}: {:.0} ticks", label, ticks)?;
            if let Some(seconds) = self.seconds(ticks) {
                write!(f, " ({:.6} ms)", seconds * 1e3)?;
            }
            if let Some(throughput) = self.throughput(ticks) {
                write!(f, " {:.3} GB/s", throughput / 1e9)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::sim::SimulatedClock;

    #[test]
    fn test_deterministic_runs() -> Result<(), MetricsError> {
        // the OS timer ticks in microseconds, the counter in nanoseconds
        let clock = SimulatedClock::new(1_000_000, 1_000_000_000);
        let tester = RepetitionTester::new(
            clock.hardware_counter(),
            clock.os_timer(),
            1_000_000_000,
            1,
        );
        let report = tester.run(1_000, || clock.advance(1_000))?;
        // each iteration costs one microsecond of work and one of the
        // budget check
        assert_eq!(report.runs(), 500);
        assert_eq!(report.ticks.min, 1_000.0);
        assert_eq!(report.ticks.max, 1_000.0);
        assert_eq!(report.seconds(report.ticks.min), Some(1e-6));
        let throughput = report.throughput(report.ticks.min).unwrap();
        assert!((throughput - 1e9).abs() < 1e-3);
        assert!(report.to_string().starts_with("Runs: 500"));
        Ok(())
    }

    #[test]
    fn test_long_budget() -> Result<(), MetricsError> {
        let clock = SimulatedClock::new(1_000_000, 1_000_000_000);
        let tester = RepetitionTester::new(
            clock.hardware_counter(),
            clock.os_timer(),
            1_000_000_000,
            600,
        );
        // runs alternate between one and three microseconds, and each
        // budget check costs one more
        let mut slow = false;
        let report = tester.run(1, || {
            clock.advance(if slow { 3_000 } else { 1_000 });
            slow = !slow;
        })?;
        assert_eq!(report.runs(), 200_000);
        assert_eq!(report.ticks.min, 1_000.0);
        assert_eq!(report.ticks.max, 3_000.0);
        assert!((report.ticks.avg - 2_000.0).abs() < 1e-6);
        assert!((report.ticks.std - 1_000.0).abs() < 0.01);
        Ok(())
    }

    #[test]
    fn test_runs_at_least_once() -> Result<(), MetricsError> {
        let clock = SimulatedClock::new(1_000_000, 1_000_000_000);
        let tester = RepetitionTester::new(clock.hardware_counter(), clock.os_timer(), 0, 0);
        let mut runs = 0;
        let report = tester.run(0, || runs += 1)?;
        assert_eq!(runs, 1);
        assert_eq!(report.runs(), 1);
        assert_eq!(report.seconds(report.ticks.min), None);
        assert_eq!(report.throughput(report.ticks.min), None);
        Ok(())
    }
}
