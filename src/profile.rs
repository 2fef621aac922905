/*
 * SPDX-FileCopyrightText: 2024 Tickcal contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Named sections timed on a hardware counter.
//!
//! A [`Profiler`] reads its counter at the beginning and at the end of each
//! section, and accumulates the ticks per section name. The
//! [report](Profiler::report) gives, for each section, its share of the
//! profiled span (from the first [`begin`](Profiler::begin) to the last
//! [`end`](Profiler::end)), and, if the counter frequency is known, its
//! duration and throughput.
//!
//! ```
//! use tickcal::prelude::*;
//!
//! let mut profiler = Profiler::new(CycleCounter::new(), 0);
//! profiler.time("short", || spin(1_000));
//! let token = profiler.begin_with_bytes("fill", 4096);
//! write_all_bytes(&mut [0; 4096]);
//! profiler.end(token);
//! assert_eq!(profiler.report().sections.len(), 2);
//! ```

use crate::counters::HardwareCounter;
use crate::ticks::{Stamp, Ticks};
use std::fmt;

/// The accumulated measurements of a named section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub ticks: Ticks,
    pub hits: u64,
    pub bytes: u64,
}

/// A section that has begun and must be passed to [`Profiler::end`].
#[derive(Debug)]
#[must_use = "a section token must be passed to Profiler::end"]
pub struct SectionToken {
    index: usize,
    start: Stamp,
    bytes: u64,
}

#[derive(Debug, Clone)]
pub struct Profiler<H> {
    counter: H,
    frequency: u64,
    sections: Vec<Section>,
    first: Option<Stamp>,
    last: Option<Stamp>,
}

impl<H: HardwareCounter> Profiler<H> {
    /// Creates a profiler reading `counter`, whose frequency is `frequency`
    /// Hz (zero if unknown).
    pub fn new(counter: H, frequency: u64) -> Self {
        Self {
            counter,
            frequency,
            sections: Vec::new(),
            first: None,
            last: None,
        }
    }

    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    /// Begins a section.
    pub fn begin(&mut self, name: &str) -> SectionToken {
        self.begin_with_bytes(name, 0)
    }

    /// Begins a section that processes `bytes` bytes.
    pub fn begin_with_bytes(&mut self, name: &str, bytes: u64) -> SectionToken {
        let index = match self.sections.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.sections.push(Section {
                    name: name.to_owned(),
                    ticks: Ticks(0),
                    hits: 0,
                    bytes: 0,
                });
                self.sections.len() - 1
            }
        };
        let start = Stamp::now(&self.counter);
        self.first.get_or_insert(start);
        SectionToken {
            index,
            start,
            bytes,
        }
    }

    /// Ends a section, returning the ticks it took.
    ///
    /// Tokens must come from this profiler. A token naming a section this
    /// profiler does not have is timed but not recorded.
    pub fn end(&mut self, token: SectionToken) -> Ticks {
        let end = Stamp::now(&self.counter);
        let elapsed = end.since(token.start);
        let Some(section) = self.sections.get_mut(token.index) else {
            log::warn!("Ignoring a section token from another profiler");
            return elapsed;
        };
        section.ticks += elapsed;
        section.hits += 1;
        section.bytes = section.bytes.saturating_add(token.bytes);
        self.last = Some(self.last.map_or(end, |last| last.max(end)));
        elapsed
    }

    /// Runs `f` inside a section named `name`.
    pub fn time<R>(&mut self, name: &str, f: impl FnOnce() -> R) -> R {
        let token = self.begin(name);
        let result = f();
        self.end(token);
        result
    }

    /// Returns the sections in order of first use.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Returns the ticks from the first begin to the last end.
    pub fn total(&self) -> Ticks {
        match (self.first, self.last) {
            (Some(first), Some(last)) => last.since(first),
            _ => Ticks(0),
        }
    }

    pub fn report(&self) -> ProfileReport {
        let total = self.total();
        let sections = self
            .sections
            .iter()
            .map(|section| {
                let seconds = section.ticks.as_secs_f64(self.frequency);
                SectionReport {
                    name: section.name.clone(),
                    ticks: section.ticks,
                    hits: section.hits,
                    percent: section.ticks.percent_of(total),
                    seconds,
                    bytes_per_second: seconds
                        .filter(|&s| s > 0.0 && section.bytes > 0)
                        .map(|s| section.bytes as f64 / s),
                }
            })
            .collect();
        ProfileReport {
            total,
            frequency: self.frequency,
            sections,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionReport {
    pub name: String,
    pub ticks: Ticks,
    pub hits: u64,
    /// Share of the profiled span, in percent.
    pub percent: f64,
    pub seconds: Option<f64>,
    pub bytes_per_second: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileReport {
    pub total: Ticks,
    pub frequency: u64,
    pub sections: Vec<SectionReport>,
}

impl fmt::Display for ProfileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.total.as_secs_f64(self.frequency) {
            Some(seconds) => writeln!(
                f,
                "Total: {} ticks ({:.4} ms @ {} Hz)",
                self.total,
                seconds * 1e3,
                self.frequency
            )?,
            None => writeln!(f, "Total: {} ticks", self.total)?,
        }
        for section in &self.sections {
            write!(
                f,
                "  {:<20} {:>16} ticks {:>7.2}% {:>8} hits",
                section.name, section.ticks, section.percent, section.hits
            )?;
            if let Some(seconds) = section.seconds {
                write!(f, " {:>12.4} ms", seconds * 1e3)?;
            }
            if let Some(throughput) = section.bytes_per_second {
                write!(f, " {:>10.3} GB/s", throughput / 1e9)?;
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
    use crate::counters::OsTimer;

    #[test]
    fn test_sections() {
        // 1 counter tick per nanosecond
        let clock = SimulatedClock::new(1_000_000_000, 1_000_000_000);
        let mut profiler = Profiler::new(clock.hardware_counter(), 1_000_000_000);

        let token = profiler.begin_with_bytes("a", 1_000);
        clock.advance(1_000);
        assert_eq!(profiler.end(token), Ticks(1_000));

        profiler.time("b", || clock.advance(3_000));

        let token = profiler.begin("a");
        clock.advance(1_000);
        profiler.end(token);

        assert_eq!(profiler.total(), Ticks(5_000));
        let sections = profiler.sections();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].name, "a");
        assert_eq!(sections[0].ticks, Ticks(2_000));
        assert_eq!(sections[0].hits, 2);
        assert_eq!(sections[0].bytes, 1_000);
        assert_eq!(sections[1].name, "b");
        assert_eq!(sections[1].ticks, Ticks(3_000));

        let report = profiler.report();
        assert!((report.sections[0].percent - 40.0).abs() < 1e-9);
        assert!((report.sections[1].percent - 60.0).abs() < 1e-9);
        assert_eq!(report.sections[0].seconds, Some(2e-6));
        // 1000 bytes in 2 microseconds
        let throughput = report.sections[0].bytes_per_second.unwrap();
        assert!((throughput - 5e8).abs() < 1e-3);
        assert_eq!(report.sections[1].bytes_per_second, None);
        assert!(report.to_string().contains("Total: 5000 ticks"));
    }

    #[test]
    fn test_unknown_frequency() {
        let clock = SimulatedClock::new(1_000_000, 1_000_000);
        let mut profiler = Profiler::new(clock.hardware_counter(), 0);
        let os = clock.os_timer();
        profiler.time("read", || os.read());
        let report = profiler.report();
        assert_eq!(report.sections[0].seconds, None);
        assert_eq!(report.sections[0].percent, 100.0);
    }

    #[test]
    fn test_foreign_token() {
        let clock = SimulatedClock::new(1_000_000_000, 1_000_000_000);
        let mut other = Profiler::new(clock.hardware_counter(), 1_000_000_000);
        let _ = other.begin("a");
        let token = other.begin("b");

        let mut profiler = Profiler::new(clock.hardware_counter(), 1_000_000_000);
        clock.advance(500);
        assert_eq!(profiler.end(token), Ticks(500));
        assert!(profiler.sections().is_empty());
        assert_eq!(profiler.total(), Ticks(0));
        assert_eq!(other.sections()[1].hits, 0);
    }

    #[test]
    fn test_empty() {
        let clock = SimulatedClock::new(1_000_000, 1_000_000);
        let profiler = Profiler::new(clock.hardware_counter(), 1_000_000);
        assert_eq!(profiler.total(), Ticks(0));
        assert!(profiler.report().sections.is_empty());
    }
}
