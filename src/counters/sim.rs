/*
 * SPDX-FileCopyrightText: 2024 Tickcal contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! A deterministic clock pair for tests and dry runs.
//!
//! A [`SimulatedClock`] keeps a virtual time in nanoseconds. Its
//! [OS-timer view](SimulatedClock::os_timer) moves the virtual time forward
//! by a fixed step at each read, which is what makes a busy-wait on it
//! terminate; its [counter view](SimulatedClock::hardware_counter) only
//! observes the virtual time, at a configurable tick rate.
//!
//! ```
//! use tickcal::prelude::*;
//!
//! let clock = SimulatedClock::new(1_000_000, 2_400_000);
//! let calibrator = FrequencyCalibrator::new(clock.hardware_counter(), clock.os_timer());
//! let calibration = calibrator.calibrate(10).unwrap();
//! assert_eq!(calibration.estimated_frequency_hz, 2_400_000);
//! ```

use super::{HardwareCounter, OsTimer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const NANOS_PER_SEC: u128 = 1_000_000_000;

#[derive(Debug)]
struct Inner {
    now_ns: AtomicU64,
    os_frequency: u64,
    os_step_ns: u64,
    hardware_rate: u64,
}

/// A shared virtual clock. Clones share the same virtual time.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    inner: Arc<Inner>,
}

impl SimulatedClock {
    /// Creates a clock whose OS timer ticks at `os_frequency` Hz and whose
    /// hardware counter ticks at `hardware_rate` Hz. Each OS-timer read
    /// advances the virtual time by one OS tick (at least one nanosecond).
    pub fn new(os_frequency: u64, hardware_rate: u64) -> Self {
        let os_step_ns = if os_frequency == 0 {
            1
        } else {
            (NANOS_PER_SEC / os_frequency as u128).max(1) as u64
        };
        Self::with_step(os_frequency, hardware_rate, os_step_ns)
    }

    /// Creates a clock as in [`SimulatedClock::new`], but each OS-timer read
    /// advances the virtual time by `os_step_ns` nanoseconds.
    ///
    /// A zero step makes the OS timer frozen: it never advances, so a
    /// busy-wait on it only terminates if its target is zero ticks.
    pub fn with_step(os_frequency: u64, hardware_rate: u64, os_step_ns: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                now_ns: AtomicU64::new(0),
                os_frequency,
                os_step_ns,
                hardware_rate,
            }),
        }
    }

    /// Returns the virtual time in nanoseconds.
    pub fn now_ns(&self) -> u64 {
        self.inner.now_ns.load(Ordering::Relaxed)
    }

    /// Moves the virtual time forward by `ns` nanoseconds.
    pub fn advance(&self, ns: u64) {
        self.inner.now_ns.fetch_add(ns, Ordering::Relaxed);
    }

    /// Returns the OS-timer view of this clock.
    pub fn os_timer(&self) -> SimulatedOsTimer {
        SimulatedOsTimer {
            clock: self.clone(),
        }
    }

    /// Returns the hardware-counter view of this clock.
    pub fn hardware_counter(&self) -> SimulatedCounter {
        SimulatedCounter {
            clock: self.clone(),
        }
    }

    fn scale(ns: u64, rate: u64) -> u64 {
        u64::try_from(ns as u128 * rate as u128 / NANOS_PER_SEC).unwrap_or(u64::MAX)
    }
}

/// The OS-timer view of a [`SimulatedClock`].
#[derive(Debug, Clone)]
pub struct SimulatedOsTimer {
    clock: SimulatedClock,
}

impl OsTimer for SimulatedOsTimer {
    fn read(&self) -> u64 {
        let inner = &self.clock.inner;
        let now = inner.now_ns.fetch_add(inner.os_step_ns, Ordering::Relaxed) + inner.os_step_ns;
        SimulatedClock::scale(now, inner.os_frequency)
    }

    fn frequency(&self) -> u64 {
        self.clock.inner.os_frequency
    }
}

/// The hardware-counter view of a [`SimulatedClock`].
#[derive(Debug, Clone)]
pub struct SimulatedCounter {
    clock: SimulatedClock,
}

impl HardwareCounter for SimulatedCounter {
    fn read(&self) -> u64 {
        SimulatedClock::scale(self.clock.now_ns(), self.clock.inner.hardware_rate)
    }

    fn reported_frequency(&self) -> Option<u64> {
        Some(self.clock.inner.hardware_rate)
    }
}
