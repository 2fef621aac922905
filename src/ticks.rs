/*
 * SPDX-FileCopyrightText: 2024 Tickcal contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Counter instants and tick spans.
//!
//! These are the counter-based analogues of [`std::time::Instant`] and
//! [`std::time::Duration`]: a [`Stamp`] is a single reading of a
//! [`HardwareCounter`], and [`Ticks`] is a difference of readings. Ticks
//! become seconds only once a frequency is known, which is what
//! [calibration](crate::calibrate) is for.

use crate::counters::HardwareCounter;
use core::iter::Sum;
use core::ops::{Add, AddAssign};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// A number of counter ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticks(pub u64);

impl Ticks {
    /// Returns the raw number of ticks.
    #[inline(always)]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Converts the ticks to seconds, given the counter frequency in Hz.
    ///
    /// Returns `None` if the frequency is zero (that is, unknown).
    pub fn as_secs_f64(&self, frequency: u64) -> Option<f64> {
        (frequency != 0).then(|| self.0 as f64 / frequency as f64)
    }

    /// Converts the ticks to nanoseconds, given the counter frequency in Hz.
    ///
    /// Returns `None` if the frequency is zero (that is, unknown).
    pub fn as_nanos(&self, frequency: u64) -> Option<u128> {
        (frequency != 0).then(|| self.0 as u128 * NANOS_PER_SEC / frequency as u128)
    }

    /// Returns the fraction of `total` represented by these ticks, as a
    /// percentage. A zero total yields zero.
    pub fn percent_of(&self, total: Ticks) -> f64 {
        if total.0 == 0 {
            0.0
        } else {
            self.0 as f64 / total.0 as f64 * 100.0
        }
    }
}

impl Add for Ticks {
    type Output = Ticks;

    fn add(self, rhs: Ticks) -> Ticks {
        Ticks(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Ticks {
    fn add_assign(&mut self, rhs: Ticks) {
        *self = *self + rhs;
    }
}

impl Sum for Ticks {
    fn sum<I: Iterator<Item = Ticks>>(iter: I) -> Ticks {
        iter.fold(Ticks(0), Add::add)
    }
}

impl core::fmt::Display for Ticks {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reading of a hardware counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Stamp(pub u64);

impl Stamp {
    /// Reads `counter`.
    #[inline(always)]
    pub fn now<H: HardwareCounter + ?Sized>(counter: &H) -> Self {
        Self(counter.read())
    }

    /// Returns the ticks elapsed from this stamp to a new reading of
    /// `counter`.
    #[inline(always)]
    pub fn elapsed<H: HardwareCounter + ?Sized>(&self, counter: &H) -> Ticks {
        Stamp::now(counter).since(*self)
    }

    /// Returns the ticks elapsed from `earlier` to this stamp, or zero if
    /// `earlier` is later.
    #[inline(always)]
    pub fn since(&self, earlier: Stamp) -> Ticks {
        Ticks(self.0.saturating_sub(earlier.0))
    }
}

/// The first and last of two readings of a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: u64,
    pub end: u64,
}

impl Span {
    /// Returns `end - start`, or zero if the counter went backwards.
    #[inline(always)]
    pub fn elapsed(&self) -> Ticks {
        Ticks(self.end.saturating_sub(self.start))
    }
}
