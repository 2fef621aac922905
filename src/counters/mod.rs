/*
 * SPDX-FileCopyrightText: 2024 Tickcal contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Counter sources.
//!
//! A calibration needs exactly two capabilities: a free-running
//! [hardware counter](HardwareCounter) whose frequency is unknown, and an
//! [OS timer](OsTimer) whose frequency is known. Both are plain traits so
//! that the platform layer (or a [simulation](sim::SimulatedClock)) can be
//! injected into the [calibrator](crate::calibrate::FrequencyCalibrator).

mod cycle;
pub(crate) mod os;
pub mod sim;

pub use cycle::CycleCounter;
pub use os::{
    measure_os_timer, measure_os_timer_with, MicrosecondTimer, MonotonicTimer, OsTimerSample,
};
pub use sim::SimulatedClock;

/// A free-running, monotonically non-decreasing tick counter readable
/// without privileges.
///
/// The epoch of the counter is unspecified: only differences between two
/// readings are meaningful.
pub trait HardwareCounter {
    /// Returns the current value of the counter.
    fn read(&self) -> u64;

    /// Returns the frequency declared by the platform, if any.
    ///
    /// Some platforms report zero, or nothing at all, from unprivileged
    /// code, and the value is never used for calibration. It is only
    /// exposed so that callers can compare it with a calibrated estimate.
    fn reported_frequency(&self) -> Option<u64> {
        None
    }
}

/// A timer provided by the operating system with a known, fixed frequency.
pub trait OsTimer {
    /// Returns the current value of the timer, in ticks.
    fn read(&self) -> u64;

    /// Returns the number of ticks per second of the timer.
    fn frequency(&self) -> u64;
}

impl<H: HardwareCounter + ?Sized> HardwareCounter for &H {
    #[inline(always)]
    fn read(&self) -> u64 {
        (**self).read()
    }

    fn reported_frequency(&self) -> Option<u64> {
        (**self).reported_frequency()
    }
}

impl<O: OsTimer + ?Sized> OsTimer for &O {
    #[inline(always)]
    fn read(&self) -> u64 {
        (**self).read()
    }

    #[inline(always)]
    fn frequency(&self) -> u64 {
        (**self).frequency()
    }
}

impl<H: HardwareCounter + ?Sized> HardwareCounter for Box<H> {
    #[inline(always)]
    fn read(&self) -> u64 {
        (**self).read()
    }

    fn reported_frequency(&self) -> Option<u64> {
        (**self).reported_frequency()
    }
}

impl<O: OsTimer + ?Sized> OsTimer for Box<O> {
    #[inline(always)]
    fn read(&self) -> u64 {
        (**self).read()
    }

    #[inline(always)]
    fn frequency(&self) -> u64 {
        (**self).frequency()
    }
}
