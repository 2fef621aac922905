/*
 * SPDX-FileCopyrightText: 2024 Tickcal contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Dual-clock calibration of a hardware counter.
//!
//! The frequency register of a free-running counter may be absent, zero, or
//! wrong when read from unprivileged code. A [`FrequencyCalibrator`]
//! instead busy-waits for a fixed interval on an [OS timer](OsTimer) of
//! known frequency, reading the [hardware counter](HardwareCounter) before
//! and after, and estimates the counter frequency by ratio:
//!
//! ```text
//! estimated_frequency_hz = os_frequency * cpu_elapsed / os_elapsed
//! ```
//!
//! The wait is a spin loop, not a sleep, so that the OS timer is re-read
//! as often as possible. The longer the wait, the smaller the relative
//! weight of the skew between the paired reads at the two ends.

use crate::counters::os::spin_until;
use crate::counters::{HardwareCounter, OsTimer};
use crate::ticks::Ticks;
use thiserror::Error;

const MILLIS_PER_SEC: u128 = 1_000;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("The calibration wait must be at least one millisecond")]
    ZeroWait,
}

/// The outcome of a calibration.
///
/// An `estimated_frequency_hz` of zero means that no calibration was
/// possible because the OS timer did not advance during the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    /// Ticks of the hardware counter elapsed during the wait.
    pub cpu_elapsed_ticks: u64,
    /// Ticks of the OS timer elapsed during the wait.
    pub os_elapsed_ticks: u64,
    /// The frequency of the OS timer used as reference.
    pub os_frequency: u64,
    /// Estimated ticks per second of the hardware counter.
    pub estimated_frequency_hz: u64,
}

impl Calibration {
    /// Returns whether an estimate could be computed.
    pub fn is_available(&self) -> bool {
        self.estimated_frequency_hz != 0
    }

    /// Returns the actual duration of the wait, in seconds.
    pub fn os_seconds(&self) -> Option<f64> {
        Ticks(self.os_elapsed_ticks).as_secs_f64(self.os_frequency)
    }

    /// Returns the relative difference between the estimate and
    /// `reference_hz`, e.g., a frequency reported by the platform.
    pub fn relative_error(&self, reference_hz: u64) -> Option<f64> {
        (reference_hz != 0 && self.is_available()).then(|| {
            (self.estimated_frequency_hz as f64 - reference_hz as f64).abs() / reference_hz as f64
        })
    }
}

/// Estimates the frequency of a counter that advanced by `cpu_elapsed`
/// ticks while a timer at `os_frequency` Hz advanced by `os_elapsed` ticks.
///
/// Returns zero if `os_elapsed` is zero. The product is computed on 128
/// bits, and a quotient not fitting in 64 bits saturates.
pub fn estimate_frequency(os_frequency: u64, cpu_elapsed: u64, os_elapsed: u64) -> u64 {
    if os_elapsed == 0 {
        return 0;
    }
    let freq = os_frequency as u128 * cpu_elapsed as u128 / os_elapsed as u128;
    u64::try_from(freq).unwrap_or(u64::MAX)
}

/// Returns the number of ticks of a timer at `os_frequency` Hz
/// corresponding to `wait_ms` milliseconds, truncating.
pub fn wait_ticks(os_frequency: u64, wait_ms: u64) -> u64 {
    let ticks = os_frequency as u128 * wait_ms as u128 / MILLIS_PER_SEC;
    u64::try_from(ticks).unwrap_or(u64::MAX)
}

/// Calibrates a hardware counter against an OS timer.
///
/// The calibrator holds no state besides its two sources: every call to
/// [`calibrate`](FrequencyCalibrator::calibrate) is independent, and if the
/// sources are [`Sync`] calls from different threads do not interfere.
#[derive(Debug, Clone)]
pub struct FrequencyCalibrator<H, O> {
    counter: H,
    timer: O,
}

impl<H: HardwareCounter, O: OsTimer> FrequencyCalibrator<H, O> {
    pub fn new(counter: H, timer: O) -> Self {
        Self { counter, timer }
    }

    pub fn counter(&self) -> &H {
        &self.counter
    }

    pub fn timer(&self) -> &O {
        &self.timer
    }

    /// Spins for `wait_ms` milliseconds of the OS timer and estimates the
    /// frequency of the hardware counter.
    ///
    /// If `wait_ms` corresponds to zero ticks of the OS timer the timer is
    /// read only once, and the result is the zero sentinel.
    ///
    /// # Errors
    ///
    /// [`CalibrationError::ZeroWait`] if `wait_ms` is zero.
    pub fn calibrate(&self, wait_ms: u64) -> Result<Calibration, CalibrationError> {
        if wait_ms == 0 {
            return Err(CalibrationError::ZeroWait);
        }
        let os_frequency = self.timer.frequency();
        let target = wait_ticks(os_frequency, wait_ms);

        let os_start = self.timer.read();
        let cpu_start = self.counter.read();
        let os_end = spin_until(&self.timer, os_start, target);
        let cpu_end = self.counter.read();

        let cpu_elapsed = cpu_end.saturating_sub(cpu_start);
        let os_elapsed = os_end.saturating_sub(os_start);
        let calibration = Calibration {
            cpu_elapsed_ticks: cpu_elapsed,
            os_elapsed_ticks: os_elapsed,
            os_frequency,
            estimated_frequency_hz: estimate_frequency(os_frequency, cpu_elapsed, os_elapsed),
        };

        if calibration.is_available() {
            log::debug!(
                "Calibrated over {} OS ticks ({} requested): {} counter ticks, {} Hz",
                os_elapsed,
                target,
                cpu_elapsed,
                calibration.estimated_frequency_hz
            );
        } else {
            log::warn!(
                "Calibration unavailable: the OS timer advanced by {} ticks in {} ms",
                os_elapsed,
                wait_ms
            );
        }

        Ok(calibration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::sim::SimulatedClock;

    #[test]
    fn test_scenario() {
        // 10ms at 1MHz is 10_000 OS ticks, during which the counter
        // advances by 24_000 ticks
        assert_eq!(wait_ticks(1_000_000, 10), 10_000);
        assert_eq!(estimate_frequency(1_000_000, 24_000, 10_000), 2_400_000);

        let clock = SimulatedClock::new(1_000_000, 2_400_000);
        let calibrator = FrequencyCalibrator::new(clock.hardware_counter(), clock.os_timer());
        let calibration = calibrator.calibrate(10).unwrap();
        assert_eq!(calibration.os_elapsed_ticks, 10_000);
        assert_eq!(calibration.cpu_elapsed_ticks, 24_000);
        assert_eq!(calibration.estimated_frequency_hz, 2_400_000);
        assert_eq!(calibration.os_seconds(), Some(0.01));
    }

    #[test]
    fn test_zero_wait_is_rejected() {
        let clock = SimulatedClock::new(1_000_000, 2_400_000);
        let calibrator = FrequencyCalibrator::new(clock.hardware_counter(), clock.os_timer());
        assert_eq!(calibrator.calibrate(0), Err(CalibrationError::ZeroWait));
    }

    #[test]
    fn test_zero_os_elapsed() {
        assert_eq!(estimate_frequency(1_000_000, 24_000, 0), 0);
        assert_eq!(estimate_frequency(1_000_000, 0, 0), 0);

        // 1ms of a frozen 100Hz timer truncates to zero ticks
        let clock = SimulatedClock::with_step(100, 2_400_000, 0);
        let calibrator = FrequencyCalibrator::new(clock.hardware_counter(), clock.os_timer());
        let calibration = calibrator.calibrate(1).unwrap();
        assert_eq!(calibration.os_elapsed_ticks, 0);
        assert_eq!(calibration.estimated_frequency_hz, 0);
        assert!(!calibration.is_available());
        assert_eq!(calibration.relative_error(2_400_000), None);
    }

    #[test]
    fn test_no_overflow() {
        // 10s of a 10GHz counter against a nanosecond timer
        let os_frequency = 1_000_000_000;
        let os_elapsed = wait_ticks(os_frequency, 10_000);
        assert_eq!(os_elapsed, 10_000_000_000);
        assert_eq!(
            estimate_frequency(os_frequency, 100_000_000_000, os_elapsed),
            10_000_000_000
        );
        assert_eq!(estimate_frequency(u64::MAX, u64::MAX, 1), u64::MAX);
    }

    #[test]
    fn test_relative_error() {
        let calibration = Calibration {
            cpu_elapsed_ticks: 0,
            os_elapsed_ticks: 1,
            os_frequency: 1,
            estimated_frequency_hz: 110,
        };
        let error = calibration.relative_error(100).unwrap();
        assert!((error - 0.1).abs() < 1e-12);
        assert_eq!(calibration.relative_error(0), None);
    }
}
