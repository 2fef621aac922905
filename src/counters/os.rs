/*
 * SPDX-FileCopyrightText: 2024 Tickcal contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::{HardwareCounter, OsTimer};
use crate::ticks::{Span, Ticks};

/// The wall-clock timer of `gettimeofday`, ticking in microseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct MicrosecondTimer;

impl MicrosecondTimer {
    /// The frequency of the timer.
    pub const FREQUENCY: u64 = 1_000_000;
}

#[cfg(unix)]
impl OsTimer for MicrosecondTimer {
    fn read(&self) -> u64 {
        let mut value = libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        // SAFETY: value is a valid timeval and the timezone may be null.
        unsafe { libc::gettimeofday(&mut value, std::ptr::null_mut()) };
        Self::FREQUENCY * value.tv_sec as u64 + value.tv_usec as u64
    }

    #[inline(always)]
    fn frequency(&self) -> u64 {
        Self::FREQUENCY
    }
}

#[cfg(not(unix))]
impl OsTimer for MicrosecondTimer {
    fn read(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_micros() as u64)
    }

    #[inline(always)]
    fn frequency(&self) -> u64 {
        Self::FREQUENCY
    }
}

/// The monotonic clock of `clock_gettime(CLOCK_MONOTONIC)`, ticking in
/// nanoseconds.
///
/// Unlike [`MicrosecondTimer`], this timer is not affected by changes of
/// the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicTimer;

impl MonotonicTimer {
    /// The frequency of the timer.
    pub const FREQUENCY: u64 = 1_000_000_000;
}

#[cfg(unix)]
impl OsTimer for MonotonicTimer {
    fn read(&self) -> u64 {
        let mut value = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: value is a valid timespec and CLOCK_MONOTONIC always exists.
        unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut value) };
        Self::FREQUENCY * value.tv_sec as u64 + value.tv_nsec as u64
    }

    #[inline(always)]
    fn frequency(&self) -> u64 {
        Self::FREQUENCY
    }
}

#[cfg(not(unix))]
impl OsTimer for MonotonicTimer {
    fn read(&self) -> u64 {
        static EPOCH: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
        EPOCH
            .get_or_init(std::time::Instant::now)
            .elapsed()
            .as_nanos() as u64
    }

    #[inline(always)]
    fn frequency(&self) -> u64 {
        Self::FREQUENCY
    }
}

/// Two readings of an OS timer, together with its frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsTimerSample {
    pub span: Span,
    pub frequency: u64,
}

impl OsTimerSample {
    /// Returns the ticks elapsed between the two readings.
    pub fn elapsed(&self) -> Ticks {
        self.span.elapsed()
    }

    /// Returns the seconds elapsed between the two readings.
    pub fn seconds(&self) -> Option<f64> {
        self.elapsed().as_secs_f64(self.frequency)
    }
}

/// Spins on `timer` until at least `target` ticks have elapsed since
/// `start`, returning the last reading.
///
/// If `target` is zero the timer is not read again and `start` is
/// returned.
#[inline(always)]
pub(crate) fn spin_until<O: OsTimer + ?Sized>(timer: &O, start: u64, target: u64) -> u64 {
    let mut end = start;
    let mut elapsed = 0;
    while elapsed < target {
        std::hint::spin_loop();
        end = timer.read();
        elapsed = end.saturating_sub(start);
    }
    end
}

/// Spins on `timer` for `wait_ticks` of its ticks and returns the first
/// and last reading.
///
/// This checks the OS timer against itself: the elapsed value is at least
/// `wait_ticks`, and the excess is the read granularity of the timer.
pub fn measure_os_timer<O: OsTimer + ?Sized>(timer: &O, wait_ticks: u64) -> OsTimerSample {
    let start = timer.read();
    let end = spin_until(timer, start, wait_ticks);
    OsTimerSample {
        span: Span { start, end },
        frequency: timer.frequency(),
    }
}

/// Like [`measure_os_timer`], but also reads `counter` right after the
/// first timer reading and right after the last one, returning its span.
///
/// The reads happen in the same order as in
/// [`FrequencyCalibrator::calibrate`](crate::calibrate::FrequencyCalibrator::calibrate).
pub fn measure_os_timer_with<O, H>(timer: &O, counter: &H, wait_ticks: u64) -> (OsTimerSample, Span)
where
    O: OsTimer + ?Sized,
    H: HardwareCounter + ?Sized,
{
    let start = timer.read();
    let cpu_start = counter.read();
    let end = spin_until(timer, start, wait_ticks);
    let cpu_end = counter.read();
    (
        OsTimerSample {
            span: Span { start, end },
            frequency: timer.frequency(),
        },
        Span {
            start: cpu_start,
            end: cpu_end,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_microsecond_timer_tracks_system_time() {
        let timer = MicrosecondTimer;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_micros() as u64;
        let read = timer.read();
        // one second of slack for slow CI machines
        assert!(read.abs_diff(now) < MicrosecondTimer::FREQUENCY);
    }

    #[test]
    fn test_monotonic_timer_is_monotonic() {
        let timer = MonotonicTimer;
        let mut last = timer.read();
        for _ in 0..10_000 {
            let now = timer.read();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_measure_os_timer() {
        let timer = MonotonicTimer;
        // 2ms
        let sample = measure_os_timer(&timer, 2_000_000);
        assert!(sample.elapsed().get() >= 2_000_000);
        assert_eq!(sample.frequency, MonotonicTimer::FREQUENCY);
        let seconds = sample.seconds().unwrap();
        assert!(seconds >= 0.002);
    }

    #[test]
    fn test_measure_os_timer_zero_wait() {
        let timer = MicrosecondTimer;
        let sample = measure_os_timer(&timer, 0);
        assert_eq!(sample.span.start, sample.span.end);
        assert_eq!(sample.elapsed(), Ticks(0));
    }

    #[test]
    fn test_measure_os_timer_with_counter() {
        let timer = MicrosecondTimer;
        let counter = crate::counters::CycleCounter::new();
        let (sample, cpu) = measure_os_timer_with(&timer, &counter, 1_000);
        assert!(sample.elapsed().get() >= 1_000);
        assert!(cpu.end >= cpu.start);
    }

    #[test]
    fn test_measure_os_timer_with_reads_timer_first() {
        let clock = crate::counters::SimulatedClock::new(1_000_000, 1_000_000_000);
        let (sample, cpu) =
            measure_os_timer_with(&clock.os_timer(), &clock.hardware_counter(), 10);
        assert_eq!(sample.span, Span { start: 1, end: 11 });
        // the counter is read after each timer read, so the two spans
        // cover the same simulated interval
        assert_eq!(
            cpu,
            Span {
                start: 1_000,
                end: 11_000
            }
        );
    }
}
