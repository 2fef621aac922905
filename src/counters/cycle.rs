/*
 * SPDX-FileCopyrightText: 2024 Tickcal contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::HardwareCounter;

/// The free-running cycle counter of the current architecture.
///
/// - On ARM64 this is the virtual count register `cntvct_el0`, and the
///   [reported frequency](HardwareCounter::reported_frequency) is read
///   from `cntfrq_el0`.
/// - On x86-64 this is the time-stamp counter read by `rdtsc`.
/// - On other architectures the counter ticks in nanoseconds since the
///   first read in the process.
///
/// Plain reads may be reordered by the processor with respect to
/// surrounding instructions. A [serialized](CycleCounter::serialized)
/// counter issues a barrier (`isb` on ARM64, `lfence` on x86-64) before
/// each read, which makes reads slower but pins them in program order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleCounter {
    serialize: bool,
}

impl CycleCounter {
    /// Creates a counter issuing plain, non-serialized reads.
    pub const fn new() -> Self {
        Self { serialize: false }
    }

    /// Creates a counter issuing a barrier before each read.
    pub const fn serialized() -> Self {
        Self { serialize: true }
    }

    /// Returns whether reads are serialized.
    pub const fn is_serialized(&self) -> bool {
        self.serialize
    }
}

impl HardwareCounter for CycleCounter {
    #[inline(always)]
    fn read(&self) -> u64 {
        if self.serialize {
            read_counter_serialized()
        } else {
            read_counter()
        }
    }

    fn reported_frequency(&self) -> Option<u64> {
        reported_frequency()
    }
}

#[cfg(target_arch = "aarch64")]
#[inline(always)]
fn read_counter() -> u64 {
    let count: u64;
    // SAFETY: cntvct_el0 is readable from EL0 on every supported OS.
    unsafe {
        core::arch::asm!("mrs {}, cntvct_el0", out(reg) count, options(nomem, nostack));
    }
    count
}

#[cfg(target_arch = "aarch64")]
#[inline(always)]
fn read_counter_serialized() -> u64 {
    let count: u64;
    // SAFETY: see read_counter; isb has no side effects besides ordering.
    unsafe {
        core::arch::asm!(
            "isb",
            "mrs {}, cntvct_el0",
            out(reg) count,
            options(nomem, nostack)
        );
    }
    count
}

#[cfg(target_arch = "aarch64")]
fn reported_frequency() -> Option<u64> {
    let freq: u64;
    // SAFETY: cntfrq_el0 is readable from EL0 on every supported OS.
    unsafe {
        core::arch::asm!("mrs {}, cntfrq_el0", out(reg) freq, options(nomem, nostack));
    }
    // some firmware leaves the register unprogrammed
    (freq != 0).then_some(freq)
}

#[cfg(target_arch = "x86_64")]
#[inline(always)]
#[allow(unused_unsafe)]
fn read_counter() -> u64 {
    // SAFETY: rdtsc is available on every x86-64 processor.
    unsafe { core::arch::x86_64::_rdtsc() }
}

#[cfg(target_arch = "x86_64")]
#[inline(always)]
#[allow(unused_unsafe)]
fn read_counter_serialized() -> u64 {
    use core::arch::x86_64::{_mm_lfence, _rdtsc};
    // SAFETY: lfence is part of SSE2, which is baseline on x86-64.
    unsafe {
        _mm_lfence();
        _rdtsc()
    }
}

#[cfg(target_arch = "x86_64")]
fn reported_frequency() -> Option<u64> {
    // there is no unprivileged architectural register for the TSC rate
    None
}

#[cfg(not(any(target_arch = "aarch64", target_arch = "x86_64")))]
fn epoch() -> &'static std::time::Instant {
    static EPOCH: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    EPOCH.get_or_init(std::time::Instant::now)
}

#[cfg(not(any(target_arch = "aarch64", target_arch = "x86_64")))]
#[inline(always)]
fn read_counter() -> u64 {
    epoch().elapsed().as_nanos() as u64
}

#[cfg(not(any(target_arch = "aarch64", target_arch = "x86_64")))]
#[inline(always)]
fn read_counter_serialized() -> u64 {
    std::sync::atomic::compiler_fence(std::sync::atomic::Ordering::SeqCst);
    read_counter()
}

#[cfg(not(any(target_arch = "aarch64", target_arch = "x86_64")))]
fn reported_frequency() -> Option<u64> {
    Some(1_000_000_000)
}
