/*
 * SPDX-FileCopyrightText: 2024 Tickcal contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Synthetic workloads to time.

use std::hint::black_box;

/// Runs an empty loop for `iterations` iterations.
///
/// The counter goes through [`black_box`] so that the loop is not removed.
#[inline(never)]
pub fn spin(iterations: u64) {
    let mut i = 0;
    while black_box(i) < iterations {
        i += 1;
    }
}

/// Writes the low byte of each index into the corresponding byte of
/// `buffer`.
#[inline(never)]
pub fn write_all_bytes(buffer: &mut [u8]) {
    for (i, byte) in buffer.iter_mut().enumerate() {
        *byte = i as u8;
    }
    black_box(buffer);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_all_bytes() {
        let mut buffer = vec![0xffu8; 1000];
        write_all_bytes(&mut buffer);
        for (i, byte) in buffer.iter().enumerate() {
            assert_eq!(*byte, (i % 256) as u8);
        }
    }

    #[test]
    fn test_write_empty() {
        write_all_bytes(&mut []);
    }

    #[test]
    fn test_spin_takes_longer_with_more_iterations() {
        use crate::counters::{CycleCounter, HardwareCounter};
        let counter = CycleCounter::new();
        let short = (0..5)
            .map(|_| {
                let start = counter.read();
                spin(1_000);
                counter.read().saturating_sub(start)
            })
            .min()
            .unwrap();
        let long = (0..5)
            .map(|_| {
                let start = counter.read();
                spin(1_000_000);
                counter.read().saturating_sub(start)
            })
            .min()
            .unwrap();
        assert!(long > short);
    }
}
