/*
 * SPDX-FileCopyrightText: 2024 Tickcal contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Statistics over a stream of measurements.
//!
//! The stream keeps a constant amount of state however many values it
//! ingests, so it can follow a workload repeated for an arbitrary budget.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum MetricsError {
    #[error("Cannot compute metrics of an empty stream")]
    Empty,
    #[error("Non-finite value {0}")]
    NonFinite(f64),
}

/// Structure to compute statistics from a stream
#[derive(Debug, Clone, Copy)]
pub struct MetricsStream {
    count: usize,
    min: f64,
    max: f64,
    avg: f64,
    m2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// The result of [`MetricsStream`]
pub struct Metrics {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    /// Sample standard deviation; zero for a single value.
    pub std: f64,
}

impl Default for MetricsStream {
    fn default() -> Self {
        Self {
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            avg: 0.0,
            m2: 0.0,
        }
    }
}

impl MetricsStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of values ingested so far.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Ingest a value from the stream
    pub fn update(&mut self, value: f64) -> Result<(), MetricsError> {
        if !value.is_finite() {
            return Err(MetricsError::NonFinite(value));
        }
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        // Welford algorithm
        // https://en.wikipedia.org/wiki/Algorithms_for_calculating_variance
        let delta = value - self.avg;
        self.avg += delta / self.count as f64;
        let delta2 = value - self.avg;
        self.m2 += delta * delta2;
        Ok(())
    }

    /// Consume this builder to get the statistics
    pub fn finalize(self) -> Result<Metrics, MetricsError> {
        if self.count == 0 {
            return Err(MetricsError::Empty);
        }
        let var = if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        };

        Ok(Metrics {
            count: self.count,
            min: self.min,
            max: self.max,
            avg: self.avg,
            std: var.sqrt(),
        })
    }
}
