//! System load probes.
//!
//! The dispatcher asks a [`LoadProbe`] how busy the host is before choosing
//! a worker count. Load is normalised so that `1.0` means every core is busy.

use std::path::PathBuf;

/// Load reported when no measurement is available.
pub const DEFAULT_LOAD: f64 = 0.5;

/// Source of the current normalised system load.
pub trait LoadProbe: Send + Sync {
    /// Current load, where `1.0` means fully loaded.
    fn current_load(&self) -> f64;
}

/// A probe that always reports the same value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedLoad(pub f64);

impl Default for FixedLoad {
    fn default() -> Self {
        Self(DEFAULT_LOAD)
    }
}

impl LoadProbe for FixedLoad {
    fn current_load(&self) -> f64 {
        self.0
    }
}

/// Reads the one-minute load average from `/proc/loadavg` and divides it by
/// the number of available cores.
///
/// Falls back to [`DEFAULT_LOAD`] where the file is missing or unreadable.
#[derive(Debug, Clone)]
pub struct SystemLoad {
    path: PathBuf,
    cores: usize,
}

impl SystemLoad {
    /// Probe the host's `/proc/loadavg`.
    pub fn new() -> Self {
        Self::with_path("/proc/loadavg")
    }

    /// Probe an alternative loadavg-formatted file.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cores: available_cores(),
        }
    }

    fn read(&self) -> Option<f64> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        parse_loadavg(&content).map(|load| load / self.cores as f64)
    }
}

impl Default for SystemLoad {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadProbe for SystemLoad {
    fn current_load(&self) -> f64 {
        match self.read() {
            Some(load) => load,
            None => {
                tracing::debug!(
                    path = %self.path.display(),
                    "load average unavailable, assuming default"
                );
                DEFAULT_LOAD
            }
        }
    }
}

/// Number of cores the process may use, at least 1.
pub fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// First field of a loadavg line, if it is a finite non-negative number.
fn parse_loadavg(content: &str) -> Option<f64> {
    let value: f64 = content.split_whitespace().next()?.parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}
