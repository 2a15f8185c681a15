//! Wall-clock phase timers for parse diagnostics.
//!
//! Enabled through `DemuxOptions::debug`; disabled probes run the phase
//! closure with no measurement overhead.

use std::time::{Duration, Instant};
use tracing::debug;

/// Collects named phase durations when enabled.
#[derive(Debug, Default)]
pub struct PerfProbe {
    enabled: bool,
    phases: Vec<(&'static str, Duration)>,
}

impl PerfProbe {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            phases: Vec::new(),
        }
    }

    /// Run `f`, recording its wall-clock time under `name` when enabled.
    pub fn time<T>(&mut self, name: &'static str, f: impl FnOnce() -> T) -> T {
        if !self.enabled {
            return f();
        }
        let start = Instant::now();
        let out = f();
        let took = start.elapsed();
        debug!("phase '{}' took {:?}", name, took);
        self.phases.push((name, took));
        out
    }

    /// Recorded phases, in execution order.
    pub fn phases(&self) -> &[(&'static str, Duration)] {
        &self.phases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_when_enabled() {
        let mut probe = PerfProbe::new(true);
        let value = probe.time("phase-a", || 41 + 1);
        assert_eq!(value, 42);
        assert_eq!(probe.phases().len(), 1);
        assert_eq!(probe.phases()[0].0, "phase-a");
    }

    #[test]
    fn silent_when_disabled() {
        let mut probe = PerfProbe::new(false);
        let value = probe.time("phase-a", || "ok");
        assert_eq!(value, "ok");
        assert!(probe.phases().is_empty());
    }
}
