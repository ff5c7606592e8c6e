//! Cross-run statistics, printed at the end of a fuzzing session.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Default, Clone, Serialize)]
pub struct HarnessStats {
    pub runs: u64,
    pub ok: u64,
    pub errors: u64,
    pub crashes: u64,
    pub timeouts: u64,
    /// Errors whose signature was already known.
    pub duplicates: u64,
}

impl HarnessStats {
    pub fn record(&mut self, kind: &str, duplicate: bool) {
        self.runs += 1;
        match kind {
            "ok" => self.ok += 1,
            "error" => self.errors += 1,
            "crash" => self.crashes += 1,
            "timeout" => self.timeouts += 1,
            _ => {}
        }
        if duplicate {
            self.duplicates += 1;
        }
    }
}

impl fmt::Display for HarnessStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "runs:       {}", self.runs)?;
        writeln!(f, "  ok:       {}", self.ok)?;
        writeln!(f, "  errors:   {} ({} duplicate)", self.errors, self.duplicates)?;
        writeln!(f, "  crashes:  {}", self.crashes)?;
        write!(f, "  timeouts: {}", self.timeouts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_buckets_by_kind() {
        let mut stats = HarnessStats::default();
        stats.record("ok", false);
        stats.record("error", false);
        stats.record("error", true);
        stats.record("crash", false);
        stats.record("timeout", false);
        assert_eq!(stats.runs, 5);
        assert_eq!(stats.ok, 1);
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.crashes, 1);
        assert_eq!(stats.timeouts, 1);
    }

    #[test]
    fn display_is_a_summary_block() {
        let stats = HarnessStats::default();
        let text = stats.to_string();
        assert!(text.contains("runs:"));
        assert!(text.contains("timeouts:"));
    }
}
