//! Error bucketing by normalised signature.
//!
//! Two failures are "the same bug" when their messages agree after
//! scrubbing everything run-specific: hex addresses, file paths, and
//! numbers (line numbers, pids, widths).  The map keeps one original
//! message per signature plus every seed that hit it, and the driver uses
//! it to discard duplicate findings.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn patterns() -> &'static [(Regex, &'static str); 3] {
    static PATTERNS: OnceLock<[(Regex, &'static str); 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (Regex::new(r"0x[0-9a-fA-F]+").unwrap(), "<addr>"),
            (Regex::new(r"(/[\w.~-]+)+").unwrap(), "<path>"),
            (Regex::new(r"\d+").unwrap(), "<num>"),
        ]
    })
}

/// Collapse run-specific tokens in an error message.
///
/// Normalisation is a fixpoint: applying it twice changes nothing.
pub fn normalize(message: &str) -> String {
    let mut text = message.trim().to_string();
    for (pattern, replacement) in patterns() {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }
    text
}

/// One bucket: the first original message plus the seeds that hit it.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEntry {
    pub message: String,
    pub seeds: Vec<u32>,
}

/// Normalised signature → original message and offending seeds.
#[derive(Debug, Default, Serialize)]
pub struct ErrorMap {
    entries: BTreeMap<String, ErrorEntry>,
}

impl ErrorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error; returns `true` when the signature is new.
    pub fn add(&mut self, message: &str, seed: u32) -> bool {
        let signature = normalize(message);
        match self.entries.get_mut(&signature) {
            Some(entry) => {
                entry.seeds.push(seed);
                false
            }
            None => {
                self.entries.insert(
                    signature,
                    ErrorEntry {
                        message: message.to_string(),
                        seeds: vec![seed],
                    },
                );
                true
            }
        }
    }

    pub fn contains(&self, message: &str) -> bool {
        self.entries.contains_key(&normalize(message))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ErrorEntry)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn numbers_and_addresses_collapse() {
        let a = normalize("assertion failed at solver.c:1234 (0xdeadbeef)");
        let b = normalize("assertion failed at solver.c:77 (0xcafe)");
        assert_eq!(a, b);
    }

    #[test]
    fn paths_collapse() {
        let a = normalize("cannot open /tmp/run-1/x.trace");
        let b = normalize("cannot open /var/scratch/y.trace");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_messages_stay_distinct() {
        assert_ne!(
            normalize("segfault in rewriter"),
            normalize("segfault in bitblaster")
        );
    }

    #[test]
    fn map_dedups_by_signature() {
        let mut map = ErrorMap::new();
        assert!(map.add("error at line 10", 1));
        assert!(!map.add("error at line 99", 2));
        assert_eq!(map.len(), 1);
        let entry = map.iter().next().unwrap().1;
        assert_eq!(entry.seeds, vec![1, 2]);
        assert_eq!(entry.message, "error at line 10");
    }

    proptest! {
        #[test]
        fn normalisation_is_a_fixpoint(message in ".{0,200}") {
            let once = normalize(&message);
            prop_assert_eq!(normalize(&once), once);
        }
    }
}
