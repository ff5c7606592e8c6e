//! Trace reduction by hierarchical delta debugging.
//!
//! The trace is cut into *units* (one action line plus its attached
//! `set-seed`, `return` and phantom lines).  A unit depends on every
//! earlier unit producing an id it references; removal closes over
//! dependents and keeping closes over producers, so every candidate the
//! predicate sees is a well-formed trace.
//!
//! On top of the units runs ddmin: partition into `g` chunks, try removing
//! each chunk and each chunk's complement, adopt the first shrinking
//! candidate that still fails, double `g` otherwise, stop when `g` exceeds
//! the unit count.

use crate::trace::{tokenize, Token};
use log::{debug, info};
use std::collections::HashSet;

/// An id as it appears in trace references: terms and sorts are separate
/// namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Id {
    Term(u64),
    Sort(u64),
}

#[derive(Debug, Clone)]
struct Unit {
    lines: Vec<String>,
    produces: Vec<Id>,
    consumes: Vec<Id>,
}

fn ids_of(tokens: &[Token]) -> Vec<Id> {
    tokens
        .iter()
        .filter_map(|t| match t {
            Token::TermRef(id) => Some(Id::Term(*id)),
            Token::SortRef(id) => Some(Id::Sort(*id)),
            _ => None,
        })
        .collect()
}

/// Split a trace into dependency-annotated units.
fn parse_units(trace: &str) -> Vec<Unit> {
    let mut units: Vec<Unit> = Vec::new();
    let mut pending_seed: Option<String> = None;
    for raw in trace.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Ok(tokens) = tokenize(line) else {
            continue;
        };
        let head = tokens.first().and_then(Token::word).unwrap_or("");
        match head {
            "set-seed" => {
                pending_seed = Some(line.to_string());
            }
            "return" => {
                if let Some(unit) = units.last_mut() {
                    unit.lines.push(line.to_string());
                    unit.produces.extend(ids_of(&tokens[1..]));
                }
            }
            _ => {
                let mut lines = Vec::new();
                if let Some(seed) = pending_seed.take() {
                    lines.push(seed);
                }
                lines.push(line.to_string());
                units.push(Unit {
                    lines,
                    produces: Vec::new(),
                    consumes: ids_of(&tokens[1..]),
                });
            }
        }
    }
    units
}

fn render(units: &[Unit], keep: &[bool]) -> String {
    let mut out = String::new();
    for (unit, kept) in units.iter().zip(keep) {
        if !kept {
            continue;
        }
        for line in &unit.lines {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Close `keep` downward: drop every unit consuming an id with no earlier
/// kept producer.
fn close_removal(units: &[Unit], keep: &mut [bool]) {
    loop {
        let mut produced: HashSet<Id> = HashSet::new();
        let mut changed = false;
        for (i, unit) in units.iter().enumerate() {
            if !keep[i] {
                continue;
            }
            if unit.consumes.iter().any(|id| !produced.contains(id)) {
                keep[i] = false;
                changed = true;
                continue;
            }
            produced.extend(unit.produces.iter().copied());
        }
        if !changed {
            return;
        }
    }
}

/// Close `keep` upward: for every kept consumer, keep the nearest earlier
/// producer of each consumed id.
fn close_keeping(units: &[Unit], keep: &mut [bool]) {
    loop {
        let mut changed = false;
        for i in 0..units.len() {
            if !keep[i] {
                continue;
            }
            'ids: for id in &units[i].consumes {
                for j in (0..i).rev() {
                    if units[j].produces.contains(id) {
                        if keep[j] {
                            continue 'ids;
                        }
                        keep[j] = true;
                        changed = true;
                        continue 'ids;
                    }
                }
            }
        }
        if !changed {
            return;
        }
    }
}

/// Minimises failing traces against an injected predicate.
pub struct DeltaDebugger<F> {
    fails: F,
    /// Number of predicate evaluations performed by the last `minimize`.
    pub tests: usize,
}

impl<F> DeltaDebugger<F>
where
    F: FnMut(&str) -> bool,
{
    pub fn new(fails: F) -> Self {
        Self { fails, tests: 0 }
    }

    fn check(&mut self, units: &[Unit], keep: &[bool]) -> Option<String> {
        let candidate = render(units, keep);
        self.tests += 1;
        if (self.fails)(&candidate) {
            Some(candidate)
        } else {
            None
        }
    }

    /// Reduce `trace`, preserving the failure the predicate recognises.
    ///
    /// Returns the smallest failing trace found; if the input itself does
    /// not fail it is returned unchanged.
    pub fn minimize(&mut self, trace: &str) -> String {
        self.tests = 0;
        let units = parse_units(trace);
        let mut keep = vec![true; units.len()];

        if self.check(&units, &keep).is_none() {
            info!("input trace does not fail; nothing to reduce");
            return trace.to_string();
        }

        let mut granularity = 2usize;
        while granularity <= count(&keep).max(1) {
            let live: Vec<usize> = keep
                .iter()
                .enumerate()
                .filter(|(_, k)| **k)
                .map(|(i, _)| i)
                .collect();
            let chunk_size = live.len().div_ceil(granularity);
            if chunk_size == 0 {
                break;
            }

            let mut reduced = false;
            for chunk in live.chunks(chunk_size) {
                // Try removing the chunk.
                let mut candidate = keep.clone();
                for i in chunk {
                    candidate[*i] = false;
                }
                close_removal(&units, &mut candidate);
                if count(&candidate) < count(&keep) && count(&candidate) > 0 {
                    if self.check(&units, &candidate).is_some() {
                        debug!(
                            "removed chunk: {} -> {} units",
                            count(&keep),
                            count(&candidate)
                        );
                        keep = candidate;
                        reduced = true;
                        break;
                    }
                }

                // Try keeping only the chunk.
                let mut candidate = vec![false; units.len()];
                for i in chunk {
                    candidate[*i] = true;
                }
                close_keeping(&units, &mut candidate);
                if count(&candidate) < count(&keep) && count(&candidate) > 0 {
                    if self.check(&units, &candidate).is_some() {
                        debug!(
                            "kept complement: {} -> {} units",
                            count(&keep),
                            count(&candidate)
                        );
                        keep = candidate;
                        reduced = true;
                        break;
                    }
                }
            }

            if reduced {
                // Retry at the same granularity on the smaller trace.
                granularity = granularity.min(count(&keep).max(2));
            } else if granularity >= count(&keep) {
                break;
            } else {
                granularity = (granularity * 2).min(count(&keep));
            }
        }

        info!(
            "delta debugging: {} -> {} units in {} tests",
            units.len(),
            count(&keep),
            self.tests
        );
        render(&units, &keep)
    }
}

fn count(keep: &[bool]) -> usize {
    keep.iter().filter(|k| **k).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACE: &str = "\
new
mk-sort BOOL
return s0
mk-const s0 \"a\"
return t0
mk-const s0 \"b\"
return t1
mk-term AND 0 2 t0 t1
return t2
assert-formula t1
check-sat
";

    #[test]
    fn units_carry_dependencies() {
        let units = parse_units(TRACE);
        assert_eq!(units.len(), 7);
        assert_eq!(units[1].produces, vec![Id::Sort(0)]);
        assert_eq!(units[2].consumes, vec![Id::Sort(0)]);
        assert_eq!(units[4].consumes, vec![Id::Term(0), Id::Term(1)]);
    }

    #[test]
    fn removal_closure_drops_dependents() {
        let units = parse_units(TRACE);
        let mut keep = vec![true; units.len()];
        // Drop the mk-sort; everything referencing s0/t0/t1 must follow.
        keep[1] = false;
        close_removal(&units, &mut keep);
        assert_eq!(keep, vec![true, false, false, false, false, false, true]);
    }

    #[test]
    fn keeping_closure_pulls_producers() {
        let units = parse_units(TRACE);
        let mut keep = vec![false; units.len()];
        keep[5] = true; // assert-formula t1
        close_keeping(&units, &mut keep);
        // Needs mk-const "b" which needs mk-sort.
        assert!(keep[3] && keep[1]);
        assert!(!keep[2] && !keep[4]);
    }

    #[test]
    fn minimize_preserves_the_failure() {
        let mut dd = DeltaDebugger::new(|t: &str| t.contains("assert-formula"));
        let reduced = dd.minimize(TRACE);
        assert!(reduced.contains("assert-formula"));
        assert!(reduced.len() <= TRACE.len());
        // The unrelated const and the AND term are gone.
        assert!(!reduced.contains("mk-term AND"));
        assert!(!reduced.contains("\"a\""));
    }

    #[test]
    fn minimize_keeps_candidates_well_formed() {
        let mut seen: Vec<String> = Vec::new();
        let mut dd = DeltaDebugger::new(|t: &str| {
            seen.push(t.to_string());
            t.contains("check-sat")
        });
        let _ = dd.minimize(TRACE);
        drop(dd);
        for candidate in seen {
            // No reference without an earlier producer.
            let units = parse_units(&candidate);
            let mut keep = vec![true; units.len()];
            close_removal(&units, &mut keep);
            assert!(keep.iter().all(|k| *k), "dangling reference in candidate");
        }
    }

    #[test]
    fn non_failing_input_returned_unchanged() {
        let mut dd = DeltaDebugger::new(|_t: &str| false);
        assert_eq!(dd.minimize(TRACE), TRACE);
    }

    #[test]
    fn seed_lines_travel_with_their_action() {
        let trace = "set-seed 99\nmk-sort BOOL\nreturn s0\n";
        let units = parse_units(trace);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].lines[0], "set-seed 99");
    }
}
