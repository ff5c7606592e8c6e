//! Trace recording and replay.
//!
//! One text line per action: `<action-name> <tokens...>`, followed by a
//! `return <ids...>` line whenever the action produced sorts or terms.
//! Tokens are bare words, `s<id>`/`t<id>` entity references, or quoted
//! strings (internal quotes doubled).  Blank lines and `#` comments are
//! tolerated.  Every line is independently parseable; the only cross-line
//! state replay needs is the id map built from `return` lines.
//!
//! Replay resolves each traced reference through the map, re-executes the
//! action against the live adapter in the recorded order, and registers the
//! ids the re-execution produced under the traced ids.

use crate::actions::{Action, ReplayError};
use crate::manager::SolverManager;
use std::fmt;
use std::io::{self, Write};
use thiserror::Error;

/// A sort or term id as it appears in trace lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    Term(u64),
    Sort(u64),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Term(id) => write!(f, "t{}", id),
            EntityRef::Sort(id) => write!(f, "s{}", id),
        }
    }
}

/// One parsed token of a trace line.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Word(String),
    TermRef(u64),
    SortRef(u64),
    Str(String),
}

impl Token {
    pub fn word(&self) -> Option<&str> {
        match self {
            Token::Word(w) => Some(w),
            _ => None,
        }
    }

    pub fn u32(&self) -> Option<u32> {
        self.word().and_then(|w| w.parse().ok())
    }

    pub fn usize(&self) -> Option<usize> {
        self.word().and_then(|w| w.parse().ok())
    }

    pub fn term_ref(&self) -> Option<u64> {
        match self {
            Token::TermRef(id) => Some(*id),
            _ => None,
        }
    }

    pub fn sort_ref(&self) -> Option<u64> {
        match self {
            Token::SortRef(id) => Some(*id),
            _ => None,
        }
    }

    pub fn string(&self) -> Option<&str> {
        match self {
            Token::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Quote a symbol or literal for a trace line.
pub fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// Split one line into tokens.
pub fn tokenize(line: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' {
            chars.next();
            let mut text = String::new();
            loop {
                match chars.next() {
                    Some('"') => {
                        if chars.peek() == Some(&'"') {
                            chars.next();
                            text.push('"');
                        } else {
                            break;
                        }
                    }
                    Some(other) => text.push(other),
                    None => return Err("unterminated string".to_string()),
                }
            }
            tokens.push(Token::Str(text));
            continue;
        }
        let mut word = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            word.push(c);
            chars.next();
        }
        let is_ref = |prefix: char| {
            word.len() > 1
                && word.starts_with(prefix)
                && word.as_bytes()[1..].iter().all(|b| b.is_ascii_digit())
        };
        let token = if is_ref('t') {
            Token::TermRef(word[1..].parse().map_err(|_| "bad term ref")?)
        } else if is_ref('s') {
            Token::SortRef(word[1..].parse().map_err(|_| "bad sort ref")?)
        } else {
            Token::Word(word)
        };
        tokens.push(token);
    }
    Ok(tokens)
}

/// Writes trace lines to an output, or swallows them.
pub struct Tracer<'a> {
    out: Option<Box<dyn Write + 'a>>,
}

impl<'a> Tracer<'a> {
    pub fn new(out: Box<dyn Write + 'a>) -> Self {
        Self { out: Some(out) }
    }

    /// A tracer that discards everything.
    pub fn sink() -> Self {
        Self { out: None }
    }

    pub fn line(&mut self, text: &str) -> io::Result<()> {
        if let Some(out) = self.out.as_mut() {
            writeln!(out, "{}", text)?;
        }
        Ok(())
    }

    /// The `return` line declaring the ids an action produced.
    pub fn returns(&mut self, created: &[EntityRef]) -> io::Result<()> {
        if created.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = created.iter().map(|r| r.to_string()).collect();
        self.line(&format!("return {}", ids.join(" ")))
    }

    pub fn seed(&mut self, seed: u32) -> io::Result<()> {
        self.line(&format!("set-seed {}", seed))
    }

    pub fn flush(&mut self) -> io::Result<()> {
        if let Some(out) = self.out.as_mut() {
            out.flush()?;
        }
        Ok(())
    }
}

/// Errors surfaced while replaying a trace.
#[derive(Debug, Error)]
pub enum UntraceError {
    #[error("line {line}: unknown action `{name}`")]
    UnknownAction { line: usize, name: String },
    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },
    #[error("line {line}: unresolved reference {id}")]
    Unresolved { line: usize, id: String },
    #[error("line {line}: {message}")]
    Solver { line: usize, message: String },
}

impl UntraceError {
    /// The solver failure message, when the replay died in the adapter.
    pub fn solver_message(&self) -> Option<&str> {
        match self {
            UntraceError::Solver { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Replays traces through the action catalogue.
pub struct Untracer {
    actions: Vec<Box<dyn Action>>,
}

impl Untracer {
    pub fn new(actions: Vec<Box<dyn Action>>) -> Self {
        Self { actions }
    }

    fn action(&self, name: &str) -> Option<&dyn Action> {
        self.actions
            .iter()
            .find(|a| a.name() == name)
            .map(|a| a.as_ref())
    }

    /// Parse and re-execute `content` line by line.
    ///
    /// Returns the number of actions executed.
    pub fn untrace(&self, mgr: &mut SolverManager, content: &str) -> Result<usize, UntraceError> {
        let mut executed = 0;
        let mut lines = content.lines().enumerate().peekable();
        while let Some((idx, raw)) = lines.next() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let tokens = tokenize(line).map_err(|message| UntraceError::Malformed {
                line: line_no,
                message,
            })?;
            let (head, args) = tokens.split_first().ok_or(UntraceError::Malformed {
                line: line_no,
                message: "empty line after tokenizing".to_string(),
            })?;
            let name = head.word().ok_or(UntraceError::Malformed {
                line: line_no,
                message: "line must start with an action name".to_string(),
            })?;

            if name == "set-seed" {
                let seed = args.first().and_then(Token::u32).ok_or(UntraceError::Malformed {
                    line: line_no,
                    message: "set-seed needs a 32-bit seed".to_string(),
                })?;
                mgr.rng.reseed(seed);
                continue;
            }
            if name == "return" {
                return Err(UntraceError::Malformed {
                    line: line_no,
                    message: "stray return line".to_string(),
                });
            }

            let action = self.action(name).ok_or_else(|| UntraceError::UnknownAction {
                line: line_no,
                name: name.to_string(),
            })?;

            let created = match action.replay(mgr, args) {
                Ok(created) => created,
                Err(ReplayError::Skip) => Vec::new(),
                Err(ReplayError::Malformed(message)) => {
                    return Err(UntraceError::Malformed {
                        line: line_no,
                        message,
                    })
                }
                Err(ReplayError::Unresolved(id)) => {
                    return Err(UntraceError::Unresolved { line: line_no, id })
                }
                Err(ReplayError::Solver(e)) => {
                    if e.is_unsupported() {
                        // Was never traced as unsupported originally; a
                        // reduced trace can still run into it.  Skip.
                        Vec::new()
                    } else {
                        return Err(UntraceError::Solver {
                            line: line_no,
                            message: e.to_string(),
                        });
                    }
                }
            };
            executed += 1;
            // Phantom registration happens through explicit term-get-sort
            // lines; drop the queue the re-execution filled.
            let _ = mgr.take_pending_get_sorts();

            // Map the traced ids of the following return line onto the ids
            // the re-execution produced.
            let expects_return = matches!(
                lines.peek().map(|(_, l)| l.trim()),
                Some(l) if l.starts_with("return ")
            );
            if expects_return {
                let (ret_idx, ret_raw) = lines.next().expect("peeked");
                let ret_no = ret_idx + 1;
                let ret_tokens =
                    tokenize(ret_raw.trim()).map_err(|message| UntraceError::Malformed {
                        line: ret_no,
                        message,
                    })?;
                let traced = &ret_tokens[1..];
                if traced.len() != created.len() {
                    return Err(UntraceError::Malformed {
                        line: ret_no,
                        message: format!(
                            "return declares {} ids, action produced {}",
                            traced.len(),
                            created.len()
                        ),
                    });
                }
                for (token, actual) in traced.iter().zip(created.iter()) {
                    match (token, actual) {
                        (Token::TermRef(traced_id), EntityRef::Term(actual_id)) => {
                            mgr.register_term(*traced_id, *actual_id);
                        }
                        (Token::SortRef(traced_id), EntityRef::Sort(actual_id)) => {
                            mgr.register_sort(*traced_id, *actual_id);
                        }
                        _ => {
                            return Err(UntraceError::Malformed {
                                line: ret_no,
                                message: "return id kind mismatch".to_string(),
                            })
                        }
                    }
                }
            } else if !created.is_empty() {
                return Err(UntraceError::Malformed {
                    line: line_no,
                    message: "action produced ids but no return line follows".to_string(),
                });
            }
        }
        Ok(executed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_refs_and_words() {
        let tokens = tokenize("mk-term BV_ADD 0 2 t0 t15").unwrap();
        assert_eq!(tokens[0], Token::Word("mk-term".to_string()));
        assert_eq!(tokens[1], Token::Word("BV_ADD".to_string()));
        assert_eq!(tokens[4], Token::TermRef(0));
        assert_eq!(tokens[5], Token::TermRef(15));
    }

    #[test]
    fn tokenize_quoted_strings() {
        let tokens = tokenize("mk-const s2 \"a b\"").unwrap();
        assert_eq!(tokens[1], Token::SortRef(2));
        assert_eq!(tokens[2], Token::Str("a b".to_string()));
    }

    #[test]
    fn quoted_quotes_roundtrip() {
        let quoted = quote("x\"y");
        assert_eq!(quoted, "\"x\"\"y\"");
        let tokens = tokenize(&quoted).unwrap();
        assert_eq!(tokens[0], Token::Str("x\"y".to_string()));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(tokenize("mk-const s0 \"oops").is_err());
    }

    #[test]
    fn words_that_look_like_refs_need_digits() {
        let tokens = tokenize("true t s sx t9x").unwrap();
        assert_eq!(tokens[0], Token::Word("true".to_string()));
        assert_eq!(tokens[1], Token::Word("t".to_string()));
        assert_eq!(tokens[2], Token::Word("s".to_string()));
        assert_eq!(tokens[3], Token::Word("sx".to_string()));
        assert_eq!(tokens[4], Token::Word("t9x".to_string()));
    }

    #[test]
    fn tracer_writes_lines_and_returns() {
        let mut buffer = Vec::new();
        {
            let cursor = Box::new(io::Cursor::new(&mut buffer));
            let mut tracer = Tracer::new(cursor);
            tracer.line("check-sat").unwrap();
            tracer
                .returns(&[EntityRef::Term(3), EntityRef::Sort(1)])
                .unwrap();
            tracer.returns(&[]).unwrap();
            tracer.flush().unwrap();
        }
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "check-sat\nreturn t3 s1\n");
    }

    #[test]
    fn sink_swallows_everything() {
        let mut tracer = Tracer::sink();
        tracer.line("anything").unwrap();
        tracer.returns(&[EntityRef::Term(0)]).unwrap();
    }
}
