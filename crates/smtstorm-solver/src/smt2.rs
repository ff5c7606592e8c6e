//! SMT-LIB2 printing backend.
//!
//! Renders every adapter call as SMT-LIB2 text.  Two modes:
//!
//! - **online** — a solver binary is spawned as a child process; commands go
//!   down its stdin and `check-sat`/`get-*` answers are read back from its
//!   stdout.
//! - **offline** — commands accumulate in a script buffer and `check-sat`
//!   answers `unknown`.  Useful to exercise the harness without any solver
//!   installed; the script is still a valid SMT-LIB2 reproduction of the
//!   run.
//!
//! The backend tracks the sort of every term it hands out so that
//! `get-sort` works without querying the child.

use crate::infer::{result_sort, SortInfo};
use crate::op::OpKind;
use crate::solver::{
    SatResult, Solver, SolverError, SolverOption, SolverResult, SortHandle, TermHandle,
};
use crate::sort::{SortKind, SortParams};
use crate::theory::TheoryId;
use log::warn;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

struct Smt2Pipe {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl Smt2Pipe {
    fn spawn(cmd: &[String]) -> SolverResult<Self> {
        let (program, args) = cmd
            .split_first()
            .ok_or_else(|| SolverError::failure("empty smt2 command line"))?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| SolverError::failure(format!("spawning {}: {}", program, e)))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SolverError::failure("child stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| SolverError::failure("child stdout unavailable"))?;
        Ok(Self {
            child,
            stdin,
            stdout,
        })
    }
}

impl Drop for Smt2Pipe {
    fn drop(&mut self) {
        let _ = writeln!(self.stdin, "(exit)");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[derive(Debug, Clone)]
struct Smt2Term {
    repr: String,
    sort: SortHandle,
}

/// The SMT-LIB2 backend.
pub struct Smt2Solver {
    /// Child command line; `None` means offline.
    cmd: Option<Vec<String>>,
    pipe: Option<Smt2Pipe>,
    /// The full script, also kept online (it is the reproduction artifact).
    script: String,
    sorts: Vec<(SortInfo, String)>,
    interned: HashMap<SortInfo, SortHandle>,
    terms: Vec<Smt2Term>,
    assumed: Vec<TermHandle>,
    failed_assumptions: Vec<TermHandle>,
}

impl Smt2Solver {
    /// Offline: print only, `check-sat` answers unknown.
    pub fn offline() -> Self {
        Self::with_cmd(None)
    }

    /// Online against `cmd` (binary plus arguments).
    pub fn online(cmd: Vec<String>) -> Self {
        Self::with_cmd(Some(cmd))
    }

    fn with_cmd(cmd: Option<Vec<String>>) -> Self {
        Self {
            cmd,
            pipe: None,
            script: String::new(),
            sorts: Vec::new(),
            interned: HashMap::new(),
            terms: Vec::new(),
            assumed: Vec::new(),
            failed_assumptions: Vec::new(),
        }
    }

    /// The SMT-LIB2 script produced so far.
    pub fn script(&self) -> &str {
        &self.script
    }

    fn emit(&mut self, line: &str) -> SolverResult<()> {
        self.script.push_str(line);
        self.script.push('\n');
        if let Some(pipe) = self.pipe.as_mut() {
            writeln!(pipe.stdin, "{}", line)
                .and_then(|_| pipe.stdin.flush())
                .map_err(|e| SolverError::failure(format!("writing to solver: {}", e)))?;
        }
        Ok(())
    }

    fn read_line(&mut self) -> SolverResult<String> {
        let pipe = self
            .pipe
            .as_mut()
            .ok_or_else(|| SolverError::unsupported("reading answers offline"))?;
        let mut line = String::new();
        loop {
            line.clear();
            let n = pipe
                .stdout
                .read_line(&mut line)
                .map_err(|e| SolverError::failure(format!("reading from solver: {}", e)))?;
            if n == 0 {
                return Err(SolverError::failure("solver closed its output"));
            }
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed == "success" {
                continue;
            }
            return Ok(trimmed.to_string());
        }
    }

    /// Read one s-expression, possibly spanning lines (get-model answers).
    fn read_sexpr(&mut self) -> SolverResult<String> {
        let mut text = self.read_line()?;
        loop {
            let depth: i64 = text
                .chars()
                .map(|c| match c {
                    '(' => 1,
                    ')' => -1,
                    _ => 0,
                })
                .sum();
            if depth <= 0 {
                return Ok(text);
            }
            let pipe = self.pipe.as_mut().expect("read_line checked the pipe");
            let mut line = String::new();
            let n = pipe
                .stdout
                .read_line(&mut line)
                .map_err(|e| SolverError::failure(format!("reading from solver: {}", e)))?;
            if n == 0 {
                return Err(SolverError::failure("solver closed its output mid-answer"));
            }
            text.push('\n');
            text.push_str(line.trim_end());
        }
    }

    fn check_answer(answer: &str) -> SolverResult<SatResult> {
        match answer {
            "sat" => Ok(SatResult::Sat),
            "unsat" => Ok(SatResult::Unsat),
            "unknown" => Ok(SatResult::Unknown),
            other => Err(SolverError::failure(format!(
                "unexpected check-sat answer: {}",
                other
            ))),
        }
    }

    fn sort_entry(&self, sort: SortHandle) -> SolverResult<&(SortInfo, String)> {
        self.sorts
            .get(sort.0 as usize)
            .ok_or_else(|| SolverError::failure(format!("unknown sort handle {}", sort.0)))
    }

    fn term_entry(&self, term: TermHandle) -> SolverResult<&Smt2Term> {
        self.terms
            .get(term.0 as usize)
            .ok_or_else(|| SolverError::failure(format!("unknown term handle {}", term.0)))
    }

    fn intern(&mut self, info: SortInfo, repr: String) -> SortHandle {
        if let Some(handle) = self.interned.get(&info) {
            return *handle;
        }
        let handle = SortHandle(self.sorts.len() as u64);
        self.sorts.push((info, repr));
        self.interned.insert(info, handle);
        handle
    }

    fn new_term(&mut self, repr: String, sort: SortHandle) -> TermHandle {
        let handle = TermHandle(self.terms.len() as u64);
        self.terms.push(Smt2Term { repr, sort });
        handle
    }

    /// Intern a sort computed by inference, building its repr on demand.
    fn intern_info(&mut self, info: SortInfo) -> SolverResult<SortHandle> {
        if let Some(handle) = self.interned.get(&info) {
            return Ok(*handle);
        }
        let repr = match info.params {
            SortParams::None => match info.kind {
                SortKind::Bool => "Bool".to_string(),
                SortKind::Int => "Int".to_string(),
                SortKind::Real => "Real".to_string(),
                SortKind::Rm => "RoundingMode".to_string(),
                SortKind::Reglan => "RegLan".to_string(),
                SortKind::String => "String".to_string(),
                other => {
                    return Err(SolverError::failure(format!(
                        "{} sort without parameters",
                        other
                    )))
                }
            },
            SortParams::Bv { width } => format!("(_ BitVec {})", width),
            SortParams::Fp { eb, sb } => format!("(_ FloatingPoint {} {})", eb, sb),
            SortParams::Array { index, element } => {
                let index_repr = self.sort_entry(index)?.1.clone();
                let element_repr = self.sort_entry(element)?.1.clone();
                format!("(Array {} {})", index_repr, element_repr)
            }
        };
        Ok(self.intern(info, repr))
    }

    /// The operator head for an application, with parameters baked in.
    fn op_head(kind: OpKind, params: &[u32]) -> SolverResult<String> {
        let p = |i: usize| params.get(i).copied().unwrap_or(0);
        let head = match kind {
            OpKind::Distinct => "distinct".into(),
            OpKind::Equal | OpKind::Iff => "=".into(),
            OpKind::Ite => "ite".into(),
            OpKind::ArraySelect => "select".into(),
            OpKind::ArrayStore => "store".into(),
            OpKind::And => "and".into(),
            OpKind::Implies => "=>".into(),
            OpKind::Not => "not".into(),
            OpKind::Or => "or".into(),
            OpKind::Xor => "xor".into(),
            OpKind::BvExtract => format!("(_ extract {} {})", p(0), p(1)),
            OpKind::BvRepeat => format!("(_ repeat {})", p(0)),
            OpKind::BvRotateLeft => format!("(_ rotate_left {})", p(0)),
            OpKind::BvRotateRight => format!("(_ rotate_right {})", p(0)),
            OpKind::BvSignExtend => format!("(_ sign_extend {})", p(0)),
            OpKind::BvZeroExtend => format!("(_ zero_extend {})", p(0)),
            OpKind::BvAdd => "bvadd".into(),
            OpKind::BvAnd => "bvand".into(),
            OpKind::BvAshr => "bvashr".into(),
            OpKind::BvComp => "bvcomp".into(),
            OpKind::BvConcat => "concat".into(),
            OpKind::BvLshr => "bvlshr".into(),
            OpKind::BvMult => "bvmul".into(),
            OpKind::BvNand => "bvnand".into(),
            OpKind::BvNeg => "bvneg".into(),
            OpKind::BvNor => "bvnor".into(),
            OpKind::BvNot => "bvnot".into(),
            OpKind::BvOr => "bvor".into(),
            OpKind::BvRedAnd => "bvredand".into(),
            OpKind::BvRedOr => "bvredor".into(),
            OpKind::BvSaddo => "bvsaddo".into(),
            OpKind::BvSdiv => "bvsdiv".into(),
            OpKind::BvSdivo => "bvsdivo".into(),
            OpKind::BvSge => "bvsge".into(),
            OpKind::BvSgt => "bvsgt".into(),
            OpKind::BvShl => "bvshl".into(),
            OpKind::BvSle => "bvsle".into(),
            OpKind::BvSlt => "bvslt".into(),
            OpKind::BvSmod => "bvsmod".into(),
            OpKind::BvSmulo => "bvsmulo".into(),
            OpKind::BvSrem => "bvsrem".into(),
            OpKind::BvSsubo => "bvssubo".into(),
            OpKind::BvSub => "bvsub".into(),
            OpKind::BvUaddo => "bvuaddo".into(),
            OpKind::BvUdiv => "bvudiv".into(),
            OpKind::BvUge => "bvuge".into(),
            OpKind::BvUgt => "bvugt".into(),
            OpKind::BvUle => "bvule".into(),
            OpKind::BvUlt => "bvult".into(),
            OpKind::BvUmulo => "bvumulo".into(),
            OpKind::BvUrem => "bvurem".into(),
            OpKind::BvUsubo => "bvusubo".into(),
            OpKind::BvXnor => "bvxnor".into(),
            OpKind::BvXor => "bvxor".into(),
            OpKind::BvDec | OpKind::BvInc | OpKind::BvRedXor => {
                return Err(SolverError::unsupported(format!(
                    "{} has no SMT-LIB2 spelling",
                    kind
                )))
            }
            OpKind::FpToFpFromBv
            | OpKind::FpToFpFromFp
            | OpKind::FpToFpFromIntBv
            | OpKind::FpToFpFromReal => format!("(_ to_fp {} {})", p(0), p(1)),
            OpKind::FpToFpFromUintBv => format!("(_ to_fp_unsigned {} {})", p(0), p(1)),
            OpKind::FpToSbv => format!("(_ fp.to_sbv {})", p(0)),
            OpKind::FpToUbv => format!("(_ fp.to_ubv {})", p(0)),
            OpKind::FpAbs => "fp.abs".into(),
            OpKind::FpAdd => "fp.add".into(),
            OpKind::FpDiv => "fp.div".into(),
            OpKind::FpEq => "fp.eq".into(),
            OpKind::FpFma => "fp.fma".into(),
            OpKind::FpFp => "fp".into(),
            OpKind::FpGt => "fp.gt".into(),
            OpKind::FpGte => "fp.geq".into(),
            OpKind::FpIsInf => "fp.isInfinite".into(),
            OpKind::FpIsNan => "fp.isNaN".into(),
            OpKind::FpIsNeg => "fp.isNegative".into(),
            OpKind::FpIsNormal => "fp.isNormal".into(),
            OpKind::FpIsPos => "fp.isPositive".into(),
            OpKind::FpIsSubnormal => "fp.isSubnormal".into(),
            OpKind::FpIsZero => "fp.isZero".into(),
            OpKind::FpLt => "fp.lt".into(),
            OpKind::FpLte => "fp.leq".into(),
            OpKind::FpMax => "fp.max".into(),
            OpKind::FpMin => "fp.min".into(),
            OpKind::FpMul => "fp.mul".into(),
            OpKind::FpNeg => "fp.neg".into(),
            OpKind::FpRem => "fp.rem".into(),
            OpKind::FpRti => "fp.roundToIntegral".into(),
            OpKind::FpSqrt => "fp.sqrt".into(),
            OpKind::FpSub => "fp.sub".into(),
            OpKind::FpToReal => "fp.to_real".into(),
            OpKind::IntAbs => "abs".into(),
            OpKind::IntAdd | OpKind::RealAdd => "+".into(),
            OpKind::IntDiv => "div".into(),
            OpKind::IntGt | OpKind::RealGt => ">".into(),
            OpKind::IntGte | OpKind::RealGte => ">=".into(),
            OpKind::IntIsDiv => format!("(_ divisible {})", p(0)),
            OpKind::IntLt | OpKind::RealLt => "<".into(),
            OpKind::IntLte | OpKind::RealLte => "<=".into(),
            OpKind::IntMod => "mod".into(),
            OpKind::IntMul | OpKind::RealMul => "*".into(),
            OpKind::IntNeg | OpKind::IntSub | OpKind::RealNeg | OpKind::RealSub => "-".into(),
            OpKind::RealDiv => "/".into(),
            OpKind::Exists => "exists".into(),
            OpKind::Forall => "forall".into(),
            OpKind::ReComp => "re.comp".into(),
            OpKind::ReConcat => "re.++".into(),
            OpKind::ReDiff => "re.diff".into(),
            OpKind::ReInter => "re.inter".into(),
            OpKind::ReLoop => format!("(_ re.loop {} {})", p(0), p(1)),
            OpKind::ReOpt => "re.opt".into(),
            OpKind::RePlus => "re.+".into(),
            OpKind::RePow => format!("(_ re.^ {})", p(0)),
            OpKind::ReRange => "re.range".into(),
            OpKind::ReStar => "re.*".into(),
            OpKind::ReUnion => "re.union".into(),
            OpKind::StrAt => "str.at".into(),
            OpKind::StrConcat => "str.++".into(),
            OpKind::StrContains => "str.contains".into(),
            OpKind::StrFromCode => "str.from_code".into(),
            OpKind::StrFromInt => "str.from_int".into(),
            OpKind::StrIndexof => "str.indexof".into(),
            OpKind::StrInRe => "str.in_re".into(),
            OpKind::StrIsDigit => "str.is_digit".into(),
            OpKind::StrLe => "str.<=".into(),
            OpKind::StrLen => "str.len".into(),
            OpKind::StrLt => "str.<".into(),
            OpKind::StrPrefixof => "str.prefixof".into(),
            OpKind::StrReplace => "str.replace".into(),
            OpKind::StrReplaceAll => "str.replace_all".into(),
            OpKind::StrReplaceRe => "str.replace_re".into(),
            OpKind::StrReplaceReAll => "str.replace_re_all".into(),
            OpKind::StrSubstr => "str.substr".into(),
            OpKind::StrSuffixof => "str.suffixof".into(),
            OpKind::StrToCode => "str.to_code".into(),
            OpKind::StrToInt => "str.to_int".into(),
            OpKind::StrToRe => "str.to_re".into(),
        };
        Ok(head)
    }

    /// Render a literal for a sort the SMT-LIB2 way.
    fn value_repr(&self, sort: SortHandle, value: &str) -> SolverResult<String> {
        let info = self.sort_entry(sort)?.0;
        let repr = match info.kind {
            SortKind::String => {
                format!("\"{}\"", value.replace('"', "\"\""))
            }
            SortKind::Int | SortKind::Real => {
                if let Some(rest) = value.strip_prefix('-') {
                    format!("(- {})", rest)
                } else if let Some((numerator, denominator)) = value.split_once('/') {
                    format!("(/ {} {})", numerator, denominator)
                } else {
                    value.to_string()
                }
            }
            _ => value.to_string(),
        };
        Ok(repr)
    }
}

impl Solver for Smt2Solver {
    fn name(&self) -> &'static str {
        "smt2"
    }

    fn supported_theories(&self) -> Vec<TheoryId> {
        TheoryId::ALL.to_vec()
    }

    fn init(&mut self) -> SolverResult<()> {
        self.script.clear();
        self.sorts.clear();
        self.interned.clear();
        self.terms.clear();
        self.assumed.clear();
        self.failed_assumptions.clear();
        self.pipe = match &self.cmd {
            Some(cmd) => Some(Smt2Pipe::spawn(cmd)?),
            None => None,
        };
        self.emit("(set-option :print-success false)")?;
        self.emit("(set-logic ALL)")?;
        Ok(())
    }

    fn teardown(&mut self) -> SolverResult<()> {
        self.emit("(exit)")?;
        self.pipe = None;
        Ok(())
    }

    fn mk_sort(&mut self, kind: SortKind, params: &SortParams) -> SolverResult<SortHandle> {
        self.intern_info(SortInfo {
            kind,
            params: *params,
        })
    }

    fn mk_const(&mut self, sort: SortHandle, symbol: &str) -> SolverResult<TermHandle> {
        let sort_repr = self.sort_entry(sort)?.1.clone();
        self.emit(&format!("(declare-const {} {})", symbol, sort_repr))?;
        Ok(self.new_term(symbol.to_string(), sort))
    }

    fn mk_var(&mut self, sort: SortHandle, symbol: &str) -> SolverResult<TermHandle> {
        // No declaration: the binder introduces the variable.
        self.sort_entry(sort)?;
        Ok(self.new_term(symbol.to_string(), sort))
    }

    fn mk_value(&mut self, sort: SortHandle, value: &str) -> SolverResult<TermHandle> {
        let repr = self.value_repr(sort, value)?;
        Ok(self.new_term(repr, sort))
    }

    fn mk_term(
        &mut self,
        kind: OpKind,
        params: &[u32],
        args: &[TermHandle],
    ) -> SolverResult<TermHandle> {
        let mut infos = Vec::with_capacity(args.len());
        let mut reprs = Vec::with_capacity(args.len());
        for a in args {
            let entry = self.term_entry(*a)?.clone();
            infos.push(self.sort_entry(entry.sort)?.0);
            reprs.push(entry.repr);
        }

        let repr = match kind {
            OpKind::Exists | OpKind::Forall => {
                let (body, vars) = reprs
                    .split_last()
                    .ok_or_else(|| SolverError::failure("quantifier without a body"))?;
                let mut binders = String::new();
                for (i, var_repr) in vars.iter().enumerate() {
                    let var_sort = self.term_entry(args[i])?.sort;
                    let sort_repr = &self.sort_entry(var_sort)?.1;
                    binders.push_str(&format!("({} {})", var_repr, sort_repr));
                }
                format!("({} ({}) {})", Self::op_head(kind, params)?, binders, body)
            }
            _ => {
                let head = Self::op_head(kind, params)?;
                format!("({} {})", head, reprs.join(" "))
            }
        };

        let result = match kind {
            OpKind::Exists | OpKind::Forall => SortInfo::plain(SortKind::Bool),
            _ => {
                let sorts = self.sorts.clone();
                let resolve = move |h: SortHandle| -> Option<SortInfo> {
                    sorts.get(h.0 as usize).map(|(info, _)| *info)
                };
                result_sort(kind, params, &infos, &resolve)?
            }
        };
        let sort = self.intern_info(result)?;
        Ok(self.new_term(repr, sort))
    }

    fn get_sort(&mut self, term: TermHandle) -> SolverResult<SortHandle> {
        Ok(self.term_entry(term)?.sort)
    }

    fn sort_kind(&self, sort: SortHandle) -> SolverResult<SortKind> {
        Ok(self.sort_entry(sort)?.0.kind)
    }

    fn sort_params(&self, sort: SortHandle) -> SolverResult<SortParams> {
        Ok(self.sort_entry(sort)?.0.params)
    }

    fn options(&self) -> Vec<SolverOption> {
        vec![
            SolverOption::new("incremental", &["true", "false"]),
            SolverOption::new("produce-models", &["true", "false"]),
            SolverOption::new("produce-unsat-assumptions", &["true", "false"]),
            SolverOption::new("produce-unsat-cores", &["true", "false"]),
            SolverOption::new("produce-proofs", &["true", "false"]),
            SolverOption::new("global-declarations", &["true", "false"]),
        ]
    }

    fn set_opt(&mut self, name: &str, value: &str) -> SolverResult<()> {
        self.emit(&format!("(set-option :{} {})", name, value))
    }

    fn assert_formula(&mut self, term: TermHandle) -> SolverResult<()> {
        let repr = self.term_entry(term)?.repr.clone();
        self.emit(&format!("(assert {})", repr))
    }

    fn check_sat(&mut self) -> SolverResult<SatResult> {
        self.assumed.clear();
        self.failed_assumptions.clear();
        self.emit("(check-sat)")?;
        if self.pipe.is_none() {
            return Ok(SatResult::Unknown);
        }
        let answer = self.read_line()?;
        Self::check_answer(&answer)
    }

    fn check_sat_assuming(&mut self, assumptions: &[TermHandle]) -> SolverResult<SatResult> {
        self.assumed = assumptions.to_vec();
        self.failed_assumptions.clear();
        let mut reprs = Vec::with_capacity(assumptions.len());
        for a in assumptions {
            reprs.push(self.term_entry(*a)?.repr.clone());
        }
        self.emit(&format!("(check-sat-assuming ({}))", reprs.join(" ")))?;
        if self.pipe.is_none() {
            return Ok(SatResult::Unknown);
        }
        let answer = self.read_line()?;
        Self::check_answer(&answer)
    }

    fn get_value(&mut self, term: TermHandle) -> SolverResult<TermHandle> {
        let entry = self.term_entry(term)?.clone();
        self.emit(&format!("(get-value ({}))", entry.repr))?;
        if self.pipe.is_none() {
            return Err(SolverError::unsupported("get-value offline"));
        }
        let answer = self.read_sexpr()?;
        if answer.starts_with("(error") {
            return Err(SolverError::failure(answer));
        }
        // Answer shape: ((<term> <value>)); take everything after the term.
        let value = answer
            .trim_start_matches('(')
            .trim_end_matches(')')
            .strip_prefix(entry.repr.as_str())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("unknown-value")
            .to_string();
        Ok(self.new_term(value, entry.sort))
    }

    fn get_unsat_assumptions(&mut self) -> SolverResult<Vec<TermHandle>> {
        self.emit("(get-unsat-assumptions)")?;
        if self.pipe.is_none() {
            return Err(SolverError::unsupported("get-unsat-assumptions offline"));
        }
        let answer = self.read_sexpr()?;
        if answer.starts_with("(error") {
            return Err(SolverError::failure(answer));
        }
        let names: Vec<&str> = answer
            .trim_start_matches('(')
            .trim_end_matches(')')
            .split_whitespace()
            .collect();
        let mut failed = Vec::new();
        for handle in &self.assumed {
            let repr = &self.term_entry(*handle)?.repr;
            if names.iter().any(|n| n == repr) {
                failed.push(*handle);
            }
        }
        if failed.len() != names.len() {
            warn!(
                "solver reported {} unsat assumptions, matched {}",
                names.len(),
                failed.len()
            );
        }
        self.failed_assumptions = failed.clone();
        Ok(failed)
    }

    fn get_unsat_core(&mut self) -> SolverResult<Vec<TermHandle>> {
        self.emit("(get-unsat-core)")?;
        if self.pipe.is_none() {
            return Err(SolverError::unsupported("get-unsat-core offline"));
        }
        let answer = self.read_sexpr()?;
        if answer.starts_with("(error") {
            return Err(SolverError::failure(answer));
        }
        // Core entries are assertion names; unnamed assertions yield an
        // empty core, so there is nothing to map back.
        Ok(Vec::new())
    }

    fn get_model(&mut self) -> SolverResult<String> {
        self.emit("(get-model)")?;
        if self.pipe.is_none() {
            return Err(SolverError::unsupported("get-model offline"));
        }
        let answer = self.read_sexpr()?;
        if answer.starts_with("(error") {
            return Err(SolverError::failure(answer));
        }
        Ok(answer)
    }

    fn get_proof(&mut self) -> SolverResult<String> {
        self.emit("(get-proof)")?;
        if self.pipe.is_none() {
            return Err(SolverError::unsupported("get-proof offline"));
        }
        let answer = self.read_sexpr()?;
        if answer.starts_with("(error") {
            return Err(SolverError::failure(answer));
        }
        Ok(answer)
    }

    fn is_unsat_assumption(&self, term: TermHandle) -> bool {
        self.failed_assumptions.contains(&term)
    }

    fn push(&mut self, n: u32) -> SolverResult<()> {
        self.emit(&format!("(push {})", n))
    }

    fn pop(&mut self, n: u32) -> SolverResult<()> {
        self.emit(&format!("(pop {})", n))
    }

    fn reset(&mut self) -> SolverResult<()> {
        self.emit("(reset)")?;
        self.sorts.clear();
        self.interned.clear();
        self.terms.clear();
        self.assumed.clear();
        self.failed_assumptions.clear();
        Ok(())
    }

    fn reset_assertions(&mut self) -> SolverResult<()> {
        self.emit("(reset-assertions)")?;
        self.assumed.clear();
        self.failed_assumptions.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> Smt2Solver {
        let mut solver = Smt2Solver::offline();
        solver.init().unwrap();
        solver
    }

    #[test]
    fn offline_check_sat_is_unknown() {
        let mut solver = ready();
        assert_eq!(solver.check_sat().unwrap(), SatResult::Unknown);
        assert!(solver.script().contains("(check-sat)"));
    }

    #[test]
    fn declares_consts() {
        let mut solver = ready();
        let bv8 = solver
            .mk_sort(SortKind::Bv, &SortParams::Bv { width: 8 })
            .unwrap();
        solver.mk_const(bv8, "x").unwrap();
        assert!(solver.script().contains("(declare-const x (_ BitVec 8))"));
    }

    #[test]
    fn renders_parameterized_ops() {
        let mut solver = ready();
        let bv8 = solver
            .mk_sort(SortKind::Bv, &SortParams::Bv { width: 8 })
            .unwrap();
        let x = solver.mk_const(bv8, "x").unwrap();
        let t = solver.mk_term(OpKind::BvExtract, &[5, 2], &[x]).unwrap();
        assert_eq!(
            solver.term_entry(t).unwrap().repr,
            "((_ extract 5 2) x)"
        );
        let sort = solver.get_sort(t).unwrap();
        assert_eq!(
            solver.sort_params(sort).unwrap(),
            SortParams::Bv { width: 4 }
        );
    }

    #[test]
    fn renders_quantifiers() {
        let mut solver = ready();
        let int_sort = solver.mk_sort(SortKind::Int, &SortParams::None).unwrap();
        let bool_sort = solver.mk_sort(SortKind::Bool, &SortParams::None).unwrap();
        let v = solver.mk_var(int_sort, "v0").unwrap();
        let body = solver.mk_const(bool_sort, "b").unwrap();
        let q = solver.mk_term(OpKind::Forall, &[], &[v, body]).unwrap();
        assert_eq!(
            solver.term_entry(q).unwrap().repr,
            "(forall ((v0 Int)) b)"
        );
    }

    #[test]
    fn negative_int_values_are_wrapped() {
        let mut solver = ready();
        let int_sort = solver.mk_sort(SortKind::Int, &SortParams::None).unwrap();
        let v = solver.mk_value(int_sort, "-17").unwrap();
        assert_eq!(solver.term_entry(v).unwrap().repr, "(- 17)");
    }

    #[test]
    fn rational_values_are_divisions() {
        let mut solver = ready();
        let real_sort = solver.mk_sort(SortKind::Real, &SortParams::None).unwrap();
        let v = solver.mk_value(real_sort, "3/4").unwrap();
        assert_eq!(solver.term_entry(v).unwrap().repr, "(/ 3 4)");
    }

    #[test]
    fn string_values_escape_quotes() {
        let mut solver = ready();
        let s = solver.mk_sort(SortKind::String, &SortParams::None).unwrap();
        let v = solver.mk_value(s, "a\"b").unwrap();
        assert_eq!(solver.term_entry(v).unwrap().repr, "\"a\"\"b\"");
    }

    #[test]
    fn array_sorts_nest() {
        let mut solver = ready();
        let int_sort = solver.mk_sort(SortKind::Int, &SortParams::None).unwrap();
        let bv4 = solver
            .mk_sort(SortKind::Bv, &SortParams::Bv { width: 4 })
            .unwrap();
        let array = solver
            .mk_sort(
                SortKind::Array,
                &SortParams::Array {
                    index: int_sort,
                    element: bv4,
                },
            )
            .unwrap();
        assert_eq!(solver.sort_entry(array).unwrap().1, "(Array Int (_ BitVec 4))");
    }

    #[test]
    fn inc_dec_are_unsupported() {
        let mut solver = ready();
        let bv8 = solver
            .mk_sort(SortKind::Bv, &SortParams::Bv { width: 8 })
            .unwrap();
        let x = solver.mk_const(bv8, "x").unwrap();
        let err = solver.mk_term(OpKind::BvInc, &[], &[x]).unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn offline_model_queries_are_unsupported() {
        let mut solver = ready();
        let int_sort = solver.mk_sort(SortKind::Int, &SortParams::None).unwrap();
        let x = solver.mk_const(int_sort, "x").unwrap();
        assert!(solver.get_value(x).unwrap_err().is_unsupported());
        assert!(solver.get_model().unwrap_err().is_unsupported());
    }
}
