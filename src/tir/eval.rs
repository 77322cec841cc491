//! Reference evaluator for triple graphs.
//!
//! Walks the execution order of a front-end graph (before temporary allocation),
//! following jumps, and records what the unit writes and which triples ran. It
//! exists to check lowered jump chains against the Boolean value they replace:
//! a chain built for `(t, sense, target)` must reach `target` exactly when `t`
//! would have evaluated to `sense`.
//!
//! Values follow the scripting language's model: every value is a string with
//! a numeric interpretation (its leading integer prefix, 0 when there is none).
//! Compares leave a condition value that the following jump tests.

use crate::core::compiler::CompileContext;
use crate::core::opcode::Opcode;
use crate::core::session::LiteralPool;
use crate::core::triple::{Operand, TempClass, TripleGraph, TripleId};
use hashbrown::HashMap;
use std::cmp::Ordering;
use std::fmt;

/// A dynamically-typed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Str(String),
}

impl Value {
    fn bool(b: bool) -> Self {
        Value::Int(b as i64)
    }

    /// Numeric interpretation.
    pub fn num(&self) -> i64 {
        match self {
            Value::Int(n) => *n,
            Value::Str(s) => {
                let digits_start = usize::from(s.starts_with(['-', '+']));
                let end = s[digits_start..]
                    .find(|c: char| !c.is_ascii_digit())
                    .map_or(s.len(), |i| i + digits_start);
                s[..end].parse().unwrap_or(0)
            }
        }
    }

    pub fn text(&self) -> String {
        match self {
            Value::Int(n) => n.to_string(),
            Value::Str(s) => s.clone(),
        }
    }

    pub fn truth(&self) -> bool {
        self.num() != 0
    }

    /// Canonical numbers collate before strings, in numeric order.
    fn collation_key(&self) -> (u8, i64, String) {
        match self {
            Value::Int(n) => (0, *n, String::new()),
            Value::Str(s) => match s.parse::<i64>() {
                Ok(n) if n.to_string() == *s => (0, n, String::new()),
                _ => (1, 0, s.clone()),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
        }
    }
}

fn sign(ord: Ordering) -> i64 {
    match ord {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// What an evaluation produced.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    /// One entry per executed write.
    pub output: Vec<String>,
    /// Returned value, if the unit returns one.
    pub result: Option<Value>,
    /// Triples in the order they executed.
    pub executed: Vec<TripleId>,
}

impl Outcome {
    pub fn ran(&self, id: TripleId) -> bool {
        self.executed.contains(&id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum VarKey {
    Slot(u32),
    Triple(TripleId),
}

/// Interpreter over a front-end triple graph.
pub struct Evaluator<'g, 'arena> {
    graph: &'g TripleGraph,
    literals: &'g LiteralPool<'arena>,
    test: bool,
    step_limit: usize,
}

struct State {
    values: HashMap<TripleId, Value>,
    vars: HashMap<VarKey, Value>,
    cond: i64,
    test: bool,
}

impl<'g, 'arena> Evaluator<'g, 'arena> {
    pub fn new(ctx: &'g CompileContext<'arena>) -> Self {
        Self {
            graph: &ctx.graph,
            literals: &ctx.literals,
            test: false,
            step_limit: 100_000,
        }
    }

    /// Initial value of the truth flag tested by `gettruth` and `jmptset`.
    pub fn with_test(mut self, test: bool) -> Self {
        self.test = test;
        self
    }

    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    /// Run the unit. `ret` is the operand the unit returns when it runs off
    /// the end of the execution order.
    pub fn run(&self, ret: Option<Operand>) -> Result<Outcome, String> {
        let mut state = State {
            values: HashMap::new(),
            vars: HashMap::new(),
            cond: 0,
            test: self.test,
        };
        let mut outcome = Outcome::default();
        let mut pc = self.graph.head();
        let mut returned = false;

        while let Some(id) = pc {
            if outcome.executed.len() >= self.step_limit {
                return Err(format!("step limit of {} exceeded at {id}", self.step_limit));
            }
            outcome.executed.push(id);
            pc = self.graph.next(id);
            let t = &self.graph[id];

            match t.opcode {
                Opcode::Ret => {
                    returned = true;
                    break;
                }
                Opcode::RetArg => {
                    outcome.result = Some(self.operand(&state, t.operands[0])?);
                    returned = true;
                    break;
                }
                Opcode::Write => {
                    let mut line = String::new();
                    for op in t.operands.iter().filter(|op| !op.is_empty()) {
                        line.push_str(&self.operand(&state, *op)?.text());
                    }
                    log::trace!("eval {id}: write {line:?}");
                    outcome.output.push(line);
                }
                Opcode::Sto | Opcode::StoLit => {
                    let var = match t.operands[0] {
                        Operand::Triple(var) => self.var_key(var),
                        other => return Err(format!("{id}: store target {other} is not a variable")),
                    };
                    let value = self.operand(&state, t.operands[1])?;
                    state.vars.insert(var, value);
                }
                op if op.is_jump() => {
                    if self.jump_taken(&state, id, op) {
                        let Operand::Jump(target) = t.operands[0] else {
                            return Err(format!("{id}: {op} has no jump target"));
                        };
                        if !self.graph[target].is_linked() {
                            return Err(format!("{id}: jump to unplaced {target}"));
                        }
                        pc = Some(target);
                    }
                }
                _ => {
                    if let Some(value) = self.evaluate(&mut state, id)? {
                        state.values.insert(id, value);
                    }
                }
            }
        }

        if !returned {
            if let Some(op) = ret {
                outcome.result = Some(self.operand(&state, op)?);
            }
        }
        Ok(outcome)
    }

    fn jump_taken(&self, state: &State, id: TripleId, op: Opcode) -> bool {
        let c = state.cond;
        let taken = match op {
            Opcode::Jmp => true,
            Opcode::JmpEqu => c == 0,
            Opcode::JmpNeq => c != 0,
            Opcode::JmpGtr => c > 0,
            Opcode::JmpLeq => c <= 0,
            Opcode::JmpLss => c < 0,
            Opcode::JmpGeq => c >= 0,
            Opcode::JmpTSet => state.test,
            Opcode::JmpTClr => !state.test,
            other => unreachable!("{other} is not a jump"),
        };
        log::trace!("eval {id}: {op} on {c} {}", if taken { "taken" } else { "falls through" });
        taken
    }

    fn var_key(&self, var: TripleId) -> VarKey {
        match self.graph[var].destination {
            Operand::Temp(slot) if slot.class == TempClass::Var => VarKey::Slot(slot.index),
            _ => VarKey::Triple(var),
        }
    }

    fn operand(&self, state: &State, op: Operand) -> Result<Value, String> {
        match op {
            Operand::Triple(id) if self.graph[id].opcode == Opcode::Var => Ok(state
                .vars
                .get(&self.var_key(id))
                .cloned()
                .unwrap_or_else(|| Value::Str(String::new()))),
            Operand::Triple(id) => state
                .values
                .get(&id)
                .cloned()
                .ok_or_else(|| format!("{id} ({}) read before it was evaluated", self.graph[id].opcode)),
            Operand::Ilit(n) => Ok(Value::Int(n as i64)),
            Operand::Mlit(lit) => Ok(Value::Str(self.literals.get(lit).to_string())),
            other => Err(format!("operand {other} has no value")),
        }
    }

    fn operands(&self, state: &State, id: TripleId) -> Result<(Value, Value), String> {
        let [a, b] = self.graph[id].operands;
        Ok((self.operand(state, a)?, self.operand(state, b)?))
    }

    /// Compute the value of a non-control triple. Compares also set the
    /// condition value.
    fn evaluate(&self, state: &mut State, id: TripleId) -> Result<Option<Value>, String> {
        use Opcode::*;

        let t = &self.graph[id];
        let op = t.opcode;
        let value = match op {
            Noop | Parameter | LineStart | LineFetch | Fetch | Var | GvSavTarg | GvRecTarg | CdAddr => {
                return Ok(None)
            }
            Ilit | Lit | PassThru => self.operand(state, t.operands[0])?,
            GetTruth => Value::bool(state.test),

            CoBool | SCoBool => {
                let truth = self.operand(state, t.operands[0])?.truth();
                state.cond = truth as i64;
                Value::bool(truth)
            }
            Com => Value::bool(!self.operand(state, t.operands[0])?.truth()),

            Equ | NEqu | Pattern | NPattern | Contain | NContain | Follow | NFollow | SortsAfter
            | NSortsAfter | Gt | NGt | Lt | NLt | NumCmp => {
                let (a, b) = self.operands(state, id)?;
                let c = compare(op, &a, &b)?;
                state.cond = c;
                let positive = match op {
                    Equ | NEqu | Pattern | NPattern | Contain | NContain => c != 0,
                    Follow | NFollow | SortsAfter | NSortsAfter | Gt | NGt => c > 0,
                    Lt | NLt => c < 0,
                    _ => return Ok(Some(Value::Int(c))),
                };
                Value::bool(positive != op.info().negated)
            }

            And | NAnd | SAnd | SNAnd | Or | NOr | SOr | SNOr => {
                let (a, b) = self.operands(state, id)?;
                let combined = match op {
                    And | NAnd | SAnd | SNAnd => a.truth() && b.truth(),
                    _ => a.truth() || b.truth(),
                };
                Value::bool(combined != op.info().negated)
            }

            Add | Sub | Mul => {
                let (a, b) = self.operands(state, id)?;
                let (a, b) = (a.num(), b.num());
                Value::Int(match op {
                    Add => a.wrapping_add(b),
                    Sub => a.wrapping_sub(b),
                    _ => a.wrapping_mul(b),
                })
            }
            Neg => Value::Int(self.operand(state, t.operands[0])?.num().wrapping_neg()),
            Cat => {
                let (a, b) = self.operands(state, id)?;
                Value::Str(a.text() + &b.text())
            }
            FnLength => Value::Int(self.operand(state, t.operands[0])?.text().chars().count() as i64),

            other => return Err(format!("{id}: {other} cannot be evaluated")),
        };
        log::trace!("eval {id}: {op} = {value:?}");
        Ok(Some(value))
    }
}

/// Condition value of a compare: 1/0 for the equality-like relations, the
/// ordering sign for the others.
fn compare(op: Opcode, a: &Value, b: &Value) -> Result<i64, String> {
    use Opcode::*;
    Ok(match op {
        Equ | NEqu => (a.text() == b.text()) as i64,
        Contain | NContain => a.text().contains(&b.text()) as i64,
        Pattern | NPattern => pattern_match(&a.text(), &b.text())? as i64,
        Follow | NFollow => sign(a.text().cmp(&b.text())),
        SortsAfter | NSortsAfter => sign(a.collation_key().cmp(&b.collation_key())),
        Gt | NGt | Lt | NLt | NumCmp => sign(a.num().cmp(&b.num())),
        other => unreachable!("{other} is not a compare"),
    })
}

#[derive(Debug)]
enum PatternElem {
    Codes(String),
    Literal(Vec<char>),
}

#[derive(Debug)]
struct PatternAtom {
    min: usize,
    max: usize,
    elem: PatternElem,
}

/// Match `subject` against a pattern of repetition atoms, e.g. `3N1"-"4N` or
/// `1U.L`. Counts are `n`, `.`, `n.`, `.m` or `n.m`; codes are N (digit),
/// A (letter), U (upper), L (lower), P (punctuation), C (control), E (any).
pub fn pattern_match(subject: &str, pattern: &str) -> Result<bool, String> {
    let atoms = parse_pattern(pattern)?;
    let chars: Vec<char> = subject.chars().collect();
    Ok(match_atoms(&atoms, &chars))
}

fn parse_pattern(pattern: &str) -> Result<Vec<PatternAtom>, String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    let mut atoms = Vec::new();
    let number = |i: &mut usize| -> Option<usize> {
        let start = *i;
        while *i < chars.len() && chars[*i].is_ascii_digit() {
            *i += 1;
        }
        chars[start..*i].iter().collect::<String>().parse().ok()
    };

    while i < chars.len() {
        let low = number(&mut i);
        let (min, max) = if i < chars.len() && chars[i] == '.' {
            i += 1;
            (low.unwrap_or(0), number(&mut i).unwrap_or(usize::MAX))
        } else {
            match low {
                Some(n) => (n, n),
                None => return Err(format!("pattern '{pattern}': expected a repetition count")),
            }
        };

        let elem = if i < chars.len() && chars[i] == '"' {
            i += 1;
            let mut lit = Vec::new();
            loop {
                match chars.get(i) {
                    None => return Err(format!("pattern '{pattern}': unterminated literal")),
                    Some('"') if chars.get(i + 1) == Some(&'"') => {
                        lit.push('"');
                        i += 2;
                    }
                    Some('"') => {
                        i += 1;
                        break;
                    }
                    Some(&c) => {
                        lit.push(c);
                        i += 1;
                    }
                }
            }
            PatternElem::Literal(lit)
        } else {
            let start = i;
            while i < chars.len() && "ACELNPUacelnpu".contains(chars[i]) {
                i += 1;
            }
            if start == i {
                return Err(format!("pattern '{pattern}': expected a pattern code"));
            }
            PatternElem::Codes(chars[start..i].iter().collect::<String>().to_ascii_uppercase())
        };
        atoms.push(PatternAtom { min, max, elem });
    }
    Ok(atoms)
}

fn code_matches(codes: &str, c: char) -> bool {
    codes.chars().any(|code| match code {
        'N' => c.is_ascii_digit(),
        'A' => c.is_alphabetic(),
        'U' => c.is_uppercase(),
        'L' => c.is_lowercase(),
        'P' => c.is_ascii_punctuation() || c == ' ',
        'C' => c.is_control(),
        'E' => true,
        _ => false,
    })
}

fn match_atoms(atoms: &[PatternAtom], subject: &[char]) -> bool {
    let Some((atom, rest)) = atoms.split_first() else {
        return subject.is_empty();
    };
    match &atom.elem {
        PatternElem::Codes(codes) => {
            let run = subject.iter().take_while(|&&c| code_matches(codes, c)).count();
            let upper = run.min(atom.max);
            (atom.min..=upper)
                .rev()
                .any(|n| match_atoms(rest, &subject[n..]))
        }
        PatternElem::Literal(lit) => {
            let mut pos = 0;
            let mut reps = 0;
            loop {
                if reps >= atom.min && match_atoms(rest, &subject[pos..]) {
                    return true;
                }
                if reps == atom.max || !subject[pos..].starts_with(lit) || lit.is_empty() {
                    return false;
                }
                pos += lit.len();
                reps += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::compiler::CompileOptions;
    use crate::tir::parser::parse_into;
    use bumpalo::Bump;

    fn run(text: &str) -> Outcome {
        let arena = Bump::new();
        let mut ctx = CompileContext::new(&arena, CompileOptions::default());
        let unit = parse_into(&mut ctx, text).unwrap();
        Evaluator::new(&ctx).run(unit.parsed.ret).unwrap()
    }

    #[test]
    fn test_numeric_interpretation() {
        assert_eq!(Value::Str("12abc".into()).num(), 12);
        assert_eq!(Value::Str("-3".into()).num(), -3);
        assert_eq!(Value::Str("abc".into()).num(), 0);
        assert_eq!(Value::Str("".into()).num(), 0);
        assert!(Value::Str("1".into()).truth());
        assert!(!Value::Str("0x".into()).truth());
    }

    #[test]
    fn test_patterns() {
        assert!(pattern_match("123-4567", "3N1\"-\"4N").unwrap());
        assert!(!pattern_match("12-4567", "3N1\"-\"4N").unwrap());
        assert!(pattern_match("Smith", "1U.L").unwrap());
        assert!(pattern_match("", ".E").unwrap());
        assert!(pattern_match("ab12", "1.3A2N").unwrap());
        assert!(!pattern_match("ab", "3A").unwrap());
        assert!(pattern_match("abab", ".\"ab\"").unwrap());
        assert!(pattern_match_err("N"));
        assert!(pattern_match_err("1\"ab"));
    }

    fn pattern_match_err(p: &str) -> bool {
        pattern_match("x", p).is_err()
    }

    #[test]
    fn test_arithmetic_and_writes() {
        let out = run(r#"
%a = lit "40"
%b = ilit #2
%c = add %a, %b
%s = lit "n="
%d = cat %s, %c
write %d
%l = fnlength %d
ret %l
"#);
        assert_eq!(out.output, vec!["n=42"]);
        assert_eq!(out.result, Some(Value::Int(4)));
    }

    #[test]
    fn test_variables() {
        let out = run(r#"
%v = var -> var[0]
%a = lit "7"
sto %v, %a
%w = var -> var[0]
%b = mul %w, %w
ret %b
"#);
        assert_eq!(out.result, Some(Value::Int(49)));
    }

    #[test]
    fn test_jumps_follow_condition() {
        let out = run(r#"
%a = lit "b"
%b = lit "a"
%f = follow %a, %b
jmpgtr ^yes
write "no"
jmp ^end
yes:
write "yes"
end:
"#);
        assert_eq!(out.output, vec!["yes"]);
    }

    #[test]
    fn test_collation_orders_numbers_first() {
        let a = Value::Str("10".into());
        let b = Value::Str("9".into());
        let s = Value::Str("1a".into());
        assert_eq!(compare(Opcode::SortsAfter, &a, &b).unwrap(), 1);
        assert_eq!(compare(Opcode::Follow, &a, &b).unwrap(), -1);
        assert_eq!(compare(Opcode::SortsAfter, &s, &a).unwrap(), 1);
    }

    #[test]
    fn test_unevaluated_read_is_an_error() {
        let arena = Bump::new();
        let mut ctx = CompileContext::new(&arena, CompileOptions::default());
        let unit = parse_into(
            &mut ctx,
            "jmp ^skip\n%a = lit \"1\"\nskip:\nwrite %a\n",
        )
        .unwrap();
        let err = Evaluator::new(&ctx).run(unit.parsed.ret).unwrap_err();
        assert!(err.contains("read before it was evaluated"), "{err}");
    }

    #[test]
    fn test_step_limit() {
        let arena = Bump::new();
        let mut ctx = CompileContext::new(&arena, CompileOptions::default());
        parse_into(&mut ctx, "top:\njmp ^top\n").unwrap();
        let err = Evaluator::new(&ctx).with_step_limit(50).run(None).unwrap_err();
        assert!(err.contains("step limit"), "{err}");
    }
}
