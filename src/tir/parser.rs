//! TIR (textual triple) parser.
//!
//! A TIR unit is a sequence of lines, each holding one statement:
//!
//! ```text
//! ; comment
//! %a = lit "abc"              ; named triple
//! %v = var -> var[1]          ; preset destination
//! %c = equ %a, %v
//! lower %c, false, ^skip      ; Boolean lowering of %c towards ^skip
//! write %a
//! skip:                       ; label, a no-op jump target
//! ret %a                      ; end of unit, optional returned operand
//! ```
//!
//! Operands are `%name` (triple), `#n` (integer literal), `"text"` (interned
//! literal, `""` escapes a quote), `^label` (jump target) and `-` (empty).
//! Labels may be referenced before they are defined; they are created unlinked
//! and placed when their definition is reached. Parsing builds the graph
//! directly in the compile context and lowers Boolean triples as the
//! directives are met, the way a front end does while it parses.

use crate::core::compiler::{CompileContext, Parsed};
use crate::core::opcode::Opcode;
use crate::core::triple::{Operand, TempClass, TempSlot, TripleId};
use hashbrown::HashMap;

/// Result of parsing a TIR unit into a compile context.
#[derive(Debug, Clone)]
pub struct TirUnit {
    pub parsed: Parsed,
    pub values: HashMap<String, TripleId>,
    pub labels: HashMap<String, TripleId>,
}

impl TirUnit {
    /// Triple named `%name` or label `name`.
    pub fn get(&self, name: &str) -> Option<TripleId> {
        match name.strip_prefix('%') {
            Some(value) => self.values.get(value).copied(),
            None => self.labels.get(name).copied(),
        }
    }

    /// Like [`TirUnit::get`], panicking on unknown names.
    pub fn id(&self, name: &str) -> TripleId {
        self.get(name)
            .unwrap_or_else(|| panic!("no triple or label named '{name}'"))
    }
}

/// Parse `text` and append its triples to `ctx`.
pub fn parse_into(ctx: &mut CompileContext<'_>, text: &str) -> Result<TirUnit, String> {
    let parser = Parser::new(text, ctx);
    parser.parse()
}

struct Parser<'a, 'c, 'arena> {
    text: &'a str,
    pos: usize,
    ctx: &'c mut CompileContext<'arena>,
    values: HashMap<&'a str, TripleId>,
    labels: HashMap<&'a str, TripleId>,
}

enum Statement {
    Continue,
    Ret(Option<Operand>),
}

impl<'a, 'c, 'arena> Parser<'a, 'c, 'arena> {
    fn new(text: &'a str, ctx: &'c mut CompileContext<'arena>) -> Self {
        Self {
            text,
            pos: 0,
            ctx,
            values: HashMap::new(),
            labels: HashMap::new(),
        }
    }

    fn parse(mut self) -> Result<TirUnit, String> {
        let mut ret = None;
        loop {
            self.skip_whitespace(true);
            if self.is_eof() {
                break;
            }
            match self.parse_statement().map_err(|e| self.located(e))? {
                Statement::Continue => {}
                Statement::Ret(value) => {
                    ret = Some(value);
                    break;
                }
            }
        }

        for (name, &id) in &self.labels {
            if !self.ctx.graph[id].is_linked() {
                return Err(format!("label '{name}' is used but never defined"));
            }
        }

        let parsed = Parsed {
            consumed: self.pos,
            ret: ret.flatten(),
        };
        log::debug!(
            "parsed TIR unit: {} triples, {} labels, {} of {} bytes consumed",
            self.ctx.graph.len(),
            self.labels.len(),
            parsed.consumed,
            self.text.len()
        );
        Ok(TirUnit {
            parsed,
            values: self.values.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            labels: self.labels.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        })
    }

    fn located(&self, msg: String) -> String {
        let line = self.text[..self.pos.min(self.text.len())].matches('\n').count() + 1;
        format!("line {line}: {msg}")
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn current_char(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.pos += ch.len_utf8();
        }
    }

    fn skip_whitespace(&mut self, skip_newlines: bool) {
        while let Some(ch) = self.current_char() {
            if ch == ';' {
                // Comment runs to the end of the line
                while let Some(ch) = self.current_char() {
                    if ch == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if ch.is_whitespace() {
                if ch == '\n' && !skip_newlines {
                    break;
                }
                self.advance();
            } else {
                break;
            }
        }
    }

    fn at_line_end(&mut self) -> bool {
        self.skip_whitespace(false);
        matches!(self.current_char(), None | Some('\n'))
    }

    fn expect_line_end(&mut self) -> Result<(), String> {
        if self.at_line_end() {
            Ok(())
        } else {
            Err(format!("unexpected {:?} at end of statement", self.current_char()))
        }
    }

    fn try_read(&mut self, ch: char) -> bool {
        self.skip_whitespace(false);
        if self.current_char() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, ch: char) -> Result<(), String> {
        if !self.try_read(ch) {
            return Err(format!("expected '{}' but found {:?}", ch, self.current_char()));
        }
        Ok(())
    }

    fn read_identifier(&mut self) -> Result<&'a str, String> {
        self.skip_whitespace(false);
        let start = self.pos;
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                self.advance();
            } else {
                break;
            }
        }
        if start == self.pos {
            return Err(format!("expected identifier but found {:?}", self.current_char()));
        }
        Ok(&self.text[start..self.pos])
    }

    fn read_integer(&mut self) -> Result<i32, String> {
        let start = self.pos;
        if self.current_char() == Some('-') {
            self.advance();
        }
        while matches!(self.current_char(), Some(ch) if ch.is_ascii_digit()) {
            self.advance();
        }
        self.text[start..self.pos]
            .parse()
            .map_err(|e| format!("bad integer '{}': {}", &self.text[start..self.pos], e))
    }

    fn read_string(&mut self) -> Result<String, String> {
        self.expect('"')?;
        let mut out = String::new();
        loop {
            match self.current_char() {
                None | Some('\n') => return Err("unterminated string literal".to_string()),
                Some('"') => {
                    self.advance();
                    if self.current_char() == Some('"') {
                        out.push('"');
                        self.advance();
                    } else {
                        return Ok(out);
                    }
                }
                Some(ch) => {
                    out.push(ch);
                    self.advance();
                }
            }
        }
    }

    fn label(&mut self, name: &'a str) -> TripleId {
        let graph = &mut self.ctx.graph;
        *self.labels.entry(name).or_insert_with(|| graph.make(Opcode::Noop))
    }

    fn parse_statement(&mut self) -> Result<Statement, String> {
        if self.current_char() == Some('%') {
            self.advance();
            let name = self.read_identifier()?;
            self.expect('=')?;
            let op = self.read_identifier()?;
            self.parse_instruction(Some(name), op)?;
            return Ok(Statement::Continue);
        }

        let word = self.read_identifier()?;
        if self.try_read(':') {
            let id = self.label(word);
            if self.ctx.graph[id].is_linked() {
                return Err(format!("label '{word}' defined twice"));
            }
            self.ctx.graph.append(id);
            self.expect_line_end()?;
            return Ok(Statement::Continue);
        }

        match word {
            "lower" => {
                let t = match self.parse_operand()? {
                    Operand::Triple(t) => t,
                    other => return Err(format!("lower expects a triple, found {other}")),
                };
                self.expect(',')?;
                let sense = match self.read_identifier()? {
                    "true" => true,
                    "false" => false,
                    other => return Err(format!("expected true or false, found '{other}'")),
                };
                self.expect(',')?;
                let target = match self.parse_operand()? {
                    Operand::Jump(target) => target,
                    other => return Err(format!("lower expects a ^label target, found {other}")),
                };
                let opcode = self.ctx.graph[t].opcode;
                if !opcode.info().boolean {
                    return Err(format!("{opcode} cannot be lowered as a Boolean"));
                }
                self.ctx.lower_bool(t, sense, target);
                self.expect_line_end()?;
                Ok(Statement::Continue)
            }
            "ret" => {
                let value = if self.at_line_end() {
                    None
                } else {
                    Some(self.parse_operand()?)
                };
                // Anything after the returned operand on this line is left for
                // the finalizer to reject.
                if self.at_line_end() {
                    self.skip_whitespace(true);
                }
                Ok(Statement::Ret(value))
            }
            op => {
                self.parse_instruction(None, op)?;
                Ok(Statement::Continue)
            }
        }
    }

    fn parse_instruction(&mut self, name: Option<&'a str>, op: &str) -> Result<(), String> {
        let opcode = Opcode::parse(op).ok_or_else(|| format!("unknown opcode '{op}'"))?;
        if matches!(opcode, Opcode::Ret | Opcode::RetArg) {
            return Err("the return triple is appended by the finalizer; use 'ret'".to_string());
        }

        let mut operands = [Operand::Empty; 2];
        let mut count = 0;
        if !self.at_line_end() && !self.at_arrow() {
            loop {
                if count == 2 {
                    return Err(format!("{opcode} takes at most two operands"));
                }
                operands[count] = self.parse_operand()?;
                count += 1;
                if !self.try_read(',') {
                    break;
                }
            }
        }

        let destination = if self.at_arrow() {
            self.pos += 2;
            self.parse_destination()?
        } else {
            Operand::Empty
        };
        self.expect_line_end()?;
        if let Some(name) = name {
            if self.values.contains_key(name) {
                return Err(format!("value %{name} defined twice"));
            }
        }

        let id = self.ctx.graph.push(opcode);
        self.ctx.graph[id].operands = operands;
        self.ctx.graph[id].destination = destination;
        if let Some(name) = name {
            self.values.insert(name, id);
        }
        Ok(())
    }

    fn at_arrow(&mut self) -> bool {
        self.skip_whitespace(false);
        self.text[self.pos..].starts_with("->")
    }

    fn parse_operand(&mut self) -> Result<Operand, String> {
        self.skip_whitespace(false);
        match self.current_char() {
            Some('%') => {
                self.advance();
                let name = self.read_identifier()?;
                self.values
                    .get(name)
                    .map(|&id| Operand::Triple(id))
                    .ok_or_else(|| format!("undefined value %{name}"))
            }
            Some('#') => {
                self.advance();
                Ok(Operand::Ilit(self.read_integer()?))
            }
            Some('"') => {
                let text = self.read_string()?;
                Ok(Operand::Mlit(self.ctx.literals.intern(&text)))
            }
            Some('^') => {
                self.advance();
                let name = self.read_identifier()?;
                Ok(Operand::Jump(self.label(name)))
            }
            Some('-') => {
                self.advance();
                Ok(Operand::Empty)
            }
            other => Err(format!("expected operand but found {other:?}")),
        }
    }

    fn parse_destination(&mut self) -> Result<Operand, String> {
        self.skip_whitespace(false);
        if self.current_char() == Some('%') {
            return self.parse_operand();
        }
        let class_name = self.read_identifier()?;
        let class = TempClass::parse(class_name)
            .ok_or_else(|| format!("unknown temporary class '{class_name}'"))?;
        self.expect('[')?;
        let index = self.read_integer()?;
        self.expect(']')?;
        let index = u32::try_from(index).map_err(|_| format!("negative slot index {index}"))?;
        Ok(Operand::Temp(TempSlot::new(class, index)))
    }
}
