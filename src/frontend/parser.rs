//! Recursive-descent MAVN parser.
//!
//! ```text
//! Q -> S ; L            L -> eof | Q
//! S -> _mem mid num | _reg rid | _func id | id : E | E
//! E -> add rid, rid, rid | addi rid, rid, num | sub rid, rid, rid
//!    | and rid, rid, rid | or rid, rid, rid | not rid, rid
//!    | la rid, mid | li rid, num | lw rid, num(rid) | sw rid, num(rid)
//!    | b id | bltz rid, id | bne rid, rid, id | nop
//! ```
//!
//! The parser builds the IR directly through [`ProgramBuilder`] and checks
//! the program-level rules: unique declarations, declared operands, defined
//! labels and a single leading function.

use super::lexer::{tokenize, Token, TokenKind};
use crate::core::error::CompileResult;
use crate::core::ir::{Opcode, Program, ProgramBuilder, VarId};
use hashbrown::HashMap;
use thiserror::Error;

/// Syntax and declaration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Expected {expected} but found {found} '{text}' at {line}:{column}")]
    UnexpectedToken {
        expected: String,
        found: TokenKind,
        text: String,
        line: usize,
        column: usize,
    },

    #[error("Invalid number '{text}' at {line}:{column}")]
    InvalidNumber {
        text: String,
        line: usize,
        column: usize,
    },

    #[error("Memory variable {name} already exists")]
    DuplicateMemory { name: String },

    #[error("Register variable {name} already exists")]
    DuplicateRegister { name: String },

    #[error("Label {name} is already defined")]
    DuplicateLabel { name: String },

    #[error("Variable {name} is not declared ({line}:{column})")]
    UndeclaredVariable {
        name: String,
        line: usize,
        column: usize,
    },

    #[error("Label {name} is used but never defined")]
    LabelNeverDefined { name: String },

    #[error("Program does not start with a function")]
    NoEntryFunction,

    #[error("Program has {count} functions, only one is allowed")]
    TooManyFunctions { count: usize },
}

/// Parse MAVN source text into a [`Program`].
pub fn parse_program(text: &str) -> CompileResult<Program> {
    let tokens = tokenize(text)?;
    Parser::new(&tokens).parse()
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    builder: ProgramBuilder,

    registers: HashMap<String, VarId>,
    memory: HashMap<String, VarId>,
    labels: HashMap<String, VarId>,
    /// Label waiting for the next instruction.
    pending_label: Option<VarId>,
    functions: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            builder: ProgramBuilder::new(),
            registers: HashMap::new(),
            memory: HashMap::new(),
            labels: HashMap::new(),
            pending_label: None,
            functions: 0,
        }
    }

    fn parse(mut self) -> CompileResult<Program> {
        self.q()?;
        self.check_labels()?;
        self.check_functions()?;
        let program = self.builder.finish();
        log::debug!(
            "Parsed {} instructions, {} registers, {} memory variables",
            program.len(),
            program.register_count(),
            program.memory_vars().len()
        );
        Ok(program)
    }

    fn current(&self) -> &'t Token {
        // The token list always ends with Eof and we never advance past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> &'t Token {
        let token = self.current();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind) -> CompileResult<&'t Token> {
        let token = self.current();
        if token.kind != kind {
            return Err(unexpected(kind.to_string(), token).into());
        }
        Ok(self.advance())
    }

    // Q -> S ; L   and   L -> eof | Q
    fn q(&mut self) -> CompileResult<()> {
        loop {
            self.s()?;
            self.expect(TokenKind::Semicolon)?;
            if self.current().kind == TokenKind::Eof {
                return Ok(());
            }
        }
    }

    fn s(&mut self) -> CompileResult<()> {
        match self.current().kind {
            TokenKind::Mem => {
                self.advance();
                let name = self.expect(TokenKind::MemId)?;
                if self.memory.contains_key(&name.text) {
                    return Err(ParseError::DuplicateMemory { name: name.text.clone() }.into());
                }
                let value = self.number()?;
                let id = self.builder.memory(name.text.clone(), value);
                self.memory.insert(name.text.clone(), id);
            }
            TokenKind::Reg => {
                self.advance();
                let name = self.expect(TokenKind::RegId)?;
                if self.registers.contains_key(&name.text) {
                    return Err(ParseError::DuplicateRegister { name: name.text.clone() }.into());
                }
                let id = self.builder.register(name.text.clone());
                self.registers.insert(name.text.clone(), id);
            }
            TokenKind::Func => {
                self.advance();
                let name = self.expect(TokenKind::Id)?;
                let label = self.define_label(name)?;
                self.builder.entry(label)?;
                self.functions += 1;
            }
            TokenKind::Id => {
                let name = self.advance();
                let label = self.define_label(name)?;
                self.expect(TokenKind::Colon)?;
                self.pending_label = Some(label);
                self.e()?;
            }
            _ => self.e()?,
        }
        Ok(())
    }

    fn e(&mut self) -> CompileResult<()> {
        if self.functions == 0 {
            return Err(ParseError::NoEntryFunction.into());
        }
        let token = self.current();
        let opcode = match token.kind {
            TokenKind::Add => Opcode::Add,
            TokenKind::Addi => Opcode::Addi,
            TokenKind::Sub => Opcode::Sub,
            TokenKind::And => Opcode::And,
            TokenKind::Or => Opcode::Or,
            TokenKind::Not => Opcode::Not,
            TokenKind::La => Opcode::La,
            TokenKind::Li => Opcode::Li,
            TokenKind::Lw => Opcode::Lw,
            TokenKind::Sw => Opcode::Sw,
            TokenKind::B => Opcode::B,
            TokenKind::Bltz => Opcode::Bltz,
            TokenKind::Bne => Opcode::Bne,
            TokenKind::Nop => Opcode::Nop,
            _ => return Err(unexpected("an instruction".to_string(), token).into()),
        };
        self.advance();

        let (dst, src): (Vec<VarId>, Vec<VarId>) = match opcode {
            Opcode::Add | Opcode::Sub | Opcode::And | Opcode::Or => {
                let d = self.register()?;
                self.expect(TokenKind::Comma)?;
                let s1 = self.register()?;
                self.expect(TokenKind::Comma)?;
                let s2 = self.register()?;
                (vec![d], vec![s1, s2])
            }
            Opcode::Addi => {
                let d = self.register()?;
                self.expect(TokenKind::Comma)?;
                let s = self.register()?;
                self.expect(TokenKind::Comma)?;
                let c = self.constant()?;
                (vec![d], vec![s, c])
            }
            Opcode::Not => {
                let d = self.register()?;
                self.expect(TokenKind::Comma)?;
                let s = self.register()?;
                (vec![d], vec![s])
            }
            Opcode::La => {
                let d = self.register()?;
                self.expect(TokenKind::Comma)?;
                let m = self.memory_var()?;
                (vec![d], vec![m])
            }
            Opcode::Li => {
                let d = self.register()?;
                self.expect(TokenKind::Comma)?;
                let c = self.constant()?;
                (vec![d], vec![c])
            }
            Opcode::Lw => {
                let d = self.register()?;
                self.expect(TokenKind::Comma)?;
                let (c, base) = self.offset_address()?;
                (vec![d], vec![c, base])
            }
            Opcode::Sw => {
                let s = self.register()?;
                self.expect(TokenKind::Comma)?;
                let (c, base) = self.offset_address()?;
                (vec![], vec![s, c, base])
            }
            Opcode::B => {
                let l = self.label_ref()?;
                (vec![], vec![l])
            }
            Opcode::Bltz => {
                let s = self.register()?;
                self.expect(TokenKind::Comma)?;
                let l = self.label_ref()?;
                (vec![], vec![s, l])
            }
            Opcode::Bne => {
                let s1 = self.register()?;
                self.expect(TokenKind::Comma)?;
                let s2 = self.register()?;
                self.expect(TokenKind::Comma)?;
                let l = self.label_ref()?;
                (vec![], vec![s1, s2, l])
            }
            Opcode::Nop => (vec![], vec![]),
        };

        let inst = self.builder.instruction(opcode, &dst, &src)?;
        if let Some(label) = self.pending_label.take() {
            self.builder.attach_label(inst, label)?;
        }
        Ok(())
    }

    /// `num ( rid )`
    fn offset_address(&mut self) -> CompileResult<(VarId, VarId)> {
        let c = self.constant()?;
        self.expect(TokenKind::LParen)?;
        let base = self.register()?;
        self.expect(TokenKind::RParen)?;
        Ok((c, base))
    }

    fn number(&mut self) -> CompileResult<i32> {
        let token = self.expect(TokenKind::Num)?;
        token.text.parse().map_err(|_| {
            ParseError::InvalidNumber {
                text: token.text.clone(),
                line: token.line,
                column: token.column,
            }
            .into()
        })
    }

    fn constant(&mut self) -> CompileResult<VarId> {
        let value = self.number()?;
        Ok(self.builder.constant(value))
    }

    fn register(&mut self) -> CompileResult<VarId> {
        let token = self.expect(TokenKind::RegId)?;
        lookup(&self.registers, token)
    }

    fn memory_var(&mut self) -> CompileResult<VarId> {
        let token = self.expect(TokenKind::MemId)?;
        lookup(&self.memory, token)
    }

    /// A branch target. Creates an undefined label on first sight.
    fn label_ref(&mut self) -> CompileResult<VarId> {
        let token = self.expect(TokenKind::Id)?;
        if let Some(&id) = self.labels.get(&token.text) {
            return Ok(id);
        }
        let id = self.builder.label(token.text.clone());
        self.labels.insert(token.text.clone(), id);
        Ok(id)
    }

    /// A label definition site, either `_func name` or `name:`. The builder
    /// marks the label defined once an instruction carries it.
    fn define_label(&mut self, token: &Token) -> CompileResult<VarId> {
        let id = match self.labels.get(&token.text).copied() {
            Some(id) if self.builder.var(id).is_defined_label() => {
                return Err(ParseError::DuplicateLabel {
                    name: token.text.clone(),
                }
                .into());
            }
            Some(id) => id,
            None => {
                let id = self.builder.label(token.text.clone());
                self.labels.insert(token.text.clone(), id);
                id
            }
        };
        Ok(id)
    }

    fn check_labels(&self) -> CompileResult<()> {
        // Report in declaration order.
        let mut undefined: Vec<VarId> = self
            .labels
            .values()
            .copied()
            .filter(|&id| !self.builder.var(id).is_defined_label())
            .collect();
        undefined.sort();
        match undefined.first() {
            Some(&id) => Err(ParseError::LabelNeverDefined {
                name: self.builder.var(id).name().to_string(),
            }
            .into()),
            None => Ok(()),
        }
    }

    fn check_functions(&self) -> CompileResult<()> {
        match self.functions {
            0 => Err(ParseError::NoEntryFunction.into()),
            1 => Ok(()),
            count => Err(ParseError::TooManyFunctions { count }.into()),
        }
    }
}

fn lookup(table: &HashMap<String, VarId>, token: &Token) -> CompileResult<VarId> {
    table.get(&token.text).copied().ok_or_else(|| {
        ParseError::UndeclaredVariable {
            name: token.text.clone(),
            line: token.line,
            column: token.column,
        }
        .into()
    })
}

fn unexpected(expected: String, token: &Token) -> ParseError {
    ParseError::UnexpectedToken {
        expected,
        found: token.kind,
        text: token.text.clone(),
        line: token.line,
        column: token.column,
    }
}
