// This module turns MAVN source text into the Program the back end consumes. The lexer
// classifies words into directives, mnemonics, memory and register ids, and the parser
// walks the statement grammar while keeping symbol tables for declared variables and
// labels. Labels may be referenced before they are defined; every reference must be
// resolved by the end of the file. All instructions go through ProgramBuilder, so operand
// shapes and dense register positions are checked in one place.

//! MAVN front end.

pub mod lexer;
pub mod parser;

pub use lexer::{tokenize, LexError, Token, TokenKind};
pub use parser::{parse_program, ParseError};
