//! MAVN lexer.
//!
//! Splits source text into [`Token`]s. Whitespace, `// line` comments and
//! `/* block */` comments are skipped. Words are classified as keywords,
//! memory ids (`m` + digits), register ids (`r` + digits) or plain ids.

use std::fmt;
use thiserror::Error;

/// Lexical errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Unexpected character '{ch}' at {line}:{column}")]
    UnexpectedChar { ch: char, line: usize, column: usize },

    #[error("Unknown directive '{word}' at {line}:{column}")]
    UnknownDirective {
        word: String,
        line: usize,
        column: usize,
    },

    #[error("Unterminated block comment starting at {line}:{column}")]
    UnterminatedComment { line: usize, column: usize },
}

/// Token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Directives
    Mem,
    Reg,
    Func,
    // Mnemonics
    Add,
    Addi,
    Sub,
    And,
    Or,
    Not,
    La,
    Li,
    Lw,
    Sw,
    B,
    Bltz,
    Bne,
    Nop,
    // Names and literals
    Id,
    MemId,
    RegId,
    Num,
    // Punctuation
    Comma,
    LParen,
    RParen,
    Colon,
    Semicolon,
    Eof,
}

impl TokenKind {
    fn keyword(word: &str) -> Option<Self> {
        use TokenKind::*;
        let kind = match word {
            "_mem" => Mem,
            "_reg" => Reg,
            "_func" => Func,
            "add" => Add,
            "addi" => Addi,
            "sub" => Sub,
            "and" => And,
            "or" => Or,
            "not" => Not,
            "la" => La,
            "li" => Li,
            "lw" => Lw,
            "sw" => Sw,
            "b" => B,
            "bltz" => Bltz,
            "bne" => Bne,
            "nop" => Nop,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;
        let s = match self {
            Mem => "_mem",
            Reg => "_reg",
            Func => "_func",
            Add => "add",
            Addi => "addi",
            Sub => "sub",
            And => "and",
            Or => "or",
            Not => "not",
            La => "la",
            Li => "li",
            Lw => "lw",
            Sw => "sw",
            B => "b",
            Bltz => "bltz",
            Bne => "bne",
            Nop => "nop",
            Id => "identifier",
            MemId => "memory variable",
            RegId => "register variable",
            Num => "number",
            Comma => "','",
            LParen => "'('",
            RParen => "')'",
            Colon => "':'",
            Semicolon => "';'",
            Eof => "end of file",
        };
        f.write_str(s)
    }
}

/// One token with its source position (1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    text: &'a str,
    line: usize,
    column: usize,
}

/// Tokenize `text`. The last token is always [`TokenKind::Eof`].
pub fn tokenize(text: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer {
        chars: text.char_indices().peekable(),
        text,
        line: 1,
        column: 1,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }
    log::trace!("Lexed {} tokens", tokens.len());
    Ok(tokens)
}

impl<'a> Lexer<'a> {
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_second(&self) -> Option<char> {
        let mut it = self.chars.clone();
        it.next();
        it.next().map(|(_, c)| c)
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, ch)) = next {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.text.len(), |&(i, _)| i)
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match (self.peek(), self.peek_second()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    let (line, column) = (self.line, self.column);
                    self.bump();
                    self.bump();
                    loop {
                        match (self.peek(), self.peek_second()) {
                            (Some('*'), Some('/')) => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            (Some(_), _) => {
                                self.bump();
                            }
                            (None, _) => return Err(LexError::UnterminatedComment { line, column }),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia()?;
        let (line, column) = (self.line, self.column);
        let start = self.offset();
        let token = |kind, text: &str| Token {
            kind,
            text: text.to_string(),
            line,
            column,
        };

        let Some(ch) = self.peek() else {
            return Ok(token(TokenKind::Eof, ""));
        };

        let punct = match ch {
            ',' => Some(TokenKind::Comma),
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            ':' => Some(TokenKind::Colon),
            ';' => Some(TokenKind::Semicolon),
            _ => None,
        };
        if let Some(kind) = punct {
            self.bump();
            return Ok(token(kind, &self.text[start..start + 1]));
        }

        let negative = ch == '-' && self.peek_second().is_some_and(|c| c.is_ascii_digit());
        if ch.is_ascii_digit() || negative {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
            let end = self.offset();
            return Ok(token(TokenKind::Num, &self.text[start..end]));
        }

        if ch.is_ascii_alphabetic() || ch == '_' {
            while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
                self.bump();
            }
            let end = self.offset();
            let word = &self.text[start..end];
            let kind = classify(word).ok_or_else(|| LexError::UnknownDirective {
                word: word.to_string(),
                line,
                column,
            })?;
            return Ok(token(kind, word));
        }

        Err(LexError::UnexpectedChar { ch, line, column })
    }
}

fn classify(word: &str) -> Option<TokenKind> {
    if let Some(kind) = TokenKind::keyword(word) {
        return Some(kind);
    }
    if word.starts_with('_') {
        return None;
    }
    let numbered = |prefix: char| {
        word.strip_prefix(prefix)
            .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
    };
    if numbered('m') {
        Some(TokenKind::MemId)
    } else if numbered('r') {
        Some(TokenKind::RegId)
    } else {
        Some(TokenKind::Id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_declarations() {
        use TokenKind::*;
        assert_eq!(
            kinds("_mem m1 6; _reg r12; _func main;"),
            vec![Mem, MemId, Num, Semicolon, Reg, RegId, Semicolon, Func, Id, Semicolon, Eof]
        );
    }

    #[test]
    fn test_instruction_tokens() {
        use TokenKind::*;
        assert_eq!(
            kinds("lab: lw r1, -4(r2);"),
            vec![Id, Colon, Lw, RegId, Comma, Num, LParen, RegId, RParen, Semicolon, Eof]
        );
    }

    #[test]
    fn test_word_classification() {
        assert_eq!(classify("m7"), Some(TokenKind::MemId));
        assert_eq!(classify("r0"), Some(TokenKind::RegId));
        assert_eq!(classify("m"), Some(TokenKind::Id));
        assert_eq!(classify("main"), Some(TokenKind::Id));
        assert_eq!(classify("r1a"), Some(TokenKind::Id));
        assert_eq!(classify("loop_2"), Some(TokenKind::Id));
        assert_eq!(classify("bltz"), Some(TokenKind::Bltz));
        assert_eq!(classify("_data"), None);
    }

    #[test]
    fn test_comments_and_positions() {
        let tokens = tokenize("// header\n/* block\n comment */ nop;\n  b end;").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Nop);
        assert_eq!((tokens[0].line, tokens[0].column), (3, 13));
        assert_eq!(tokens[2].kind, TokenKind::B);
        assert_eq!((tokens[2].line, tokens[2].column), (4, 3));
        assert_eq!(tokens[3].text, "end");
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            tokenize("nop;\n  #"),
            Err(LexError::UnexpectedChar { ch: '#', line: 2, column: 3 })
        );
        assert_eq!(
            tokenize("/* never closed"),
            Err(LexError::UnterminatedComment { line: 1, column: 1 })
        );
        assert!(matches!(tokenize("_text;"), Err(LexError::UnknownDirective { .. })));
    }

    #[test]
    fn test_empty_input_is_just_eof() {
        assert_eq!(kinds("  \n\t "), vec![TokenKind::Eof]);
    }
}
