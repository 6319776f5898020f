//! λ-term text syntax
//!
//! ```text
//! term   := lambda | app
//! lambda := ('\' | 'λ') ident+ '.' term
//! app    := atom+ lambda?
//! atom   := ident | number | '(' term ')'
//! ```
//!
//! Numbers stand for Church numerals. `#` starts a comment that runs to the
//! end of the line.

use super::church;
use super::term::{TermId, TermStore};
use crate::error::{Result, TernaryError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Lambda,
    Dot,
    Open,
    Close,
    Ident(String),
    Number(u64),
}

fn tokenize(src: &str) -> Result<Vec<(Token, usize)>> {
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut chars = src.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => {
                while chars.peek().is_some_and(|&c| c != '\n') {
                    chars.next();
                }
            }
            '\\' | 'λ' => {
                chars.next();
                tokens.push((Token::Lambda, line));
            }
            '.' => {
                chars.next();
                tokens.push((Token::Dot, line));
            }
            '(' => {
                chars.next();
                tokens.push((Token::Open, line));
            }
            ')' => {
                chars.next();
                tokens.push((Token::Close, line));
            }
            c if c.is_ascii_digit() => {
                let mut text = String::new();
                while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                    text.push(d);
                    chars.next();
                }
                let n = text.parse::<u64>().map_err(|_| TernaryError::Parse {
                    line,
                    message: format!("numeral too large: {}", text),
                })?;
                tokens.push((Token::Number(n), line));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut text = String::new();
                while let Some(&d) = chars
                    .peek()
                    .filter(|d| (d.is_alphanumeric() && **d != 'λ') || **d == '_' || **d == '\'')
                {
                    text.push(d);
                    chars.next();
                }
                tokens.push((Token::Ident(text), line));
            }
            other => {
                return Err(TernaryError::Parse {
                    line,
                    message: format!("unexpected character '{}'", other),
                })
            }
        }
    }
    Ok(tokens)
}

/// Numerals above this are rejected rather than built
pub const MAX_NUMERAL: u64 = 1 << 16;

/// Deepest nesting of parentheses and λ bodies the parser descends into
pub const MAX_NESTING: usize = 512;

struct Parser<'a> {
    store: &'a mut TermStore,
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |(_, l)| *l)
    }

    fn error(&self, message: impl Into<String>) -> TernaryError {
        TernaryError::Parse {
            line: self.line(),
            message: message.into(),
        }
    }

    fn term(&mut self) -> Result<TermId> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("nesting deeper than {}", MAX_NESTING)));
        }
        self.depth += 1;
        let t = if self.peek() == Some(&Token::Lambda) {
            self.lambda()
        } else {
            self.application()
        };
        self.depth -= 1;
        t
    }

    fn lambda(&mut self) -> Result<TermId> {
        self.pos += 1;
        let mut params = Vec::new();
        while let Some(Token::Ident(name)) = self.peek() {
            params.push(name.clone());
            self.pos += 1;
        }
        if params.is_empty() {
            return Err(self.error("expected parameter after λ"));
        }
        if self.peek() != Some(&Token::Dot) {
            return Err(self.error("expected '.' after parameters"));
        }
        self.pos += 1;

        let mut body = self.term()?;
        for name in params.iter().rev() {
            let id = self.store.intern(name);
            body = self.store.lam(id, body);
        }
        Ok(body)
    }

    fn application(&mut self) -> Result<TermId> {
        let mut acc = self.atom()?;
        loop {
            let next = match self.peek() {
                Some(Token::Ident(_)) | Some(Token::Number(_)) | Some(Token::Open) => self.atom(),
                // A trailing λ extends as far right as possible
                Some(Token::Lambda) => self.lambda(),
                _ => return Ok(acc),
            };
            match next {
                Ok(arg) => acc = self.store.app(acc, arg),
                Err(e) => {
                    self.store.decref(acc);
                    return Err(e);
                }
            }
        }
    }

    fn atom(&mut self) -> Result<TermId> {
        match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.pos += 1;
                let id = self.store.intern(&name);
                Ok(self.store.var(id))
            }
            Some(Token::Number(n)) => {
                if n > MAX_NUMERAL {
                    return Err(self.error(format!("numeral {} exceeds {}", n, MAX_NUMERAL)));
                }
                self.pos += 1;
                Ok(church::numeral(self.store, n))
            }
            Some(Token::Open) => {
                self.pos += 1;
                let inner = self.term()?;
                if self.peek() != Some(&Token::Close) {
                    self.store.decref(inner);
                    return Err(self.error("expected ')'"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(other) => Err(self.error(format!("unexpected token {:?}", other))),
            None => Err(self.error("unexpected end of input")),
        }
    }
}

/// Parse `src` into a new owned term
pub fn parse_term(store: &mut TermStore, src: &str) -> Result<TermId> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        store,
        tokens,
        pos: 0,
        depth: 0,
    };

    let t = parser.term()?;
    if parser.pos < parser.tokens.len() {
        parser.store.decref(t);
        return Err(parser.error("trailing input"));
    }
    Ok(t)
}
