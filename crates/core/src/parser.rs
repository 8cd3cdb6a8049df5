//! Recursive-descent parser for mapping formulas.
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := '-' term | primary
//! primary := CODE | '(' expr ')'
//! ```
//!
//! Binary operators are left-associative; unary minus binds tighter than
//! either of them.

use crate::ast::Expr;
use crate::error::{ParseError, ParseErrorKind};
use crate::lexer::{self, Spanned, Token};

/// Deepest combined nesting of parentheses and unary minus accepted.
pub const MAX_NESTING: usize = 256;

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    formula: &'a str,
    /// Open parentheses not yet closed.
    depth: usize,
    nesting: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned], formula: &'a str) -> Self {
        Parser {
            tokens,
            pos: 0,
            formula,
            depth: 0,
            nesting: 0,
        }
    }

    fn cur(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.cur().token
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn err(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(self.formula, self.cur().col, kind)
    }

    fn unexpected(&self) -> ParseError {
        match self.peek() {
            Token::RParen if self.depth == 0 => self.err(ParseErrorKind::UnbalancedParens),
            Token::Eof if self.depth > 0 => self.err(ParseErrorKind::UnbalancedParens),
            other => self.err(ParseErrorKind::UnexpectedToken {
                found: other.describe(),
            }),
        }
    }

    fn parse_formula(&mut self) -> Result<Expr, ParseError> {
        if self.peek() == &Token::Eof {
            return Err(self.err(ParseErrorKind::Empty));
        }
        let e = self.parse_expr()?;
        if self.peek() != &Token::Eof {
            return Err(self.unexpected());
        }
        Ok(e)
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            match self.peek() {
                Token::Plus => {
                    self.advance();
                    let right = self.parse_term()?;
                    left = Expr::add(left, right);
                }
                Token::Minus => {
                    self.advance();
                    let right = self.parse_term()?;
                    left = Expr::sub(left, right);
                }
                _ => return Ok(left),
            }
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            return Err(self.err(ParseErrorKind::NestingTooDeep { limit: MAX_NESTING }));
        }
        Ok(())
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        if self.peek() == &Token::Minus {
            self.advance();
            self.enter()?;
            let operand = self.parse_term()?;
            self.nesting -= 1;
            return Ok(Expr::neg(operand));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().clone() {
            Token::Code(n) => {
                self.advance();
                Ok(Expr::code(n))
            }
            Token::LParen => {
                self.advance();
                self.enter()?;
                self.depth += 1;
                let e = self.parse_expr()?;
                if self.peek() != &Token::RParen {
                    return Err(self.unexpected());
                }
                self.depth -= 1;
                self.nesting -= 1;
                self.advance();
                Ok(e)
            }
            _ => Err(self.unexpected()),
        }
    }
}

/// Parse a formula string into an expression tree.
///
/// Pure: the same string always yields an equal tree or an equal error.
pub fn parse(formula: &str) -> Result<Expr, ParseError> {
    let tokens = lexer::lex(formula)?;
    let mut p = Parser::new(&tokens, formula);
    p.parse_formula()
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
