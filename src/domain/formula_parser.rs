//! Formula parser.
//!
//! Recursive descent parser for custom scoring formulas:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := '-' unary | primary
//! primary := number | identifier | '(' expr ')'
//! ```
//!
//! Formulas are capped at [`MAX_FORMULA_LEN`] characters and nesting of
//! parentheses and unary minus at [`MAX_DEPTH`], which keeps the parser,
//! the evaluator and the AST drop within a fixed stack budget.
//!
//! [`validate_syntax`] layers the token denylist, the character whitelist and
//! the parenthesis balance check in front of the parser so that rejected
//! formulas get a precise reason.

use crate::domain::error::FormulaError;
use crate::domain::formula::{BinaryOp, Expr};

/// Tokens rejected anywhere in a formula, case-insensitively.
const FORBIDDEN_SUBSTRINGS: &[&str] = &[
    "eval",
    "function",
    "constructor",
    "prototype",
    "__proto__",
    "process",
    "require",
    "import",
    "global",
    "window",
    "document",
    "module",
    "settimeout",
    "setinterval",
    "fetch",
];

/// Longest accepted formula, in characters.
pub const MAX_FORMULA_LEN: usize = 1024;

/// Deepest accepted nesting of parentheses and unary minus.
pub const MAX_DEPTH: usize = 64;

/// Identifiers rejected when they appear as a whole word.
const FORBIDDEN_WORDS: &[&str] = &["this", "new", "self", "super"];

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            depth: 0,
        }
    }

    fn enter(&mut self) -> Result<(), FormulaError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(format!(
                "formula nested deeper than {} levels",
                MAX_DEPTH
            )));
        }
        self.depth += 1;
        Ok(())
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn error(&self, message: String) -> FormulaError {
        FormulaError::Syntax {
            message,
            position: self.pos,
        }
    }

    fn found(&self) -> String {
        self.peek()
            .map(|c| format!("'{}'", c))
            .unwrap_or_else(|| "end of input".to_string())
    }

    fn expect_char(&mut self, expected: char) -> Result<(), FormulaError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            _ => Err(self.error(format!("expected '{}', found {}", expected, self.found()))),
        }
    }

    fn parse_number(&mut self) -> Result<Expr, FormulaError> {
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(FormulaError::Syntax {
                message: "expected number".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str
            .parse::<f64>()
            .map(Expr::Number)
            .map_err(|_| FormulaError::Syntax {
                message: format!("invalid number: {}", num_str),
                position: start,
            })
    }

    fn parse_identifier(&mut self) -> Expr {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        Expr::Variable(self.input[start..self.pos].to_string())
    }

    fn parse_primary(&mut self) -> Result<Expr, FormulaError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch.is_ascii_digit() || ch == '.' => self.parse_number(),
            Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => Ok(self.parse_identifier()),
            Some('(') => {
                self.enter()?;
                self.advance();
                let expr = self.parse_expr()?;
                self.expect_char(')')?;
                self.depth -= 1;
                Ok(expr)
            }
            _ => Err(self.error(format!(
                "expected number, variable or '(', found {}",
                self.found()
            ))),
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, FormulaError> {
        self.skip_whitespace();
        if self.peek() == Some('-') {
            self.enter()?;
            self.advance();
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(match inner {
                Expr::Number(v) => Expr::Number(-v),
                other => Expr::Neg(Box::new(other)),
            });
        }
        self.parse_primary()
    }

    fn parse_term(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.parse_unary()?;
        loop {
            self.skip_whitespace();
            let op = match self.peek() {
                Some('*') => BinaryOp::Mul,
                Some('/') => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_expr(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.parse_term()?;
        loop {
            self.skip_whitespace();
            let op = match self.peek() {
                Some('+') => BinaryOp::Add,
                Some('-') => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse(&mut self) -> Result<Expr, FormulaError> {
        let expr = self.parse_expr()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error(format!(
                "unexpected input after expression: '{}'",
                self.remaining()
            )));
        }
        Ok(expr)
    }
}

/// Parse a formula into an AST. Does not apply the denylist; use
/// [`validate_syntax`] for untrusted input.
pub fn parse(input: &str) -> Result<Expr, FormulaError> {
    if input.trim().is_empty() {
        return Err(FormulaError::Empty);
    }
    check_length(input)?;
    let mut parser = Parser::new(input);
    parser.parse()
}

/// Full syntax check for a user supplied formula; returns the parsed AST.
pub fn validate_syntax(formula: &str) -> Result<Expr, FormulaError> {
    if formula.trim().is_empty() {
        return Err(FormulaError::Empty);
    }
    check_length(formula)?;
    check_forbidden_tokens(formula)?;
    check_characters(formula)?;
    check_parentheses(formula)?;
    parse(formula)
}

fn check_length(formula: &str) -> Result<(), FormulaError> {
    let length = formula.chars().count();
    if length > MAX_FORMULA_LEN {
        return Err(FormulaError::TooLong {
            length,
            max: MAX_FORMULA_LEN,
        });
    }
    Ok(())
}

fn check_forbidden_tokens(formula: &str) -> Result<(), FormulaError> {
    let lowered = formula.to_ascii_lowercase();
    if let Some(token) = FORBIDDEN_SUBSTRINGS.iter().find(|t| lowered.contains(**t)) {
        return Err(FormulaError::ForbiddenToken {
            token: token.to_string(),
        });
    }
    let words = lowered.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'));
    for word in words {
        if FORBIDDEN_WORDS.contains(&word) {
            return Err(FormulaError::ForbiddenToken {
                token: word.to_string(),
            });
        }
    }
    Ok(())
}

fn check_characters(formula: &str) -> Result<(), FormulaError> {
    for (position, ch) in formula.char_indices() {
        let allowed = ch.is_ascii_alphanumeric()
            || matches!(ch, '_' | '+' | '-' | '*' | '/' | '.' | '(' | ')')
            || ch.is_ascii_whitespace();
        if !allowed {
            return Err(FormulaError::InvalidCharacter { ch, position });
        }
    }
    Ok(())
}

fn check_parentheses(formula: &str) -> Result<(), FormulaError> {
    let mut open = Vec::new();
    for (position, ch) in formula.char_indices() {
        match ch {
            '(' => open.push(position),
            ')' => {
                if open.pop().is_none() {
                    return Err(FormulaError::UnbalancedParentheses { position });
                }
            }
            _ => {}
        }
    }
    match open.pop() {
        Some(position) => Err(FormulaError::UnbalancedParentheses { position }),
        None => Ok(()),
    }
}
