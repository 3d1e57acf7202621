//! Evaluator for `; assert` expressions.
//!
//! Grammar (lowest precedence first):
//!
//! ```text
//! equality := sum ("==" sum)*
//! sum      := product (("+" | "-") product)*
//! product  := unary (("*" | "%") unary)*
//! unary    := ("-" | "+")* atom
//! atom     := INTEGER | CORESIZE | MAXCYCLES | MAXLENGTH | MAXTASKS
//! ```
//!
//! A comparison yields 1 or 0 and may be compared again. The assertion holds
//! when the final value is non-zero.

use crate::mars::MarsConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Number(i64),
    Plus,
    Minus,
    Star,
    Percent,
    EqEq,
}

/// Why an expression could not be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertError {
    /// The expression contains something outside the allowed vocabulary.
    InvalidToken,
    /// Well-formed tokens that do not form an expression, or arithmetic
    /// that cannot be carried out.
    Malformed,
}

/// Evaluate `expr` against the match limits.
pub fn evaluate(expr: &str, config: &MarsConfig) -> Result<bool, AssertError> {
    let tokens = tokenize(expr, config)?;
    let mut parser = Parser { tokens: &tokens, pos: 0 };
    let value = parser.equality()?;
    if parser.pos != tokens.len() {
        return Err(AssertError::Malformed);
    }
    Ok(value != 0)
}

fn tokenize(expr: &str, config: &MarsConfig) -> Result<Vec<Token>, AssertError> {
    let mut tokens = Vec::new();
    let mut chars = expr.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '%' => {
                chars.next();
                tokens.push(Token::Percent);
            }
            '=' => {
                chars.next();
                match chars.next() {
                    Some((_, '=')) => tokens.push(Token::EqEq),
                    _ => return Err(AssertError::InvalidToken),
                }
            }
            c if c.is_ascii_alphanumeric() || c == '_' => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if !(c.is_ascii_alphanumeric() || c == '_') {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                tokens.push(word(&expr[start..end], config)?);
            }
            _ => return Err(AssertError::InvalidToken),
        }
    }

    Ok(tokens)
}

fn word(text: &str, config: &MarsConfig) -> Result<Token, AssertError> {
    let value = match text {
        "CORESIZE" => config.core_size as i64,
        "MAXCYCLES" => config.max_cycles as i64,
        "MAXLENGTH" => config.max_length as i64,
        "MAXTASKS" => config.max_tasks as i64,
        digits if digits.bytes().all(|b| b.is_ascii_digit()) => {
            digits.parse().map_err(|_| AssertError::Malformed)?
        }
        _ => return Err(AssertError::InvalidToken),
    };
    Ok(Token::Number(value))
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    fn equality(&mut self) -> Result<i64, AssertError> {
        let mut value = self.sum()?;
        while self.peek() == Some(Token::EqEq) {
            self.pos += 1;
            let rhs = self.sum()?;
            value = i64::from(value == rhs);
        }
        Ok(value)
    }

    fn sum(&mut self) -> Result<i64, AssertError> {
        let mut value = self.product()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => i64::checked_add,
                Some(Token::Minus) => i64::checked_sub,
                _ => return Ok(value),
            };
            self.pos += 1;
            let rhs = self.product()?;
            value = op(value, rhs).ok_or(AssertError::Malformed)?;
        }
    }

    fn product(&mut self) -> Result<i64, AssertError> {
        let mut value = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => i64::checked_mul,
                Some(Token::Percent) => i64::checked_rem,
                _ => return Ok(value),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            value = op(value, rhs).ok_or(AssertError::Malformed)?;
        }
    }

    fn unary(&mut self) -> Result<i64, AssertError> {
        match self.next() {
            Some(Token::Minus) => self.unary()?.checked_neg().ok_or(AssertError::Malformed),
            Some(Token::Plus) => self.unary(),
            Some(Token::Number(n)) => Ok(n),
            _ => Err(AssertError::Malformed),
        }
    }
}
