//! Redcode loader.
//!
//! Turns warrior source text into a [`Warrior`] with resolved fields.
//!
//! ```text
//! ; redcode
//! ; name Dwarf
//! ; assert CORESIZE % 4 == 0
//! step   EQU 4
//! bomb   DAT #0
//! start: ADD #step, bomb   ; labels may end with a colon
//!        MOV bomb, @bomb
//!        JMP start
//!        ORG start
//!        END
//! ```
//!
//! Labels on ordinary lines resolve to the offset from the referencing
//! instruction to the labelled one; `EQU` labels are plain constants.

use std::collections::HashMap;
use std::str::FromStr;

use thiserror::Error;

use crate::asm::assert::{self, AssertError};
use crate::mars::core::fold;
use crate::mars::instruction::{Instruction, Mode, OpCode};
use crate::mars::{ConfigError, MarsConfig, Warrior};

/// Assemble warrior source against the limits of a match.
pub fn assemble(source: &str, config: &MarsConfig) -> Result<Warrior, AssemblerError> {
    config.validate()?;

    let directives = Directives::scan(source);
    if !directives.redcode {
        return Err(AssemblerError::MissingRedcode);
    }
    let expr = directives.assert.ok_or(AssemblerError::MissingAssert)?;
    match assert::evaluate(&expr, config) {
        Ok(true) => {}
        Ok(false) | Err(AssertError::Malformed) => return Err(AssemblerError::AssertFailed { expr }),
        Err(AssertError::InvalidToken) => return Err(AssemblerError::InvalidAssert { expr }),
    }
    let name = directives.name.ok_or(AssemblerError::MissingName)?;

    let mut asm = Assembler::new();
    let (instructions, origin) = asm.assemble(source)?;
    Ok(Warrior::new(name, fold(origin, config.core_size), instructions))
}

/// Metadata carried in `; <word> <param>` comment lines.
#[derive(Debug, Default)]
struct Directives {
    redcode: bool,
    name: Option<String>,
    assert: Option<String>,
}

impl Directives {
    fn scan(source: &str) -> Self {
        let mut directives = Self::default();

        for line in source.lines() {
            let Some(body) = line.trim_start().strip_prefix(';') else {
                continue;
            };
            let body = body.trim_start();
            let word_len = body
                .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                .unwrap_or(body.len());
            if word_len == 0 {
                continue;
            }
            let (word, rest) = body.split_at(word_len);
            let param = rest
                .starts_with(char::is_whitespace)
                .then(|| rest.trim())
                .filter(|p| !p.is_empty());

            match word.to_lowercase().as_str() {
                "redcode" => directives.redcode = true,
                "name" => directives.name = param.map(str::to_string),
                "assert" => directives.assert = param.map(str::to_string),
                _ => {}
            }
        }

        directives
    }
}

/// A field as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
    Number(i64),
    Label(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SourceOperand {
    mode: Mode,
    field: Option<Field>,
}

impl SourceOperand {
    const MISSING: Self = Self { mode: Mode::Direct, field: None };
}

/// An instruction waiting for label resolution.
#[derive(Debug)]
struct PendingLine {
    line: usize,
    op: OpCode,
    a: SourceOperand,
    b: SourceOperand,
}

#[derive(Debug, Clone, Copy)]
enum Symbol {
    /// `EQU` constant.
    Constant(i64),
    /// Index of the labelled instruction.
    Offset(usize),
}

/// Whether the rest of the source should be read.
enum Flow {
    Continue,
    End,
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> value).
    symbols: HashMap<String, Symbol>,
    /// Instructions in emission order.
    pending: Vec<PendingLine>,
    /// Operand of the last `ORG`, with its source line.
    origin: Option<(usize, Option<Field>)>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            pending: Vec::new(),
            origin: None,
        }
    }

    fn assemble(&mut self, source: &str) -> Result<(Vec<Instruction>, i64), AssemblerError> {
        // Pass 1: collect labels and instruction lines
        for (line_num, line) in source.lines().enumerate() {
            if let Flow::End = self.process_line(line, line_num + 1)? {
                break;
            }
        }

        // Pass 2: resolve fields
        let instructions = self
            .pending
            .iter()
            .enumerate()
            .map(|(index, line)| {
                Ok(Instruction::new(
                    line.op,
                    line.a.mode,
                    self.resolve(line.a.field.as_ref(), index, line.line)?,
                    line.b.mode,
                    self.resolve(line.b.field.as_ref(), index, line.line)?,
                ))
            })
            .collect::<Result<Vec<_>, AssemblerError>>()?;

        let origin = match &self.origin {
            Some((line, field)) => self.resolve(field.as_ref(), 0, *line)?,
            None => 0,
        };

        Ok((instructions, origin))
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<Flow, AssemblerError> {
        // Remove comments
        let line = line.split(';').next().unwrap_or("").trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }

        let (first, rest) = split_word(line);
        let (label, mnemonic, operands) = if is_mnemonic(first) {
            (None, first, rest)
        } else {
            let (second, tail) = split_word(rest);
            if !second.is_empty() && second.chars().all(|c| c.is_ascii_alphabetic()) {
                (Some(first), second, tail)
            } else {
                (None, first, rest)
            }
        };
        let mnemonic = mnemonic.to_uppercase();

        if mnemonic == "END" {
            return Ok(Flow::End);
        }

        let (a, b) = parse_operands(operands, line_num)?;

        match mnemonic.as_str() {
            "EQU" => {
                let label = label.ok_or_else(|| AssemblerError::SyntaxError {
                    line: line_num,
                    message: "EQU requires a label".into(),
                })?;
                let value = match a.field {
                    Some(Field::Number(value)) if b.field.is_none() => value,
                    _ => {
                        return Err(AssemblerError::InvalidConstant {
                            line: line_num,
                            value: operands.trim().to_string(),
                        })
                    }
                };
                self.define(label, Symbol::Constant(value), line_num)?;
            }

            "ORG" => {
                if let Some(label) = label {
                    self.define(label, Symbol::Offset(self.pending.len()), line_num)?;
                }
                self.origin = Some((line_num, a.field));
            }

            _ => {
                let op = OpCode::from_str(&mnemonic).map_err(|_| AssemblerError::UnknownOpcode {
                    line: line_num,
                    mnemonic: mnemonic.clone(),
                })?;
                if let Some(label) = label {
                    self.define(label, Symbol::Offset(self.pending.len()), line_num)?;
                }
                self.pending.push(PendingLine { line: line_num, op, a, b });
            }
        }

        Ok(Flow::Continue)
    }

    fn define(&mut self, label: &str, symbol: Symbol, line_num: usize) -> Result<(), AssemblerError> {
        let label = label.strip_suffix(':').unwrap_or(label);
        if !is_identifier(label) {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("invalid label: {label}"),
            });
        }
        if self.symbols.insert(label.to_string(), symbol).is_some() {
            return Err(AssemblerError::DuplicateLabel {
                line: line_num,
                label: label.to_string(),
            });
        }
        Ok(())
    }

    fn resolve(&self, field: Option<&Field>, index: usize, line_num: usize) -> Result<i64, AssemblerError> {
        match field {
            None => Ok(0),
            Some(Field::Number(value)) => Ok(*value),
            Some(Field::Label(label)) => match self.symbols.get(label) {
                Some(Symbol::Constant(value)) => Ok(*value),
                Some(Symbol::Offset(target)) => Ok(*target as i64 - index as i64),
                None => Err(AssemblerError::UndefinedLabel {
                    line: line_num,
                    label: label.clone(),
                }),
            },
        }
    }
}

/// Split off the first whitespace-delimited word.
fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(idx) => (&text[..idx], &text[idx..]),
        None => (text, ""),
    }
}

fn is_mnemonic(word: &str) -> bool {
    let upper = word.to_uppercase();
    matches!(upper.as_str(), "ORG" | "EQU" | "END") || OpCode::from_str(&upper).is_ok()
}

fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_operands(text: &str, line_num: usize) -> Result<(SourceOperand, SourceOperand), AssemblerError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok((SourceOperand::MISSING, SourceOperand::MISSING));
    }

    let parts: Vec<&str> = text.split(',').collect();
    match parts.as_slice() {
        [a] => Ok((parse_operand(a, line_num)?, SourceOperand::MISSING)),
        [a, b] => Ok((parse_operand(a, line_num)?, parse_operand(b, line_num)?)),
        _ => Err(AssemblerError::SyntaxError {
            line: line_num,
            message: format!("too many operands: {text}"),
        }),
    }
}

fn parse_operand(text: &str, line_num: usize) -> Result<SourceOperand, AssemblerError> {
    let text = text.trim();
    let syntax = |message: String| AssemblerError::SyntaxError { line: line_num, message };

    let prefix = text
        .chars()
        .next()
        .filter(|c| !(c.is_ascii_alphanumeric() || matches!(*c, '_' | '-' | '+')));
    let mode = Mode::from_prefix(prefix).ok_or_else(|| syntax(format!("unsupported addressing mode: {text}")))?;
    let body = match prefix {
        Some(c) => text[c.len_utf8()..].trim_start(),
        None => text,
    };

    if body.is_empty() {
        return Err(syntax("missing operand field".into()));
    }

    let field = if let Ok(value) = body.parse::<i64>() {
        Field::Number(value)
    } else if is_identifier(body) {
        Field::Label(body.to_string())
    } else {
        return Err(syntax(format!("invalid field: {body}")));
    };

    Ok(SourceOperand { mode, field: Some(field) })
}

/// Errors that can occur while loading a warrior.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("Missing filemarker: ;redcode")]
    MissingRedcode,

    #[error("Warrior must specify an assert")]
    MissingAssert,

    #[error("Invalid assert expression: {expr}")]
    InvalidAssert { expr: String },

    #[error("Warrior assert didn't pass: {expr}")]
    AssertFailed { expr: String },

    #[error("Warrior must specify a name")]
    MissingName,

    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("Invalid op-code detected on line {line}: {mnemonic}")]
    UnknownOpcode { line: usize, mnemonic: String },

    #[error("Invalid label reference on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("invalid EQU constant on line {line}: {value}")]
    InvalidConstant { line: usize, value: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "; redcode\n; name Test\n; assert 1\n";

    fn load(body: &str) -> Result<Warrior, AssemblerError> {
        assemble(&format!("{HEADER}{body}"), &MarsConfig::default())
    }

    fn ins(op: OpCode, a_mode: Mode, a: i64, b_mode: Mode, b: i64) -> Instruction {
        Instruction::new(op, a_mode, a, b_mode, b)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = MarsConfig { core_size: 0, ..MarsConfig::default() };
        let err = assemble(&format!("{HEADER}JMP 0\nORG -1\n"), &config).unwrap_err();
        assert!(matches!(err, AssemblerError::Config(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_assemble_dwarf() {
        let source = r#"
; redcode
; name Dwarf
; author A. K. Dewdney
; assert CORESIZE % 4 == 0
step   EQU 4
bomb   DAT #0
start: ADD #step, bomb
       MOV bomb, @bomb
       JMP start
       ORG start
       END
       DAT 1, 1
        "#;

        let warrior = assemble(source, &MarsConfig::default()).unwrap();
        assert_eq!(warrior.name, "Dwarf");
        assert_eq!(
            warrior.instructions,
            vec![
                ins(OpCode::Dat, Mode::Immediate, 0, Mode::Direct, 0),
                ins(OpCode::Add, Mode::Immediate, 4, Mode::Direct, -1),
                ins(OpCode::Mov, Mode::Direct, -2, Mode::Indirect, -2),
                ins(OpCode::Jmp, Mode::Direct, -2, Mode::Direct, 0),
            ]
        );
        assert_eq!(warrior.tasks.peek(), Some(1));
    }

    #[test]
    fn test_forward_reference() {
        let warrior = load("JMP target\nDAT 0\ntarget MOV 0, 1\n").unwrap();
        assert_eq!(warrior.instructions[0].a_field, 2);
        assert_eq!(warrior.instructions[2].op, OpCode::Mov);
        assert_eq!(warrior.instructions[2].b_field, 1);
    }

    #[test]
    fn test_negative_literals_and_modes() {
        let warrior = load("MOV #-3, @-1 ; trailing comment\n").unwrap();
        assert_eq!(warrior.instructions, vec![ins(OpCode::Mov, Mode::Immediate, -3, Mode::Indirect, -1)]);
    }

    #[test]
    fn test_origin_defaults_to_zero() {
        let warrior = load("MOV 0, 1\n").unwrap();
        assert_eq!(warrior.tasks.peek(), Some(0));
    }

    #[test]
    fn test_negative_origin_is_folded() {
        let warrior = load("MOV 0, 1\nORG -1\n").unwrap();
        assert_eq!(warrior.tasks.peek(), Some(8191));
    }

    #[test]
    fn test_missing_directives() {
        let config = MarsConfig::default();
        assert_eq!(
            assemble("; name X\n; assert 1\nMOV 0, 1\n", &config).unwrap_err(),
            AssemblerError::MissingRedcode
        );
        assert_eq!(
            assemble("; redcode\n; name X\nMOV 0, 1\n", &config).unwrap_err(),
            AssemblerError::MissingAssert
        );
        assert_eq!(
            assemble("; redcode\n; assert 1\nMOV 0, 1\n", &config).unwrap_err(),
            AssemblerError::MissingName
        );
    }

    #[test]
    fn test_assert_outcomes() {
        let config = MarsConfig::default();
        let failing = assemble("; redcode\n; name X\n; assert CORESIZE == 8000\n", &config);
        assert!(matches!(failing, Err(AssemblerError::AssertFailed { .. })));

        let invalid = assemble("; redcode\n; name X\n; assert CORESIZE > 1\n", &config);
        assert!(matches!(invalid, Err(AssemblerError::InvalidAssert { .. })));
    }

    #[test]
    fn test_unknown_opcode() {
        let err = load("MOV 0, 1\nXYZ 1, 2\n").unwrap_err();
        assert_eq!(err, AssemblerError::UnknownOpcode { line: 5, mnemonic: "XYZ".into() });

        let err = load("here SPL 0\n").unwrap_err();
        assert!(matches!(err, AssemblerError::UnknownOpcode { .. }));
    }

    #[test]
    fn test_undefined_and_duplicate_labels() {
        let err = load("JMP nowhere\n").unwrap_err();
        assert_eq!(err, AssemblerError::UndefinedLabel { line: 4, label: "nowhere".into() });

        let err = load("a DAT 0\na DAT 1\n").unwrap_err();
        assert!(matches!(err, AssemblerError::DuplicateLabel { .. }));
    }

    #[test]
    fn test_equ_requires_literal() {
        let err = load("k EQU other\n").unwrap_err();
        assert!(matches!(err, AssemblerError::InvalidConstant { .. }));

        let err = load("EQU 5\n").unwrap_err();
        assert!(matches!(err, AssemblerError::SyntaxError { .. }));
    }

    #[test]
    fn test_bad_operands() {
        assert!(matches!(load("MOV 1, 2, 3\n"), Err(AssemblerError::SyntaxError { .. })));
        assert!(matches!(load("MOV $1, 2\n"), Err(AssemblerError::SyntaxError { .. })));
        assert!(matches!(load("MOV #, 2\n"), Err(AssemblerError::SyntaxError { .. })));
    }

    #[test]
    fn test_lowercase_mnemonics() {
        let warrior = load("loop jmp loop\n").unwrap();
        assert_eq!(warrior.instructions, vec![ins(OpCode::Jmp, Mode::Direct, 0, Mode::Direct, 0)]);
    }

    #[test]
    fn test_directive_overrides_and_case() {
        let source = "; REDCODE-94\n; name  First \n; Name Second\n; assert 0\n; assert 1\nDAT 0\n";
        let warrior = assemble(source, &MarsConfig::default()).unwrap();
        assert_eq!(warrior.name, "Second");
    }
}
