//! Assembly diagnostics
//!
//! Every error that can point at source carries a [`SourceLoc`]; the
//! message renders as `file:line: description` so editors and humans can
//! jump straight to the offending statement.

use std::fmt;

use thiserror::Error;

/// Source position of a statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLoc {
    pub file: String,
    pub line: u32,
}

impl SourceLoc {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Errors raised while assembling
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AsmError {
    #[error("{loc}: undefined symbol '{name}'")]
    UndefinedSymbol { loc: SourceLoc, name: String },

    #[error("{loc}: duplicate label '{name}'")]
    DuplicateLabel { loc: SourceLoc, name: String },

    #[error("{loc}: {mnemonic} does not support {mode} addressing")]
    BadAddressingMode {
        loc: SourceLoc,
        mnemonic: String,
        mode: &'static str,
    },

    #[error("{loc}: branch out of range (offset {offset:+})")]
    BranchOutOfRange { loc: SourceLoc, offset: i32 },

    #[error("{loc}: division by zero")]
    DivisionByZero { loc: SourceLoc },

    #[error("{loc}: include file not found: '{name}'")]
    IncludeNotFound { loc: SourceLoc, name: String },

    #[error("{loc}: {message}")]
    ConditionalError { loc: SourceLoc, message: String },

    #[error("{loc}: unknown instruction '{name}'")]
    UnknownInstruction { loc: SourceLoc, name: String },

    #[error("{loc}: {message}")]
    Syntax { loc: SourceLoc, message: String },

    #[error("{loc}: .error: {message}")]
    UserError { loc: SourceLoc, message: String },

    #[error("XEX output is {size} bytes, exceeding the {limit}-byte limit")]
    XexTooLarge { size: usize, limit: usize },
}

/// Expression evaluation failure, converted to [`AsmError`] where the
/// statement location is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExprError {
    Undefined(String),
    DivisionByZero,
    Syntax(String),
}

impl ExprError {
    pub(crate) fn at(self, loc: &SourceLoc) -> AsmError {
        match self {
            ExprError::Undefined(name) => AsmError::UndefinedSymbol {
                loc: loc.clone(),
                name,
            },
            ExprError::DivisionByZero => AsmError::DivisionByZero { loc: loc.clone() },
            ExprError::Syntax(message) => AsmError::Syntax {
                loc: loc.clone(),
                message,
            },
        }
    }
}
