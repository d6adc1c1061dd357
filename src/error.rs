//! Centralised error hierarchy for the **CybroScript interpreter**.
//!
//! All subsystems (scanner, parser, resolver, runtime, CLI) convert their
//! internal failure modes into one of the variants defined here.  This enables
//! a uniform `Result<T>` alias throughout the crate and ergonomic
//! inter‑operation with `anyhow`, while still preserving rich diagnostic
//! detail.
//!
//! Every diagnostic renders through [`report`] as
//! `[line N] <where>: error: <message>`.
//!
//! The module **does not** print diagnostics itself.

use std::io;
use thiserror::Error;

use log::debug;

use crate::token::{Token, TokenType};

/// Exit status for any lexical, syntax or resolution error.
pub const EXIT_STATIC: i32 = 65;

/// Exit status for a runtime error.
pub const EXIT_RUNTIME: i32 = 70;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CybroError {
    /// Lexical (scanner) error with source line information.
    #[error("{}", report(.line, .location, .message))]
    Lex {
        /// Human‑readable description.
        message: String,

        /// Where on the line the problem sits (`at 'x'`, `at end`).
        location: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.
    #[error("{}", report(.line, .location, .message))]
    Parse {
        message: String,
        location: String,
        line: usize,
    },

    /// Static‑analysis failure (misplaced `return`, `this`, `break`, ...).
    #[error("{}", report(.line, .location, .message))]
    Resolve {
        message: String,
        location: String,
        line: usize,
    },

    /// Runtime evaluation error.
    #[error("{}", report(.line, .location, .message))]
    Runtime {
        message: String,
        location: String,
        line: usize,
    },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF‑8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),
}

/// Formats one diagnostic line.
pub fn report(line: &usize, location: &str, message: &str) -> String {
    format!("[line {}] {}: error: {}", line, location, message)
}

/// `at 'lexeme'`, or `at end` for the EOF token.
pub fn location_of(token: &Token) -> String {
    match token.token_type {
        TokenType::EOF => "at end".to_string(),
        _ => format!("at '{}'", token.lexeme),
    }
}

impl CybroError {
    /// Helper constructor for the **scanner**.
    pub fn lex<L: Into<String>, S: Into<String>>(line: usize, location: L, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Lex error: line={}, msg={}", line, message);

        CybroError::Lex {
            message,
            location: location.into(),
            line,
        }
    }

    /// Helper constructor for the **parser**, located at `token`.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Parse error: line={}, msg={}", token.line, message);

        CybroError::Parse {
            message,
            location: location_of(token),
            line: token.line,
        }
    }

    /// Helper constructor for the **resolver**, located at `token`.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Resolve error: line={}, msg={}", token.line, message);

        CybroError::Resolve {
            message,
            location: location_of(token),
            line: token.line,
        }
    }

    /// Helper constructor for the **interpreter**, located at `token`.
    pub fn runtime<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Runtime error: line={}, msg={}", token.line, message);

        CybroError::Runtime {
            message,
            location: location_of(token),
            line: token.line,
        }
    }

    /// The bare message, without the `[line N]` decoration.
    pub fn message(&self) -> String {
        match self {
            CybroError::Lex { message, .. }
            | CybroError::Parse { message, .. }
            | CybroError::Resolve { message, .. }
            | CybroError::Runtime { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Source line of the diagnostic, if it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            CybroError::Lex { line, .. }
            | CybroError::Parse { line, .. }
            | CybroError::Resolve { line, .. }
            | CybroError::Runtime { line, .. } => Some(*line),
            _ => None,
        }
    }
}

/// Outcome of pushing one source string through the whole pipeline.
#[derive(Debug, Error)]
pub enum RunError {
    /// Lexical, syntax or resolution errors; nothing was executed.
    #[error("{}", render_all(.0))]
    Static(Vec<CybroError>),

    /// Execution started and stopped at this error.
    #[error(transparent)]
    Runtime(CybroError),
}

impl RunError {
    /// Process exit status a front end should use for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Static(_) => EXIT_STATIC,
            RunError::Runtime(_) => EXIT_RUNTIME,
        }
    }

    /// Every individual diagnostic carried by this failure.
    pub fn diagnostics(&self) -> Vec<&CybroError> {
        match self {
            RunError::Static(errors) => errors.iter().collect(),
            RunError::Runtime(error) => vec![error],
        }
    }
}

fn render_all(errors: &[CybroError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, CybroError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_render_through_report() {
        let eof = Token::new(TokenType::EOF, "", 4);
        let err = CybroError::parse(&eof, "Expected expression");

        assert_eq!(err.to_string(), report(&4, "at end", "Expected expression"));
        assert_eq!(err.to_string(), "[line 4] at end: error: Expected expression");
    }

    #[test]
    fn static_failures_join_every_diagnostic() {
        let name = Token::new(TokenType::IDENTIFIER, "x", 2);
        let failure = RunError::Static(vec![
            CybroError::lex(1, "at '@'", "Unexpected character: @"),
            CybroError::resolve(&name, "Already a variable with this name in this scope"),
        ]);

        assert_eq!(failure.exit_code(), EXIT_STATIC);
        assert_eq!(
            failure.to_string(),
            "[line 1] at '@': error: Unexpected character: @\n\
             [line 2] at 'x': error: Already a variable with this name in this scope"
        );
    }
}
