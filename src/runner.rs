//! Drives one source string through the whole pipeline:
//! scan → parse → resolve → interpret.
//!
//! A [`Runner`] owns one [`Interpreter`], so globals defined by one `run`
//! stay visible to the next (the REPL relies on this).

use std::io::Write;

use log::{debug, info, warn};

use crate::ast::Stmt;
use crate::error::{CybroError, RunError};
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::{Resolution, Resolver};
use crate::scanner::scan;

/// What a successful run leaves behind besides program output.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Non‑fatal resolver diagnostics.
    pub warnings: Vec<CybroError>,
}

pub struct Runner {
    interpreter: Interpreter,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self::with_interpreter(Interpreter::new())
    }

    /// Program output goes to `output` instead of stdout.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        Self::with_interpreter(Interpreter::with_output(output))
    }

    pub fn with_interpreter(interpreter: Interpreter) -> Self {
        Runner { interpreter }
    }

    /// Run `source` as a program.
    ///
    /// Any lexical, syntax or resolution error stops the run before anything
    /// executes.  A runtime error stops it where it happened; output written
    /// up to that point stays written.
    pub fn run(&mut self, source: &str) -> Result<RunReport, RunError> {
        let statements: Vec<Stmt> = parse_source(source)?;

        let Resolution { locals, warnings } =
            Resolver::new().resolve(&statements).map_err(RunError::Static)?;

        for warning in &warnings {
            warn!("{}", warning);
        }

        self.interpreter
            .interpret(&statements, locals)
            .map_err(RunError::Runtime)?;

        info!("Program executed successfully");

        Ok(RunReport { warnings })
    }
}

/// Scan and parse `source`.  Lexical and syntax errors are reported together,
/// in that order.
pub fn parse_source(source: &str) -> Result<Vec<Stmt>, RunError> {
    let (tokens, mut errors) = scan(source);

    debug!(
        "Scanned {} token(s), {} lexical error(s)",
        tokens.len(),
        errors.len()
    );

    match Parser::new(&tokens).parse() {
        Ok(statements) if errors.is_empty() => {
            info!("Parsed {} statement(s)", statements.len());
            Ok(statements)
        }

        Ok(_) => Err(RunError::Static(errors)),

        Err(parse_errors) => {
            errors.extend(parse_errors);
            Err(RunError::Static(errors))
        }
    }
}
