use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use cybro::ast_printer::AstPrinter;
use cybro::error::EXIT_STATIC;
use cybro::runner::{parse_source, Runner};
use cybro::scanner::Scanner;
use cybro::token::Token;
use cybro::RunError;

#[derive(ClapParser, Debug)]
#[command(version, about = "CybroScript interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to cybro.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: Option<PathBuf>,

        /// Print the tokens as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file and prints the syntax tree
    Parse { filename: Option<PathBuf> },

    /// Runs input from a file as a CybroScript program
    Run { filename: Option<PathBuf> },

    /// Starts an interactive session
    Repl,
}

/// Maps the file and copies it out as UTF‑8 text.
fn read_file(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);

    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;

    let len: u64 = file
        .metadata()
        .context(format!("Failed to stat file {:?}", filename))?
        .len();

    // Zero-length files cannot be mapped on every platform.
    if len == 0 {
        return Ok(String::new());
    }

    // SAFETY: the map is read once, immediately, and dropped before return.
    let map = unsafe { Mmap::map(&file) }.context(format!("Failed to map file {:?}", filename))?;

    let text: &str =
        std::str::from_utf8(&map).context(format!("File {:?} is not valid UTF-8", filename))?;

    info!("Read {} bytes from {:?}", text.len(), filename);

    Ok(text.to_owned())
}

fn init_logger() -> Result<()> {
    let log_file = File::create("cybro.log").context("Failed to create cybro.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("cybro::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to cybro.log");
    Ok(())
}

fn no_input() -> ! {
    info!("No filepath provided");
    println!("No input filepath was provided. Exiting...");
    std::process::exit(0);
}

/// Print every diagnostic of a failed run and exit with its status.
fn fail(error: RunError) -> ! {
    for diagnostic in error.diagnostics() {
        eprintln!("{}", diagnostic);
    }

    debug!("Exiting with code {}", error.exit_code());
    std::process::exit(error.exit_code());
}

fn tokenize(source: &str, json: bool) -> Result<()> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut tokenized = true;

    for result in Scanner::new(source.as_bytes()) {
        match result {
            Ok(token) => {
                if !json {
                    println!("{}", token);
                }
                tokens.push(token);
            }

            Err(e) => {
                tokenized = false;
                eprintln!("{}", e);
            }
        }
    }

    if json {
        let out: String =
            serde_json::to_string_pretty(&tokens).context("Failed to serialize tokens")?;
        println!("{}", out);
    }

    if !tokenized {
        debug!("Tokenization failed, exiting with code {}", EXIT_STATIC);
        std::process::exit(EXIT_STATIC);
    }

    info!("Tokenization completed successfully");
    Ok(())
}

const BANNER: &str = "Welcome to Cybro!
Type 'exit' to quit
Type 'help' for help
Type 'clear' to clear the screen";

const HELP: &str = "Commands:
  exit          leave the REPL
  help          show this message
  clear         clear the screen
  echo <text>   print <text>
Anything else is run as CybroScript.";

/// A line typed at the REPL prompt.
#[derive(Debug, PartialEq)]
enum ReplCommand<'a> {
    Exit,
    Help,
    Clear,
    Echo(&'a str),
    Empty,
    Source(&'a str),
}

impl<'a> ReplCommand<'a> {
    fn parse(input: &'a str) -> Self {
        match input {
            "" => ReplCommand::Empty,
            "exit" => ReplCommand::Exit,
            "help" => ReplCommand::Help,
            "clear" => ReplCommand::Clear,
            "echo" => ReplCommand::Echo(""),
            _ => match input.strip_prefix("echo ") {
                Some(text) => ReplCommand::Echo(text),
                None => ReplCommand::Source(input),
            },
        }
    }
}

fn repl() -> Result<()> {
    info!("Starting REPL");

    let mut runner = Runner::new();
    let stdin = io::stdin();
    let mut line = String::new();

    println!("{}", BANNER);

    loop {
        print!("⇝ ");
        io::stdout().flush().context("Failed to flush stdout")?;

        line.clear();
        let read: usize = stdin
            .lock()
            .read_line(&mut line)
            .context("Failed to read from stdin")?;

        if read == 0 {
            break;
        }

        let source: &str = match ReplCommand::parse(line.trim()) {
            ReplCommand::Exit => break,
            ReplCommand::Empty => continue,

            ReplCommand::Help => {
                println!("{}", HELP);
                continue;
            }

            ReplCommand::Clear => {
                print!("\x1B[2J");
                continue;
            }

            ReplCommand::Echo(text) => {
                println!("{}", text);
                continue;
            }

            ReplCommand::Source(source) => source,
        };

        match runner.run(source) {
            Ok(report) => {
                for warning in report.warnings {
                    eprintln!("{}", warning);
                }
            }

            Err(e) => {
                for diagnostic in e.diagnostics() {
                    eprintln!("{}", diagnostic);
                }
            }
        }
    }

    info!("REPL finished");
    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        Builder::new()
            .filter_level(log::LevelFilter::Off)
            .parse_default_env()
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename, json } => {
            let Some(filename) = filename else { no_input() };

            info!("Running Tokenize subcommand");
            let source: String = read_file(&filename)?;
            tokenize(&source, json)?;
        }

        Commands::Parse { filename } => {
            let Some(filename) = filename else { no_input() };

            info!("Running Parse subcommand");
            let source: String = read_file(&filename)?;

            match parse_source(&source) {
                Ok(statements) => {
                    for stmt in &statements {
                        println!("{}", AstPrinter::print_stmt(stmt));
                    }
                }
                Err(e) => fail(e),
            }

            info!("Parse subcommand completed");
        }

        Commands::Run { filename } => {
            let Some(filename) = filename else { no_input() };

            info!("Running Run subcommand");
            let source: String = read_file(&filename)?;
            debug!("Provided input:\n {}", source);

            let mut runner = Runner::new();

            match runner.run(&source) {
                Ok(report) => {
                    for warning in report.warnings {
                        eprintln!("{}", warning);
                    }
                }
                Err(e) => fail(e),
            }
        }

        Commands::Repl => repl()?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::ReplCommand;

    #[test]
    fn repl_commands_are_recognised() {
        assert_eq!(ReplCommand::parse("exit"), ReplCommand::Exit);
        assert_eq!(ReplCommand::parse("help"), ReplCommand::Help);
        assert_eq!(ReplCommand::parse("clear"), ReplCommand::Clear);
        assert_eq!(ReplCommand::parse(""), ReplCommand::Empty);
        assert_eq!(ReplCommand::parse("echo hi there"), ReplCommand::Echo("hi there"));
        assert_eq!(ReplCommand::parse("echo"), ReplCommand::Echo(""));
    }

    #[test]
    fn anything_else_is_source() {
        assert_eq!(
            ReplCommand::parse("print 1;"),
            ReplCommand::Source("print 1;")
        );
        assert_eq!(ReplCommand::parse("echoes;"), ReplCommand::Source("echoes;"));
        assert_eq!(ReplCommand::parse("exit;"), ReplCommand::Source("exit;"));
    }
}
