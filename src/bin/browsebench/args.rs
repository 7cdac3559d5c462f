use anyhow::{Result, anyhow};
use std::env;
use std::path::PathBuf;

pub const USAGE: &str = "\
Usage:
  browsebench run [-m MODEL]... [-t DIR] [-s TEST]... [-o FILE] [--max-steps N] [--sessions N] [--trace-dir DIR]
  browsebench results [-o FILE]
  browsebench tests [-t DIR]";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunArgs {
    pub models: Vec<String>,     // -m/--model, repeatable
    pub tests_dir: Option<PathBuf>, // -t/--tests-dir
    pub tests: Vec<String>,      // -s/--test, repeatable
    pub output: Option<PathBuf>, // -o/--output
    pub max_steps: Option<u32>,  // --max-steps
    pub sessions: Option<usize>, // --sessions
    pub trace_dir: Option<PathBuf>, // --trace-dir
}

#[derive(Debug, Clone, PartialEq)]
pub enum CliArgs {
    Run(RunArgs),
    Results { output: Option<PathBuf> },
    Tests { tests_dir: Option<PathBuf> },
    Help,
}

/// Next argument as the value of `flag`.
fn value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{flag} requires a value"))
}

fn number<T: std::str::FromStr>(raw: &str, flag: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| anyhow!("{flag} expects a number, got '{raw}'"))
}

impl CliArgs {
    /// Parse command-line arguments
    pub fn parse() -> Result<Self> {
        let args: Vec<String> = env::args().collect();
        Self::parse_from(&args[1..])
    }

    /// Parse from a slice of arguments (for testing)
    pub fn parse_from(args: &[String]) -> Result<Self> {
        let Some((command, rest)) = args.split_first() else {
            return Ok(CliArgs::Help);
        };

        match command.as_str() {
            "run" => Self::parse_run(rest).map(CliArgs::Run),
            "results" => {
                let mut output = None;
                let mut i = 0;
                while i < rest.len() {
                    let arg = rest[i].as_str();
                    match arg {
                        "-o" | "--output" => output = Some(PathBuf::from(value(rest, &mut i, arg)?)),
                        unknown => return Err(anyhow!("Unknown argument: {unknown}")),
                    }
                    i += 1;
                }
                Ok(CliArgs::Results { output })
            }
            "tests" => {
                let mut tests_dir = None;
                let mut i = 0;
                while i < rest.len() {
                    let arg = rest[i].as_str();
                    match arg {
                        "-t" | "--tests-dir" => {
                            tests_dir = Some(PathBuf::from(value(rest, &mut i, arg)?))
                        }
                        unknown => return Err(anyhow!("Unknown argument: {unknown}")),
                    }
                    i += 1;
                }
                Ok(CliArgs::Tests { tests_dir })
            }
            "-h" | "--help" | "help" => Ok(CliArgs::Help),
            unknown => Err(anyhow!("Unknown command: {unknown}")),
        }
    }

    fn parse_run(args: &[String]) -> Result<RunArgs> {
        let mut result = RunArgs::default();

        let mut i = 0;
        while i < args.len() {
            let arg = args[i].as_str();

            match arg {
                "-m" | "--model" => result.models.push(value(args, &mut i, arg)?.to_string()),
                "-t" | "--tests-dir" => {
                    result.tests_dir = Some(PathBuf::from(value(args, &mut i, arg)?));
                }
                "-s" | "--test" => result.tests.push(value(args, &mut i, arg)?.to_string()),
                "-o" | "--output" => {
                    result.output = Some(PathBuf::from(value(args, &mut i, arg)?));
                }
                "--max-steps" => {
                    let steps: u32 = number(value(args, &mut i, arg)?, arg)?;
                    if steps == 0 {
                        return Err(anyhow!("--max-steps must be at least 1"));
                    }
                    result.max_steps = Some(steps);
                }
                "--sessions" => {
                    result.sessions = Some(number(value(args, &mut i, arg)?, arg)?);
                }
                "--trace-dir" => {
                    result.trace_dir = Some(PathBuf::from(value(args, &mut i, arg)?));
                }
                unknown => {
                    return Err(anyhow!("Unknown argument: {unknown}"));
                }
            }

            i += 1;
        }

        Ok(result)
    }
}
