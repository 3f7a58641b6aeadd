//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::ENVIRONMENT_SECTION;
use crate::domain::environment::Environment;
use crate::domain::error::{AlphaError, ParseError};
use crate::domain::frame::Frame;
use crate::domain::gene::Gene;
use crate::domain::setup::{build_environment, undeclared_series};
use crate::ports::config_port::ConfigPort;

#[derive(Parser, Debug)]
#[command(name = "alphagene", about = "Typed alpha factor expressions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Where the expression comes from.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct Expression {
    /// Expression in `name(arg, ...)` notation
    #[arg(short, long)]
    pub expr: Option<String>,
    /// File holding the XML form of an expression
    #[arg(long)]
    pub xml_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse an expression and print its canonical forms
    Parse {
        #[arg(short, long)]
        config: PathBuf,
        #[command(flatten)]
        expression: Expression,
    },
    /// Type-check an expression
    Validate {
        #[arg(short, long)]
        config: PathBuf,
        #[command(flatten)]
        expression: Expression,
    },
    /// Evaluate an expression over a date window and write it as CSV
    Eval {
        #[arg(short, long)]
        config: PathBuf,
        #[command(flatten)]
        expression: Expression,
        #[arg(long, value_parser = parse_date)]
        start: NaiveDate,
        #[arg(long, value_parser = parse_date)]
        end: NaiveDate,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the calendar, universe, series and operators of an environment
    Info {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{}', expected YYYY-MM-DD: {}", value, e))
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Parse { config, expression } => run_parse(&config, &expression),
        Command::Validate { config, expression } => run_validate(&config, &expression),
        Command::Eval {
            config,
            expression,
            start,
            end,
            output,
        } => run_eval(&config, &expression, start, end, output.as_deref()),
        Command::Info { config } => run_info(&config),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, AlphaError> {
    FileConfigAdapter::from_file(path).map_err(|e| AlphaError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// `data_dir` resolved against the directory holding the config file.
pub fn data_dir(config: &dyn ConfigPort, config_path: &Path) -> Result<PathBuf, AlphaError> {
    let dir = config
        .get_string(ENVIRONMENT_SECTION, "data_dir")
        .ok_or_else(|| AlphaError::ConfigMissing {
            section: ENVIRONMENT_SECTION.to_string(),
            key: "data_dir".to_string(),
        })?;
    let dir = PathBuf::from(dir.trim());
    if dir.is_absolute() {
        return Ok(dir);
    }
    Ok(config_path
        .parent()
        .map(|parent| parent.join(&dir))
        .unwrap_or(dir))
}

pub fn load_environment(config_path: &Path) -> Result<Environment, AlphaError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;
    let source = CsvAdapter::new(data_dir(&config, config_path)?);
    build_environment(&config, &source)
}

/// Parse the expression from whichever source was given.
pub fn read_expression(env: &Environment, expression: &Expression) -> Result<Gene, AlphaError> {
    match (&expression.expr, &expression.xml_file) {
        (Some(text), _) => env.parse_string(text).map_err(|e| {
            if let AlphaError::Parse(parse) = &e {
                eprintln!("{}", parse.display_with_context(text));
            }
            e
        }),
        (None, Some(path)) => {
            let xml = fs::read_to_string(path)?;
            env.parse_xmlstring(&xml)
        }
        (None, None) => Err(AlphaError::Parse(ParseError {
            message: "no expression given".into(),
            position: 0,
        })),
    }
}

/// Write a frame as CSV: `date` then one column per instrument, NaN as an empty cell.
pub fn write_frame<W: Write>(frame: &Frame, writer: W) -> Result<(), AlphaError> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec!["date".to_string()];
    header.extend(frame.columns().iter().cloned());
    wtr.write_record(&header).map_err(io::Error::from)?;

    for (date, row) in frame.dates().iter().zip(frame.rows()) {
        let mut record = vec![date.format("%Y-%m-%d").to_string()];
        record.extend(row.iter().map(|v| {
            if v.is_nan() {
                String::new()
            } else {
                v.to_string()
            }
        }));
        wtr.write_record(&record).map_err(io::Error::from)?;
    }
    wtr.flush()?;
    Ok(())
}

fn run_parse(config_path: &Path, expression: &Expression) -> Result<ExitCode, AlphaError> {
    let env = load_environment(config_path)?;
    let gene = read_expression(&env, expression)?;

    println!("Expression: {}", gene);
    println!("Nodes:      {}", gene.len());
    println!("Depth:      {}", gene.depth());
    println!("Hashcode:   {}", gene.hashcode());
    println!("XML:        {}", gene.to_xml_string());
    Ok(ExitCode::SUCCESS)
}

fn run_validate(config_path: &Path, expression: &Expression) -> Result<ExitCode, AlphaError> {
    let env = load_environment(config_path)?;
    let gene = read_expression(&env, expression)?;

    eprintln!("Validating: {}", gene);
    match (gene.dimension(), gene.validation_error()) {
        (Some(dimension), _) => {
            println!("valid, dimension '{}'", dimension);
            Ok(ExitCode::SUCCESS)
        }
        (None, Some(err)) => {
            println!("invalid: {}", err);
            Ok(ExitCode::from(4))
        }
        (None, None) => Ok(ExitCode::from(4)),
    }
}

fn run_eval(
    config_path: &Path,
    expression: &Expression,
    start: NaiveDate,
    end: NaiveDate,
    output: Option<&Path>,
) -> Result<ExitCode, AlphaError> {
    let env = load_environment(config_path)?;
    let gene = read_expression(&env, expression)?;

    if let Some(err) = gene.validation_error() {
        eprintln!("error: {} does not validate: {}", gene, err);
        return Ok(ExitCode::from(4));
    }

    eprintln!("Evaluating {} from {} to {}", gene, start, end);
    let frame = gene.eval(&env, start, end)?;

    match output {
        Some(path) => {
            write_frame(&frame, fs::File::create(path)?)?;
            eprintln!("Wrote {} rows to {}", frame.len(), path.display());
        }
        None => write_frame(&frame, io::stdout().lock())?,
    }
    Ok(ExitCode::SUCCESS)
}

fn run_info(config_path: &Path) -> Result<ExitCode, AlphaError> {
    let config = load_config(config_path)?;
    let source = CsvAdapter::new(data_dir(&config, config_path)?);
    let env = build_environment(&config, &source)?;

    match (env.calendar().first(), env.calendar().last()) {
        (Some(first), Some(last)) => println!(
            "Calendar:  {} to {} ({} trading days)",
            first,
            last,
            env.calendar().len()
        ),
        _ => println!("Calendar:  empty"),
    }
    println!("Universe:  {}", env.universe().join(", "));

    println!("\nData series:");
    for (name, entry) in env.data_entries() {
        let dimension = entry.dimension.to_string();
        println!(
            "  {:<16} [{}] {} rows",
            name,
            if dimension.is_empty() { "-" } else { dimension.as_str() },
            entry.frame.len()
        );
    }

    let extra = undeclared_series(&config, &source)?;
    if !extra.is_empty() {
        println!("\nUndeclared CSV files: {}", extra.join(", "));
    }

    println!("\nOperators:");
    for operator in env.operators().iter() {
        println!("  {:<16} arity {}", operator.name(), operator.arity());
    }
    Ok(ExitCode::SUCCESS)
}
