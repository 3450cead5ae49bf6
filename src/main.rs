mod debug_report;

use claimlogic::{
    BooleanDecisions, ConfigError, EngineConfig, ForestLayout, ParseError, Record, Severity, apply_boolean_conversion,
    compile_expression, detect_boolean_candidates, evaluate_batch_with_metrics, execute_batch_with_metrics,
    parse_forest, tokenize, validate_tokens,
};
use debug_report::Report;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum CliError {
    #[error("error: {0}")]
    Usage(String),

    #[error("error: failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("error: {path}:{line}: invalid record: {source}")]
    Record { path: PathBuf, line: usize, source: serde_json::Error },

    #[error("error: {0}")]
    Config(#[from] ConfigError),

    #[error("error: {0}")]
    Parse(#[from] ParseError),

    #[error("error: invalid rule expression: {0}")]
    Expression(String),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => 2,
            _ => 1,
        }
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        if matches!(err, CliError::Usage(_)) {
            eprintln!("\n{}", help_text());
        }
        std::process::exit(err.exit_code());
    }
}

fn run() -> Result<(), CliError> {
    let command = parse_args()?;
    let config = match command.config_path() {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    init_tracing(&config.log_level);

    match command {
        Command::Figs(args) => run_figs(&args, &config),
        Command::Rule(args) => run_rule(&args, &config),
    }
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn run_figs(args: &FigsArgs, config: &EngineConfig) -> Result<(), CliError> {
    let report = Report::new(args.color);
    let text = read_file(&args.model)?;
    let mut forest = parse_forest(&text)?;

    let candidates = detect_boolean_candidates(&forest);
    let rewrite = args.boolean || config.boolean_rewrite;
    if rewrite {
        forest = apply_boolean_conversion(&forest, &BooleanDecisions::convert_all());
    }

    let layout = ForestLayout::build(&forest);
    report.model_header(&args.model.display().to_string(), &layout, forest.len());
    report.boolean_candidates(&candidates, rewrite);

    let Some(records_path) = &args.records else {
        return Ok(());
    };
    let records = read_records(records_path)?;
    let run = evaluate_batch_with_metrics(&records, &forest, &config.batch_options());
    for (idx, trace) in run.results.iter().enumerate() {
        report.trace(idx, trace, &layout);
    }
    report.timing(&run.metrics);
    Ok(())
}

fn run_rule(args: &RuleArgs, config: &EngineConfig) -> Result<(), CliError> {
    let report = Report::new(args.color);
    let fields = config.field_registry(args.fields.as_deref())?;
    let effect = args.effect.unwrap_or(config.default_effect);

    let validation = validate_tokens(tokenize(&args.expr, &fields), &fields);
    report.expression(&args.expr, &validation);

    let compiled = compile_expression(&args.expr, &fields, effect);
    report.compiled(&compiled);
    if !compiled.is_valid {
        return Err(CliError::Expression(compiled.errors.join("; ")));
    }

    let Some(records_path) = &args.records else {
        return Ok(());
    };
    let records = read_records(records_path)?;
    let run = execute_batch_with_metrics(&records, &compiled.rules, &config.batch_options());
    println!();
    for (idx, result) in run.results.iter().enumerate() {
        report.execution(idx, result);
    }
    report.timing(&run.metrics);
    Ok(())
}

fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Io { path: path.to_path_buf(), source })
}

/// One JSON object per non-blank line.
fn read_records(path: &Path) -> Result<Vec<Record>, CliError> {
    let text = read_file(path)?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str::<Record>(line).map_err(|source| CliError::Record {
                path: path.to_path_buf(),
                line: idx + 1,
                source,
            })
        })
        .collect()
}

// --- Arguments ---------------------------------------------------------------

enum Command {
    Figs(FigsArgs),
    Rule(RuleArgs),
}

impl Command {
    fn config_path(&self) -> Option<&Path> {
        match self {
            Command::Figs(args) => args.config.as_deref(),
            Command::Rule(args) => args.config.as_deref(),
        }
    }
}

struct FigsArgs {
    model: PathBuf,
    records: Option<PathBuf>,
    boolean: bool,
    config: Option<PathBuf>,
    color: bool,
}

struct RuleArgs {
    expr: String,
    fields: Option<String>,
    records: Option<PathBuf>,
    effect: Option<Severity>,
    config: Option<PathBuf>,
    color: bool,
}

fn parse_args() -> Result<Command, CliError> {
    let mut args = std::env::args().skip(1);
    let subcommand = match args.next() {
        Some(cmd) => cmd,
        None => return Err(CliError::Usage("no command provided".to_string())),
    };

    match subcommand.as_str() {
        "-h" | "--help" => {
            print_help();
            std::process::exit(0);
        }
        "-V" | "--version" => {
            println!("claimlogic {}", env!("CARGO_PKG_VERSION"));
            std::process::exit(0);
        }
        "figs" => parse_figs_args(args).map(Command::Figs),
        "rule" => parse_rule_args(args).map(Command::Rule),
        other => Err(CliError::Usage(format!("unknown command '{other}'"))),
    }
}

fn parse_figs_args(mut args: impl Iterator<Item = String>) -> Result<FigsArgs, CliError> {
    let mut model = None;
    let mut records = None;
    let mut boolean = false;
    let mut config = None;
    let mut color = io::stdout().is_terminal();

    while let Some(arg) = args.next() {
        let (flag, inline) = split_flag(&arg);
        match flag {
            "--model" | "-m" => model = Some(PathBuf::from(flag_value(flag, inline, &mut args)?)),
            "--records" | "-r" => records = Some(PathBuf::from(flag_value(flag, inline, &mut args)?)),
            "--config" | "-c" => config = Some(PathBuf::from(flag_value(flag, inline, &mut args)?)),
            "--boolean" => boolean = true,
            "--color" => color = true,
            "--no-color" => color = false,
            _ => return Err(CliError::Usage(format!("unknown option '{arg}'"))),
        }
    }

    let model = model.ok_or_else(|| CliError::Usage("figs requires --model <file>".to_string()))?;
    Ok(FigsArgs { model, records, boolean, config, color })
}

fn parse_rule_args(mut args: impl Iterator<Item = String>) -> Result<RuleArgs, CliError> {
    let mut expr: Option<String> = None;
    let mut fields = None;
    let mut records = None;
    let mut effect = None;
    let mut config = None;
    let mut color = io::stdout().is_terminal();

    while let Some(arg) = args.next() {
        let (flag, inline) = split_flag(&arg);
        match flag {
            "--expr" | "-e" => {
                if expr.is_some() {
                    return Err(CliError::Usage("expression provided multiple times".to_string()));
                }
                expr = Some(flag_value(flag, inline, &mut args)?);
            }
            "--fields" | "-f" => fields = Some(flag_value(flag, inline, &mut args)?),
            "--records" | "-r" => records = Some(PathBuf::from(flag_value(flag, inline, &mut args)?)),
            "--config" | "-c" => config = Some(PathBuf::from(flag_value(flag, inline, &mut args)?)),
            "--effect" => {
                let value = flag_value(flag, inline, &mut args)?;
                effect = Some(parse_severity(&value)?);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            _ => return Err(CliError::Usage(format!("unknown option '{arg}'"))),
        }
    }

    let expr = expr.filter(|e| !e.trim().is_empty());
    let expr = expr.ok_or_else(|| CliError::Usage("rule requires --expr <text>".to_string()))?;
    Ok(RuleArgs { expr, fields, records, effect, config, color })
}

/// `--flag=value` becomes `("--flag", Some("value"))`.
fn split_flag(arg: &str) -> (&str, Option<&str>) {
    match arg.split_once('=') {
        Some((flag, value)) if flag.starts_with("--") => (flag, Some(value)),
        _ => (arg, None),
    }
}

fn flag_value(flag: &str, inline: Option<&str>, args: &mut impl Iterator<Item = String>) -> Result<String, CliError> {
    match inline {
        Some(value) => Ok(value.to_string()),
        None => args.next().ok_or_else(|| CliError::Usage(format!("{flag} expects a value"))),
    }
}

fn parse_severity(value: &str) -> Result<Severity, CliError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "moderate" => Ok(Severity::Moderate),
        "high" => Ok(Severity::High),
        _ => Err(CliError::Usage(format!("invalid --effect '{value}' (expected moderate or high)"))),
    }
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "claimlogic {version}

FIGS tree-ensemble scoring and magic rule evaluation for claim records.

Usage:
  claimlogic figs --model <file> [--records <jsonl>] [--boolean] [--config <toml>]
  claimlogic rule --expr <text> [--fields a,b] [--records <jsonl>] [--effect <level>] [--config <toml>]

Options:
  -m, --model <file>       FIGS tree dump to parse.
  -r, --records <jsonl>    Claim records, one JSON object per line.
  --boolean                Rewrite 0/1 splits (`x <= 0.5`) to `x is No/Yes`.
  -e, --expr <text>        Magic rule expression.
  -f, --fields <a,b>       Known field names; required unless config sets known_fields.
  --effect <level>         Rule severity: moderate or high (default: config).
  -c, --config <toml>      Engine configuration file.
  --color                  Force ANSI color output.
  --no-color               Disable ANSI color output.
  -h, --help               Show this help message.
  -V, --version            Print version information.

Logging goes to stderr; set RUST_LOG to override the configured level.

Exit codes:
  0  Success.
  1  Parse, configuration or runtime error.
  2  Invalid arguments.
",
        version = env!("CARGO_PKG_VERSION"),
    )
}
