mod demo;

use anyhow::Context;
use bindings_js::execute_bytecode;
use bindings_js::ExecuteOptions;
use clap::Parser;
use demo::DemoBindings;
use engine_js::Bytecode;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(
  name = "bindings-js-cli",
  version,
  about = "Run engine-js bytecode with native demo bindings"
)]
struct Cli {
  /// Bytecode file, as JSON.
  input: PathBuf,

  /// JSON file with execution options; flags below override it.
  #[arg(long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Wall-clock limit for the script, in milliseconds.
  #[arg(long, value_name = "MS")]
  time_limit: Option<u64>,

  /// Load and validate the bytecode without running it.
  #[arg(long)]
  stop_after_init: bool,

  /// Print heap statistics as JSON on stderr after the run.
  #[arg(long)]
  gc_stats: bool,

  /// Run a full collection before taking statistics. Implies --gc-stats.
  #[arg(long)]
  force_gc_before_stats: bool,

  /// Sample heap counters on a background thread at this interval while the script runs.
  #[arg(long, value_name = "MS")]
  sample_stats: Option<u64>,

  /// Emit tracing spans as JSON on stderr.
  #[arg(long)]
  trace: bool,
}

fn init_tracing(enabled: bool) {
  if !enabled {
    return;
  }
  let _ = tracing_subscriber::fmt()
    .with_span_events(FmtSpan::CLOSE)
    .with_max_level(Level::DEBUG)
    .with_writer(std::io::stderr)
    .json()
    .with_ansi(false)
    .try_init();
}

fn load_options(cli: &Cli) -> anyhow::Result<ExecuteOptions> {
  let mut options = match &cli.config {
    Some(path) => {
      let raw = fs::read(path).with_context(|| format!("failed to read config {}", path.display()))?;
      serde_json::from_slice(&raw).with_context(|| format!("invalid config {}", path.display()))?
    }
    None => ExecuteOptions::default(),
  };
  if cli.time_limit.is_some() {
    options.time_limit_ms = cli.time_limit;
  }
  if cli.sample_stats.is_some() {
    options.sample_stats_interval_ms = cli.sample_stats;
  }
  options.stop_after_init |= cli.stop_after_init;
  options.force_gc_before_stats |= cli.force_gc_before_stats;
  options.gc_stats |= cli.gc_stats || options.force_gc_before_stats;
  Ok(options)
}

fn load_bytecode(path: &Path) -> anyhow::Result<Bytecode> {
  let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
  let bytecode =
    Bytecode::from_slice(&raw).with_context(|| format!("failed to decode {}", path.display()))?;
  tracing::debug!(
    instructions = bytecode.instructions.len(),
    "decoded bytecode"
  );
  Ok(bytecode)
}

fn run(cli: &Cli) -> anyhow::Result<bool> {
  let options = load_options(cli)?;
  let bytecode = load_bytecode(&cli.input)?;
  let source_name = cli.input.display().to_string();
  Ok(execute_bytecode(
    Arc::new(bytecode),
    &source_name,
    &mut DemoBindings::default(),
    options,
  ))
}

fn main() -> ExitCode {
  let cli = match Cli::try_parse() {
    Ok(cli) => cli,
    Err(err) => {
      let _ = err.print();
      return if err.use_stderr() {
        ExitCode::FAILURE
      } else {
        ExitCode::SUCCESS
      };
    }
  };
  init_tracing(cli.trace);
  match run(&cli) {
    Ok(true) => ExitCode::SUCCESS,
    Ok(false) => ExitCode::FAILURE,
    Err(err) => {
      eprintln!("error: {err:#}");
      ExitCode::FAILURE
    }
  }
}
