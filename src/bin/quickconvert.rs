//! CLI binary for quickconvert.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConverterConfig`, drives the `Converter` and prints outcomes.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use quickconvert::{
    ConversionFormat, ConversionOutcome, Converter, ConverterConfig, InputSource, Strategy,
    SubmitRequest, ToolProbe,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a spreadsheet export to JSON
  quickconvert convert people.csv --format csv-to-json

  # Convert several images at once and copy the results next to them
  quickconvert convert a.png b.png c.png -f png-to-jpg --out .

  # Office documents (needs LibreOffice; otherwise a placeholder is written)
  quickconvert convert slides.pptx -f pptx-to-pdf

  # Fetch a stored output by name
  quickconvert fetch 1700000000000-123456789-people.json -o people.json

  # Run the retention sweeper until Ctrl-C
  quickconvert watch

  # One-off sweep with a shorter retention window
  quickconvert --retention-hours 1 sweep

ENVIRONMENT VARIABLES:
  QUICKCONVERT_UPLOAD_DIR      Directory for stored inputs
  QUICKCONVERT_OUTPUT_DIR      Directory for conversion outputs
  QUICKCONVERT_OFFICE_COMMAND  Office converter program (default: libreoffice)
  QUICKCONVERT_TOOL_PROBE      auto, present or absent
  QUICKCONVERT_RETENTION_HOURS Age after which stored files are deleted
  RUST_LOG                     Overrides the log filter
"#;

/// Convert files between formats with bounded on-disk retention.
#[derive(Parser, Debug)]
#[command(
    name = "quickconvert",
    version,
    about = "Convert files between formats with bounded on-disk retention",
    long_about = "Convert images (PNG/JPG), tabular data (CSV/JSON) and office documents \
(DOCX/PPTX/PDF via LibreOffice). Inputs and outputs are stored on disk and removed by a \
retention sweeper once they exceed the configured age.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory for stored inputs.
    #[arg(long, global = true, env = "QUICKCONVERT_UPLOAD_DIR")]
    upload_dir: Option<PathBuf>,

    /// Directory for conversion outputs.
    #[arg(long, global = true, env = "QUICKCONVERT_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Program used for office conversions.
    #[arg(long, global = true, env = "QUICKCONVERT_OFFICE_COMMAND")]
    office_command: Option<String>,

    /// How to decide whether the office program is installed.
    #[arg(long, global = true, env = "QUICKCONVERT_TOOL_PROBE", value_enum, default_value = "auto")]
    tool_probe: ProbeArg,

    /// Delete stored files older than this many hours.
    #[arg(long, global = true, env = "QUICKCONVERT_RETENTION_HOURS", default_value_t = 24,
          value_parser = clap::value_parser!(u64).range(1..))]
    retention_hours: u64,

    /// Minutes between two background sweeps.
    #[arg(long, global = true, env = "QUICKCONVERT_SWEEP_MINUTES", default_value_t = 60,
          value_parser = clap::value_parser!(u64).range(1..))]
    sweep_minutes: u64,

    /// JPEG quality (1–100).
    #[arg(long, global = true, env = "QUICKCONVERT_JPEG_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Largest accepted input in MiB.
    #[arg(long, global = true, env = "QUICKCONVERT_MAX_INPUT_MB", default_value_t = 50)]
    max_input_mb: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "QUICKCONVERT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "QUICKCONVERT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one or more files.
    Convert {
        /// Input files.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Conversion identifier, e.g. csv-to-json.
        #[arg(short, long)]
        format: String,

        /// Also copy each output into this directory.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Number of files converted concurrently.
        #[arg(short, long, default_value_t = 4)]
        concurrency: usize,

        /// Print outcomes as JSON.
        #[arg(long)]
        json: bool,

        /// Disable the spinner.
        #[arg(long)]
        no_progress: bool,
    },

    /// Read a stored output by file name.
    Fetch {
        /// Output file name as reported by `convert`.
        file_name: String,

        /// Write to this path instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run one retention sweep now.
    Sweep {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run the periodic retention sweeper until Ctrl-C.
    Watch,

    /// Print the liveness status.
    Health,

    /// List supported conversions.
    Formats,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ProbeArg {
    Auto,
    Present,
    Absent,
}

impl From<ProbeArg> for ToolProbe {
    fn from(v: ProbeArg) -> Self {
        match v {
            ProbeArg::Auto => ToolProbe::Auto,
            ProbeArg::Present => ToolProbe::Present,
            ProbeArg::Absent => ToolProbe::Absent,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // `watch` is a long-running service and keeps INFO logs; one-shot
    // commands only show warnings unless asked.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if matches!(cli.command, Command::Watch) {
        "info"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let converter = Converter::open(config)
        .await
        .context("Failed to prepare storage directories")?;

    match cli.command {
        Command::Convert {
            ref inputs,
            ref format,
            ref out,
            concurrency,
            json,
            no_progress,
        } => {
            let show_progress = !cli.quiet && !json && !no_progress;
            let failed = run_convert(
                &converter,
                inputs,
                format,
                out.as_ref(),
                concurrency.max(1),
                json,
                show_progress,
                cli.quiet,
            )
            .await?;
            if failed > 0 {
                std::process::exit(1);
            }
        }

        Command::Fetch {
            ref file_name,
            ref output,
        } => {
            let bytes = converter
                .fetch_result(file_name)
                .await
                .with_context(|| format!("Failed to fetch {file_name}"))?;
            match output {
                Some(path) => {
                    tokio::fs::write(path, &bytes)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    if !cli.quiet {
                        eprintln!(
                            "{} {} bytes  →  {}",
                            green("✔"),
                            bytes.len(),
                            bold(&path.display().to_string())
                        );
                    }
                }
                None => {
                    io::stdout()
                        .lock()
                        .write_all(&bytes)
                        .context("Failed to write to stdout")?;
                }
            }
        }

        Command::Sweep { json } => {
            let report = converter.sweep().await;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("Failed to serialise report")?
                );
            } else if !cli.quiet {
                eprintln!(
                    "{} scanned {}  deleted {}  failed {}",
                    if report.failed == 0 { green("✔") } else { red("✘") },
                    report.scanned,
                    bold(&report.deleted.to_string()),
                    report.failed
                );
            }
        }

        Command::Watch => {
            let sweeper = converter.spawn_sweeper();
            if !cli.quiet {
                eprintln!(
                    "{} sweeping {} and {} every {} min (Ctrl-C to stop)",
                    cyan("◆"),
                    converter.config().upload_dir.display(),
                    converter.config().output_dir.display(),
                    cli.sweep_minutes
                );
            }
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            sweeper.join().await;
        }

        Command::Health => {
            let health = converter.health();
            println!(
                "{}",
                serde_json::to_string(&health).context("Failed to serialise health")?
            );
        }

        Command::Formats => {
            let office = converter.delegate().is_available().await;
            for format in ConversionFormat::ALL {
                let executor = match format.strategy() {
                    Strategy::InProcess(_) => "in-process".to_string(),
                    Strategy::Delegate(_) if office => converter.config().office_command.clone(),
                    Strategy::Delegate(_) => "placeholder (office tool not found)".to_string(),
                    Strategy::Unsupported => continue,
                };
                println!("{:<14} {}", format.identifier(), dim(&executor));
            }
        }
    }

    Ok(())
}

/// Submit every input and print one line per outcome. Returns the number of
/// failed conversions.
#[allow(clippy::too_many_arguments)]
async fn run_convert(
    converter: &Converter,
    inputs: &[PathBuf],
    format: &str,
    out: Option<&PathBuf>,
    concurrency: usize,
    json: bool,
    show_progress: bool,
    quiet: bool,
) -> Result<usize> {
    if let Some(dir) = out {
        if !dir.is_dir() {
            bail!("--out {} is not a directory", dir.display());
        }
    }

    let spinner = show_progress.then(|| {
        let bar = ProgressBar::new(inputs.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {pos}/{len}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Converting");
        bar.set_message(format.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    let results: Vec<(PathBuf, ConversionOutcome)> = stream::iter(inputs.iter().cloned())
        .map(|path| {
            let converter = converter.clone();
            let request = SubmitRequest::new()
                .input(InputSource::path(&path))
                .format(format);
            let spinner = spinner.clone();
            async move {
                let outcome = converter.submit(request).await;
                if let Some(bar) = &spinner {
                    bar.inc(1);
                }
                (path, outcome)
            }
        })
        .buffered(concurrency)
        .collect()
        .await;

    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }

    let mut failed = 0;
    for (path, outcome) in &results {
        if !outcome.is_success() {
            failed += 1;
        }
        if let (Some(dir), Some(artifact)) = (out, outcome.artifact()) {
            let dest = dir.join(output_name_for(path, &artifact.file_name));
            tokio::fs::copy(&artifact.path, &dest)
                .await
                .with_context(|| format!("Failed to copy output to {}", dest.display()))?;
        }
        if json || quiet {
            continue;
        }
        match outcome {
            ConversionOutcome::Converted { output, size_bytes } => eprintln!(
                "  {} {}  →  {}  {}",
                green("✓"),
                path.display(),
                bold(&output.file_name),
                dim(&format!("{size_bytes} bytes"))
            ),
            ConversionOutcome::Demo {
                message,
                placeholder,
            } => eprintln!(
                "  {} {}  →  {}  {}",
                cyan("⚠"),
                path.display(),
                bold(&placeholder.file_name),
                dim(message)
            ),
            ConversionOutcome::Failed { kind, message } => eprintln!(
                "  {} {}  {}  {}",
                red("✗"),
                path.display(),
                red(&kind.to_string()),
                message
            ),
        }
    }

    if json {
        let rows: Vec<serde_json::Value> = results
            .iter()
            .map(|(path, outcome)| {
                serde_json::json!({ "input": path, "outcome": outcome })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&rows).context("Failed to serialise outcomes")?
        );
    } else if !quiet && results.len() > 1 {
        eprintln!(
            "{} {}/{} converted",
            if failed == 0 { green("✔") } else { red("✘") },
            bold(&(results.len() - failed).to_string()),
            results.len()
        );
    }

    Ok(failed)
}

/// Name for a copied output: the input's stem with the output's extension.
fn output_name_for(input: &std::path::Path, stored: &str) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    match std::path::Path::new(stored).extension() {
        Some(ext) => format!("{stem}.{}", ext.to_string_lossy()),
        None => stem,
    }
}

/// Map CLI args to `ConverterConfig`.
fn build_config(cli: &Cli) -> Result<ConverterConfig> {
    let mut builder = ConverterConfig::builder()
        .tool_probe(cli.tool_probe.clone().into())
        .retention(Duration::from_secs(cli.retention_hours * 3600))
        .sweep_interval(Duration::from_secs(cli.sweep_minutes * 60))
        .jpeg_quality(cli.jpeg_quality)
        .max_input_bytes(cli.max_input_mb.saturating_mul(1024 * 1024));

    if let Some(ref dir) = cli.upload_dir {
        builder = builder.upload_dir(dir);
    }
    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_dir(dir);
    }
    if let Some(ref cmd) = cli.office_command {
        builder = builder.office_command(cmd);
    }

    builder.build().context("Invalid configuration")
}
