//! sapply - field ownership apply tool
//!
//! Runs apply scenarios against an in-process engine and inspects documents.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use structured_apply::merge::Comparison;
use structured_apply::scenario::Scenario;
use structured_apply::value::{self, Map};
use structured_apply::{Engine, EngineConfig};

#[derive(Parser)]
#[command(name = "sapply", version)]
#[command(about = "Multi-manager apply with field ownership tracking")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output location. Use '-' for stdout
    #[arg(short, long, global = true, default_value = "-")]
    output: String,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run a scenario and print the resulting resources.
    Run {
        /// Scenario file (YAML)
        script: PathBuf,
        /// Run only the first N steps
        #[arg(short, long)]
        steps: Option<usize>,
        /// Engine configuration file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the field paths of a YAML/JSON document.
    Fieldset {
        file: PathBuf,
    },

    /// Compare two YAML/JSON documents leaf by leaf.
    Compare {
        #[arg(long)]
        lhs: PathBuf,
        #[arg(long)]
        rhs: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut output: Box<dyn Write> = if cli.output == "-" {
        Box::new(io::stdout())
    } else {
        Box::new(fs::File::create(&cli.output)
            .map_err(|e| format!("Failed to create output file {:?}: {}", cli.output, e))?)
    };

    match cli.command {
        Command::Run {
            script,
            steps,
            config,
        } => run_scenario(&script, steps, config.as_deref(), &mut output)?,
        Command::Fieldset { file } => fieldset(&file, &mut output)?,
        Command::Compare { lhs, rhs } => compare(&lhs, &rhs, &mut output)?,
    }

    Ok(())
}

fn read_document(file: &Path) -> Result<Map, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(file)
        .map_err(|e| format!("Failed to read file {:?}: {}", file, e))?;
    let document = value::document_from_yaml(&content)
        .map_err(|e| format!("Failed to parse {:?}: {}", file, e))?;
    Ok(document)
}

fn run_scenario(
    script: &Path,
    steps: Option<usize>,
    config: Option<&Path>,
    output: &mut dyn Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = match config {
        Some(path) => Engine::from_config(&EngineConfig::load(path)?)?,
        None => Engine::new(),
    };
    let scenario = Scenario::load(script)?;

    for report in scenario.run(&engine, steps)? {
        match &report.result {
            Ok(Some(resource)) => writeln!(
                output,
                "# step {}: {} {}: version {}",
                report.index, report.op, report.identity, resource.version
            )?,
            Ok(None) => writeln!(output, "# step {}: {} {}", report.index, report.op, report.identity)?,
            Err(e) => writeln!(
                output,
                "# step {}: {} {} failed: {}",
                report.index,
                report.op,
                report.identity,
                e.to_string().replace('\n', "\n#   ")
            )?,
        }
    }

    for identity in scenario.identities() {
        match engine.get(&identity) {
            Ok(resource) => {
                writeln!(output, "---")?;
                write!(output, "{}", serde_yaml::to_string(&resource)?)?;
            }
            Err(e) if e.is_not_found() => writeln!(output, "# {} is absent", identity)?,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

fn fieldset(file: &Path, output: &mut dyn Write) -> Result<(), Box<dyn std::error::Error>> {
    let document = read_document(file)?;
    for path in document.to_field_set().paths() {
        writeln!(output, "{}", path)?;
    }
    Ok(())
}

fn compare(lhs: &Path, rhs: &Path, output: &mut dyn Write) -> Result<(), Box<dyn std::error::Error>> {
    let comparison = Comparison::between(&read_document(lhs)?, &read_document(rhs)?);
    if comparison.is_same() {
        writeln!(output, "Documents are identical")?;
    } else {
        writeln!(output, "{}", comparison)?;
    }
    Ok(())
}
