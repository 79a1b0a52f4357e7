//! MODELJOIN CLI
//!
//! Compose models, run them against an R or Python session, and edit the
//! script tree of a combined model.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use modeljoin_core::{parse_relations, Model};
use modeljoin_plan::{
    parameters_to_json, script_tree, Composer, ComposerConfig, ConflictStrategy, ScriptNode,
    DEFAULT_SUFFIX,
};
use modeljoin_runtime::{Orchestrator, ProcessFactory, RunnerConfig};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "modeljoin")]
#[command(about = "MODELJOIN - compose and execute script models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Combine two models into one
    Join {
        /// Left model document
        #[arg(short, long)]
        left: PathBuf,
        /// Right model document
        #[arg(short, long)]
        right: PathBuf,
        /// Join relations document
        #[arg(short = 'j', long)]
        relations: Option<PathBuf>,
        /// Name of the combined model
        #[arg(short, long, default_value = "combined")]
        name: String,
        /// Output path, stdout when absent
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Suffix for colliding left ids
        #[arg(long, default_value = DEFAULT_SUFFIX)]
        suffix: String,
        /// Fail instead of renaming repeatedly
        #[arg(long)]
        fail_fast: bool,
    },
    /// Execute a model
    Run {
        /// Model document
        #[arg(short, long)]
        model: PathBuf,
        /// Simulation number
        #[arg(short, long, default_value_t = 0)]
        simulation: usize,
        /// Runner configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print or apply the script tree of a model
    Tree {
        /// Model document
        #[arg(short, long)]
        model: PathBuf,
        /// Edited script tree to write back
        #[arg(short, long)]
        apply: Option<PathBuf>,
        /// Output path for the edited model, stdout when absent
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the merged parameters of a model
    Params {
        /// Model document
        #[arg(short, long)]
        model: PathBuf,
    },
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).wrap_err_with(|| format!("reading {}", path.display()))
}

fn load_model(path: &Path) -> Result<Model> {
    serde_json::from_str(&read(path)?).wrap_err_with(|| format!("parsing model {}", path.display()))
}

fn emit(document: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, document).wrap_err_with(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "Wrote document");
        }
        None => println!("{}", document),
    }
    Ok(())
}

fn join(
    left: &Path,
    right: &Path,
    relations: Option<&Path>,
    name: &str,
    suffix: String,
    fail_fast: bool,
) -> Result<Model> {
    let relations = match relations {
        Some(path) => parse_relations(&read(path)?)?,
        None => Vec::new(),
    };
    let strategy = if fail_fast {
        ConflictStrategy::FailFast
    } else {
        ConflictStrategy::LoopUntilStable
    };
    let composer = Composer::with_config(ComposerConfig { suffix, strategy });
    let output = composer.compose(name, load_model(left)?, load_model(right)?, &relations)?;
    for warning in &output.warnings {
        warn!(%warning, "Composition warning");
    }
    Ok(output.model.into())
}

fn run(model: &Path, simulation: usize, config: Option<&Path>) -> Result<()> {
    let config = match config {
        Some(path) => RunnerConfig::from_file(path)?,
        None => RunnerConfig::default(),
    };
    let model = load_model(model)?;
    let factory = ProcessFactory::new(config.interpreters.clone());
    let orchestrator = Orchestrator::new(factory).with_config(config);

    match orchestrator.execute(&model, simulation) {
        Ok(outcome) => {
            for line in &outcome.report.stdout {
                println!("{}", line);
            }
            let summary = serde_json::json!({
                "runId": outcome.run_id.to_string(),
                "values": outcome.values,
                "plot": outcome.plot,
                "workspace": outcome.workspace,
                "warnings": outcome.report.warnings,
                "metrics": outcome.metrics,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Err(failure) => {
            for line in &failure.report.stderr {
                eprintln!("{}", line);
            }
            Err(eyre!(failure.error).wrap_err(format!("running {}", model.name())))
        }
    }
}

fn tree(model: &Path, apply: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let mut loaded = load_model(model)?;
    match apply {
        None => emit(&serde_json::to_string_pretty(&script_tree::build(&loaded))?, output),
        Some(edited) => {
            let edited: ScriptNode = serde_json::from_str(&read(edited)?)
                .wrap_err_with(|| format!("parsing script tree {}", edited.display()))?;
            script_tree::apply(&mut loaded, &edited)?;
            emit(&serde_json::to_string_pretty(&loaded)?, output)
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("modeljoin=info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Join {
            left,
            right,
            relations,
            name,
            output,
            suffix,
            fail_fast,
        } => {
            let model = join(&left, &right, relations.as_deref(), &name, suffix, fail_fast)?;
            emit(&serde_json::to_string_pretty(&model)?, output.as_deref())
        }
        Commands::Run {
            model,
            simulation,
            config,
        } => run(&model, simulation, config.as_deref()),
        Commands::Tree {
            model,
            apply,
            output,
        } => tree(&model, apply.as_deref(), output.as_deref()),
        Commands::Params { model } => {
            let model = load_model(&model)?;
            println!("{}", parameters_to_json(model.parameters())?);
            Ok(())
        }
    }
}
