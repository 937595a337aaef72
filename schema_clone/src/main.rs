use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use schema_clone::config::{self, Config};
use schema_clone::snapshot::{self, Format};
use schema_clone::utils::init_logging;
use schema_clone::{compare_schemas, MigrationScript, SchemaCloneClient};

#[derive(Parser, Debug)]
#[command(name = "schema_clone")]
#[command(author, version, about = "Compare schema snapshots and plan migrations between environments")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the differences between two snapshots
    Compare {
        /// Snapshot of the environment to copy from
        #[arg(short, long)]
        source: PathBuf,

        /// Snapshot of the environment to bring in line
        #[arg(short, long)]
        target: PathBuf,

        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Generate forward and rollback SQL for two snapshots
    Migrate {
        #[arg(short, long)]
        source: PathBuf,

        #[arg(short, long)]
        target: PathBuf,

        /// Directory for forward.sql, rollback.sql and script.json; prints forward SQL when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Name of the source environment in the operation log
        #[arg(long, default_value = "source")]
        source_env: String,

        /// Name of the target environment in the operation log
        #[arg(long, default_value = "target")]
        target_env: String,
    },

    /// Re-check the statements of a saved migration script
    Validate {
        #[arg(short, long)]
        script: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Json,
    Yaml,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            let path_str = path.to_str().context("config path is not valid UTF-8")?;
            config::load_from_file(path_str)
                .with_context(|| format!("failed to load config {}", path.display()))
        }
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    init_logging(&config.logging)?;

    match args.command {
        Command::Compare {
            source,
            target,
            format,
        } => {
            let source = snapshot::load_schema(&source)
                .with_context(|| format!("failed to load {}", source.display()))?;
            let target = snapshot::load_schema(&target)
                .with_context(|| format!("failed to load {}", target.display()))?;

            let diff = compare_schemas(&source, &target, &config.comparison)?;
            let format = match format {
                OutputFormat::Json => Format::Json,
                OutputFormat::Yaml => Format::Yaml,
            };
            println!("{}", snapshot::render(&diff, format)?);
        }

        Command::Migrate {
            source,
            target,
            output,
            source_env,
            target_env,
        } => {
            let source = snapshot::load_schema(&source)
                .with_context(|| format!("failed to load {}", source.display()))?;
            let target = snapshot::load_schema(&target)
                .with_context(|| format!("failed to load {}", target.display()))?;

            let client = SchemaCloneClient::new(config);
            let plan = client
                .plan_clone(&source_env, &target_env, &source, &target)
                .await?;

            if plan.diff.is_empty() {
                tracing::info!("Target schema already matches the source");
            }

            match output {
                Some(dir) => {
                    std::fs::create_dir_all(&dir)
                        .with_context(|| format!("failed to create {}", dir.display()))?;
                    std::fs::write(dir.join("forward.sql"), plan.script.forward_sql())?;
                    std::fs::write(dir.join("rollback.sql"), plan.script.rollback_sql())?;
                    snapshot::save(&plan.script, dir.join("script.json"))?;
                    tracing::info!(
                        output = %dir.display(),
                        operations = plan.script.operations.len(),
                        "Migration written"
                    );
                }
                None => print!("{}", plan.script.forward_sql()),
            }
        }

        Command::Validate { script } => {
            let loaded: MigrationScript = snapshot::load(&script)
                .with_context(|| format!("failed to load {}", script.display()))?;
            if let Err(e) = loaded.validate() {
                bail!("{} is invalid: {}", script.display(), e);
            }
            println!(
                "{}: {} operations, {} rollback operations, risk {}",
                script.display(),
                loaded.operations.len(),
                loaded.rollback_operations.len(),
                loaded.risk_level
            );
        }
    }

    Ok(())
}
