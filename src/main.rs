use clap::{Args, Parser, Subcommand};
use logcrunch::cli::run::RunOptions;
use logcrunch::config::resolve_config_path;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logcrunch")]
#[command(about = "Parallel analyzer for rotated search-server logs", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a log file, directory or wildcard path
    Run(RunArgs),
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct RunArgs {
    /// File, directory or path with `*` wildcards in the last component
    path: PathBuf,

    /// Literal terms to collect matching records for (requires --output-dir)
    terms: Vec<String>,

    #[arg(short = 'o', long)]
    output_dir: Option<PathBuf>,

    /// Only analyze records between START and END (YYYY-MM-DD HH:MM:SS)
    #[arg(short = 'r', long, num_args = 2, value_names = ["START", "END"])]
    range: Option<Vec<String>>,

    #[arg(long)]
    slow_queries: Option<usize>,

    #[arg(long)]
    slow_load_times: Option<usize>,

    /// Scanner threads per file; 0 uses every available core
    #[arg(long)]
    threads: Option<usize>,
}

impl From<RunArgs> for RunOptions {
    fn from(args: RunArgs) -> Self {
        let range = args.range.and_then(|bounds| match bounds.as_slice() {
            [start, end] => Some((start.clone(), end.clone())),
            _ => None,
        });

        RunOptions {
            path: args.path,
            terms: args.terms,
            output_dir: args.output_dir,
            range,
            slow_queries: args.slow_queries,
            slow_load_times: args.slow_load_times,
            threads: args.threads,
        }
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the starter configuration
    Init {
        #[arg(long)]
        stdout: bool,
    },
    /// Check a configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logcrunch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());

    match cli.command {
        Commands::Run(args) => {
            logcrunch::cli::run::run(args.into(), config_path).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { stdout } => {
                logcrunch::cli::config::init(stdout)?;
            }
            ConfigAction::Validate => {
                logcrunch::cli::config::validate(config_path)?;
            }
        },
    }

    Ok(())
}
