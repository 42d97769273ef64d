use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use stepweave_agent::{RunOutcome, TerminationReason};

mod config;
mod run;

use config::{AppConfig, ConfigError};

const EXIT_RUN_FAILED: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[derive(Parser, Debug)]
#[command(name = "stepweave", version)]
#[command(about = "Stepweave - plan, act and observe until a goal is met")]
struct Cli {
    /// Goal to accomplish
    #[arg(long)]
    goal: String,
    /// Maximum number of planned steps
    #[arg(long)]
    max_steps: Option<u32>,
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory run records are written to
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Keep a todo.md checklist of planned steps
    #[arg(long)]
    subtasks: bool,
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,
}

impl Cli {
    fn load_config(&self) -> Result<AppConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load_from_file(path)?,
            None => AppConfig::default(),
        };
        config.apply_process_env();
        if let Some(max_steps) = self.max_steps {
            config.orchestrator.max_steps = max_steps;
        }
        if let Some(dir) = &self.output_dir {
            config.output.dir = dir.clone();
        }
        if self.subtasks {
            config.orchestrator.enable_subtask_tracking = true;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_logging(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}

fn exit_code(outcome: &RunOutcome) -> ExitCode {
    match outcome.termination {
        TerminationReason::GoalSatisfied | TerminationReason::BudgetExhausted => ExitCode::SUCCESS,
        TerminationReason::HandlerError | TerminationReason::PlannerError => {
            ExitCode::from(EXIT_RUN_FAILED)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Configuration rejected");
            eprintln!("Error: {e}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let outcome = match run::build_oracle(&config) {
        Ok(oracle) => run::execute(&config, oracle, &cli.goal).await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok(outcome) => {
            println!("{}", outcome.summary_markdown());
            exit_code(&outcome)
        }
        Err(e) => {
            tracing::error!(error = %e, "Run setup failed");
            eprintln!("Error: {e}");
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}
