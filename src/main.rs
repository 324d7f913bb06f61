use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser, ValueEnum};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use recipe_converter::config::{self, ConverterConfig};
use recipe_converter::pipeline::extraction::{
    user_message, ExtractionContext, ProgressReporter, RawDocument,
};
use recipe_converter::pipeline::structuring::StructuringMode;
use recipe_converter::pipeline::{ConversionError, ConversionErrorKind, RecipeConverter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Completion API when a key is configured, heuristic parser otherwise
    Ai,
    /// Local section-marker parser only
    Heuristic,
}

impl From<ModeArg> for StructuringMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Ai => StructuringMode::Ai,
            ModeArg::Heuristic => StructuringMode::Heuristic,
        }
    }
}

/// Convert a recipe photo, PDF or text into a structured recipe (JSON on stdout).
#[derive(Debug, Parser)]
#[command(name = config::APP_NAME, version, about)]
#[command(group(ArgGroup::new("input").required(true).args(["path", "text"])))]
struct Cli {
    /// Image, PDF or text file to convert
    path: Option<PathBuf>,

    /// Recipe text to convert instead of a file
    #[arg(long)]
    text: Option<String>,

    #[arg(long, value_enum, default_value_t = ModeArg::Ai)]
    mode: ModeArg,

    /// Ask the model for the extended schema (equipment, nutrition, tags)
    #[arg(long)]
    detailed: bool,

    /// Settings file, instead of the one under the user config directory
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    recipe_converter::init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) if e.is_cancelled() => {
            eprintln!("{}", user_message(&e).text());
            ExitCode::from(130)
        }
        Err(e) => {
            tracing::debug!(kind = ?e.kind, error = %e, details = ?e.details, "Conversion failed");
            eprintln!("{}", user_message(&e).text());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<String, ConversionError> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = ConverterConfig::load_from(path)
                .map_err(|e| ConversionError::validation(e.to_string()))?;
            config.apply_env();
            config
        }
        None => ConverterConfig::load_or_default(),
    };
    if cli.detailed {
        config.ai.detailed = true;
    }

    tracing::info!(
        version = config::APP_VERSION,
        ai = config.ai_enabled(),
        "Starting recipe conversion"
    );

    let document = match (cli.text, cli.path) {
        (Some(text), _) => RawDocument::Text(text),
        (None, Some(path)) => RawDocument::from_path(&path).await?,
        (None, None) => return Err(ConversionError::empty_input()),
    };

    let converter = RecipeConverter::from_config(&config)?;
    let ctx = cli_context();

    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let outcome = converter.convert(document, cli.mode.into(), &ctx).await?;
    serde_json::to_string_pretty(&outcome).map_err(|e| {
        ConversionError::new(
            ConversionErrorKind::ApiError,
            format!("Cannot serialize result: {e}"),
        )
    })
}

/// Progress and status messages go to the log on stderr.
fn cli_context() -> ExtractionContext {
    let progress = ProgressReporter::new(|p| {
        tracing::info!(percent = p.percent, status = p.status.as_str(), "Progress");
    });

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            tracing::info!("{message}");
        }
    });

    ExtractionContext::new(progress, CancellationToken::new()).with_status_sink(tx)
}
