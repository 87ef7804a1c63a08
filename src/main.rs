use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use creative_planner::core::config::{Config, GenerationMode, DEFAULT_CONFIG_PATH};
use creative_planner::core::error::ServiceError;
use creative_planner::core::state::{ChainState, Stage};
use creative_planner::services::llm::create_llm;
use creative_planner::services::observer::{LogObserver, PipelineObserver};
use creative_planner::services::planner::{PlanOrchestrator, PlannerOptions};
use creative_planner::services::vision::create_vision;
use creative_planner::{CreativePlan, MediaKind};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "creative-planner", about = "Turn a creative brief into a short-form video plan")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Overrides `planner.mode` from the configuration.
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Print every stage output to stderr.
    #[arg(long)]
    trace: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan from a text brief (asked for interactively when omitted).
    Text { brief: Option<String> },
    /// Caption an image, then plan from the caption.
    Image { path: PathBuf },
    /// Caption an MP4 video, then plan from the caption.
    Video { path: PathBuf },
    /// Invent a surprise brief, then plan it.
    Surprise,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Chained,
    SingleShot,
}

impl From<ModeArg> for GenerationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Chained => GenerationMode::Chained,
            ModeArg::SingleShot => GenerationMode::SingleShot,
        }
    }
}

/// Spinner on stderr that follows the run stage by stage. Stays hidden until
/// the first stage starts so it never draws over the brief prompt.
struct ProgressObserver {
    bar: ProgressBar,
    started: AtomicBool,
    trace: bool,
    log: LogObserver,
}

impl ProgressObserver {
    fn new(total_stages: u64, trace: bool) -> Result<Self> {
        let bar = ProgressBar::with_draw_target(Some(total_stages), ProgressDrawTarget::hidden());
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:20.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        Ok(Self {
            bar,
            started: AtomicBool::new(false),
            trace,
            log: LogObserver,
        })
    }
}

impl PipelineObserver for ProgressObserver {
    fn stage_started(&self, stage: Stage) {
        if !self.started.swap(true, Ordering::Relaxed) {
            self.bar.set_draw_target(ProgressDrawTarget::stderr());
            self.bar.enable_steady_tick(Duration::from_millis(120));
        }
        self.bar.set_message(stage.name());
        self.log.stage_started(stage);
    }

    fn stage_completed(&self, stage: Stage, output: &str, elapsed: Duration) {
        if self.trace {
            self.bar.println(format!("--- {} ({:.1}s)\n{}", stage, elapsed.as_secs_f64(), output));
        }
        self.bar.inc(1);
        self.log.stage_completed(stage, output, elapsed);
    }

    fn stage_failed(&self, stage: Stage, error: &ServiceError) {
        self.bar.abandon_with_message(format!("{} failed", stage));
        self.log.stage_failed(stage, error);
    }

    fn run_completed(&self, state: &ChainState) {
        self.bar.finish_and_clear();
        self.log.run_completed(state);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match Config::load_from(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            eprintln!("Please ensure '{}' exists with valid LLM settings.", cli.config.display());
            return Err(e);
        }
    };

    let mut options = PlannerOptions::from_config(&config);
    if let Some(mode) = cli.mode {
        options.mode = mode.into();
    }
    let total_stages = match options.mode {
        GenerationMode::Chained => Stage::CHAIN.len() as u64,
        GenerationMode::SingleShot => 1,
    };

    let llm = create_llm(&config)?;
    let mut planner = PlanOrchestrator::new(llm, options)
        .with_observer(Arc::new(ProgressObserver::new(total_stages, cli.trace)?));

    let plan: CreativePlan = match cli.command {
        Command::Text { brief } => {
            let brief = match brief {
                Some(text) => text,
                None => inquire::Text::new("Creative brief:")
                    .with_help_message("e.g. An astronaut tries to start a flower shop on the moon.")
                    .prompt()?,
            };
            planner.plan_from_brief(&brief).await?
        }
        Command::Image { path } => {
            planner = planner.with_vision(create_vision(&config)?);
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            planner.plan_from_media(&bytes, MediaKind::Image).await?
        }
        Command::Video { path } => {
            planner = planner.with_vision(create_vision(&config)?);
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            planner.plan_from_media(&bytes, MediaKind::Video).await?
        }
        Command::Surprise => {
            let brief = planner.surprise_brief().await?;
            eprintln!("Surprise brief: {}", brief);
            planner.plan_from_brief(brief.as_str()).await?
        }
    };

    println!("{}", plan.to_json_pretty()?);
    Ok(())
}
