use crate::core::error::{PlanError, ServiceError};
use crate::core::plan::CreativeBrief;
use crate::core::state::{ChainState, Stage};
use crate::services::llm::LlmClient;
use crate::services::observer::PipelineObserver;
use crate::services::prompts;
use std::time::{Duration, Instant};

/// Runs the staged prompt chain for one brief.
///
/// Each stage's prompt is built from the previous stage's output, so the
/// stages run strictly one after another. The first failing call ends the
/// run; nothing after it is attempted.
pub struct ChainedPlanGenerator<'a> {
    llm: &'a dyn LlmClient,
    observer: &'a dyn PipelineObserver,
    stage_timeout: Option<Duration>,
}

impl<'a> ChainedPlanGenerator<'a> {
    pub fn new(llm: &'a dyn LlmClient, observer: &'a dyn PipelineObserver) -> Self {
        Self {
            llm,
            observer,
            stage_timeout: None,
        }
    }

    pub fn with_stage_timeout(mut self, stage_timeout: Option<Duration>) -> Self {
        self.stage_timeout = stage_timeout;
        self
    }

    /// Runs all seven stages. The returned state holds every intermediate
    /// output; `plan_json` is the unparsed answer of the last stage.
    pub async fn run(&self, brief: &CreativeBrief) -> Result<ChainState, PlanError> {
        let mut state = ChainState::new(brief.as_str());
        let brief = brief.as_str();

        let essence = self
            .run_stage(&mut state, Stage::EssenceExtraction, prompts::essence(brief))
            .await?;
        let ideas = self
            .run_stage(&mut state, Stage::DivergentBrainstorming, prompts::brainstorm(&essence, brief))
            .await?;
        let selected = self
            .run_stage(&mut state, Stage::SelectionWithJustification, prompts::selection(&ideas))
            .await?;
        let line = self
            .run_stage(&mut state, Stage::CinematicLine, prompts::cinematic_line(&selected))
            .await?;
        let draft = self
            .run_stage(&mut state, Stage::StoryExpansion, prompts::story_expansion(&line, brief))
            .await?;
        let story = self
            .run_stage(&mut state, Stage::SelfCritique, prompts::self_critique(&draft, brief))
            .await?;
        self.run_stage(&mut state, Stage::PlanSynthesis, prompts::plan_synthesis(&story))
            .await?;

        self.observer.run_completed(&state);
        Ok(state)
    }

    /// One call from brief to plan JSON.
    pub async fn run_single_shot(&self, brief: &CreativeBrief) -> Result<ChainState, PlanError> {
        let mut state = ChainState::new(brief.as_str());
        self.run_stage(&mut state, Stage::SingleShot, prompts::single_shot_plan(brief.as_str()))
            .await?;

        self.observer.run_completed(&state);
        Ok(state)
    }

    async fn run_stage(
        &self,
        state: &mut ChainState,
        stage: Stage,
        prompt: String,
    ) -> Result<String, PlanError> {
        self.observer.stage_started(stage);
        let started = Instant::now();

        let result = match self.stage_timeout {
            Some(limit) => tokio::time::timeout(limit, self.llm.complete(&prompt))
                .await
                .unwrap_or_else(|_| Err(ServiceError::Timeout(limit))),
            None => self.llm.complete(&prompt).await,
        };

        let output = match result {
            Ok(text) if stage == Stage::SelfCritique => single_paragraph(&text),
            Ok(text) => text,
            Err(source) => {
                self.observer.stage_failed(stage, &source);
                return Err(PlanError::Generation { stage, source });
            }
        };

        let elapsed = started.elapsed();
        self.observer.stage_completed(stage, &output, elapsed);
        state.record(stage, output.clone(), elapsed);
        Ok(output)
    }
}

const COMMENTARY_MARKERS: [&str; 9] = [
    "creativity rating",
    "rating",
    "score",
    "critique",
    "improvements",
    "changes made",
    "changes",
    "notes",
    "note",
];

const STORY_LABELS: [&str; 4] = ["revised story:", "final story:", "revised:", "story:"];

/// Reduces a critique answer to the story paragraph alone: commentary lines
/// around each block and leading labels are dropped, and the longest
/// remaining block wins. Lines inside a block are never removed.
pub(crate) fn single_paragraph(text: &str) -> String {
    let best = text
        .split("\n\n")
        .map(trim_commentary)
        .map(|block| strip_label(&block).to_string())
        .filter(|block| !block.is_empty())
        .max_by_key(|block| block.len());

    best.unwrap_or_else(|| text.trim().to_string())
}

// Drops commentary lines at the start and end of a block, joins the rest.
fn trim_commentary(block: &str) -> String {
    let lines: Vec<&str> = block.lines().map(str::trim).filter(|line| !line.is_empty()).collect();
    let start = lines.iter().position(|line| !is_commentary(line)).unwrap_or(lines.len());
    let end = lines.iter().rposition(|line| !is_commentary(line)).map_or(start, |i| i + 1);
    lines[start..end].join(" ")
}

/// A labelled remark such as `Rating: 7/10` or `Changes - tighter ending`,
/// or a bare score like `8/10`.
fn is_commentary(line: &str) -> bool {
    let lower = line.to_lowercase();
    let labelled = COMMENTARY_MARKERS.iter().any(|marker| {
        lower
            .strip_prefix(marker)
            .map(str::trim_start)
            .is_some_and(|rest| rest.starts_with(':') || rest.starts_with('-'))
    });
    labelled || is_bare_score(&lower)
}

fn is_bare_score(line: &str) -> bool {
    let line = line.trim_end_matches('.');
    match line.split_once('/') {
        Some((score, "10")) => {
            let score = score.trim();
            !score.is_empty() && score.chars().all(|c| c.is_ascii_digit() || c == '.')
        }
        _ => false,
    }
}

fn strip_label(block: &str) -> &str {
    let lower = block.to_lowercase();
    STORY_LABELS
        .iter()
        .find(|label| lower.starts_with(*label))
        .and_then(|label| block.get(label.len()..))
        .map(str::trim)
        .unwrap_or(block)
}
