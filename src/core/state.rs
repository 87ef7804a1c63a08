use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// One step of plan generation. The seven chain stages run in declaration
/// order; `SingleShot` is the lone step of single-shot mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    EssenceExtraction,
    DivergentBrainstorming,
    SelectionWithJustification,
    CinematicLine,
    StoryExpansion,
    SelfCritique,
    PlanSynthesis,
    SingleShot,
}

impl Stage {
    pub const CHAIN: [Stage; 7] = [
        Stage::EssenceExtraction,
        Stage::DivergentBrainstorming,
        Stage::SelectionWithJustification,
        Stage::CinematicLine,
        Stage::StoryExpansion,
        Stage::SelfCritique,
        Stage::PlanSynthesis,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::EssenceExtraction => "Essence Extraction",
            Stage::DivergentBrainstorming => "Divergent Brainstorming",
            Stage::SelectionWithJustification => "Selection with Justification",
            Stage::CinematicLine => "Cinematic Line Generation",
            Stage::StoryExpansion => "Story Expansion",
            Stage::SelfCritique => "Self-Critique & Revision",
            Stage::PlanSynthesis => "Structured Plan Synthesis",
            Stage::SingleShot => "Single-Shot Plan",
        }
    }

    /// 1-based position in the chain, `None` for `SingleShot`.
    pub fn ordinal(&self) -> Option<usize> {
        Stage::CHAIN.iter().position(|s| s == self).map(|i| i + 1)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything one generation run has produced so far.
///
/// Owned by a single run and handed from stage to stage; nothing here is
/// shared between runs or persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ChainState {
    original_input: String,
    pub essence: Option<String>,
    pub brainstorm: Option<String>,
    pub selected_idea: Option<String>,
    pub cinematic_line: Option<String>,
    pub story_draft: Option<String>,
    pub final_story: Option<String>,
    pub plan_json: Option<String>,
    #[serde(skip)]
    timings: Vec<(Stage, Duration)>,
}

impl ChainState {
    pub fn new(original_input: impl Into<String>) -> Self {
        Self {
            original_input: original_input.into(),
            essence: None,
            brainstorm: None,
            selected_idea: None,
            cinematic_line: None,
            story_draft: None,
            final_story: None,
            plan_json: None,
            timings: Vec::new(),
        }
    }

    pub fn original_input(&self) -> &str {
        &self.original_input
    }

    pub fn output(&self, stage: Stage) -> Option<&str> {
        let slot = match stage {
            Stage::EssenceExtraction => &self.essence,
            Stage::DivergentBrainstorming => &self.brainstorm,
            Stage::SelectionWithJustification => &self.selected_idea,
            Stage::CinematicLine => &self.cinematic_line,
            Stage::StoryExpansion => &self.story_draft,
            Stage::SelfCritique => &self.final_story,
            Stage::PlanSynthesis | Stage::SingleShot => &self.plan_json,
        };
        slot.as_deref()
    }

    pub fn record(&mut self, stage: Stage, output: String, elapsed: Duration) {
        let slot = match stage {
            Stage::EssenceExtraction => &mut self.essence,
            Stage::DivergentBrainstorming => &mut self.brainstorm,
            Stage::SelectionWithJustification => &mut self.selected_idea,
            Stage::CinematicLine => &mut self.cinematic_line,
            Stage::StoryExpansion => &mut self.story_draft,
            Stage::SelfCritique => &mut self.final_story,
            Stage::PlanSynthesis | Stage::SingleShot => &mut self.plan_json,
        };
        *slot = Some(output);
        self.timings.push((stage, elapsed));
    }

    /// Stages completed so far, in the order they ran.
    pub fn timings(&self) -> &[(Stage, Duration)] {
        &self.timings
    }

    pub fn completed_stages(&self) -> Vec<Stage> {
        self.timings.iter().map(|(stage, _)| *stage).collect()
    }
}
