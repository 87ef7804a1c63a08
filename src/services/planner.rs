use crate::core::config::{Config, GenerationMode};
use crate::core::error::PlanError;
use crate::core::plan::{CreativeBrief, CreativePlan, MediaKind};
use crate::core::state::{ChainState, Stage};
use crate::services::chain::ChainedPlanGenerator;
use crate::services::llm::LlmClient;
use crate::services::observer::{LogObserver, PipelineObserver};
use crate::services::prompts;
use crate::services::validate::normalize_and_validate;
use crate::services::vision::VisionClient;
use log::info;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
pub struct PlannerOptions {
    pub mode: GenerationMode,
    /// Deadline for each individual model call of a run.
    pub stage_timeout: Option<Duration>,
}

impl PlannerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: config.planner.mode,
            stage_timeout: config.planner.stage_timeout(),
        }
    }
}

/// A validated plan together with every intermediate output of its run.
#[derive(Debug, Clone)]
pub struct PlanRun {
    pub plan: CreativePlan,
    pub trace: ChainState,
}

/// Entry point for turning briefs (typed or captioned) into plans.
///
/// Holds no per-run state, so one instance can serve any number of
/// concurrent requests. Dropping a returned future cancels the model call in
/// flight and discards the partial run.
pub struct PlanOrchestrator {
    llm: Arc<dyn LlmClient>,
    vision: Option<Arc<dyn VisionClient>>,
    options: PlannerOptions,
    observer: Arc<dyn PipelineObserver>,
}

impl PlanOrchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, options: PlannerOptions) -> Self {
        Self {
            llm,
            vision: None,
            options,
            observer: Arc::new(LogObserver),
        }
    }

    pub fn with_vision(mut self, vision: Arc<dyn VisionClient>) -> Self {
        self.vision = Some(vision);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn options(&self) -> PlannerOptions {
        self.options
    }

    pub async fn plan_from_brief(&self, input: &str) -> Result<CreativePlan, PlanError> {
        Ok(self.plan_with_trace(input).await?.plan)
    }

    pub async fn plan_with_trace(&self, input: &str) -> Result<PlanRun, PlanError> {
        let brief = CreativeBrief::new(input)?;
        let generator = ChainedPlanGenerator::new(self.llm.as_ref(), self.observer.as_ref())
            .with_stage_timeout(self.options.stage_timeout);

        let trace = match self.options.mode {
            GenerationMode::Chained => generator.run(&brief).await?,
            GenerationMode::SingleShot => generator.run_single_shot(&brief).await?,
        };

        let raw = trace.output(final_stage(self.options.mode)).unwrap_or_default();
        let plan = normalize_and_validate(raw)?;
        info!("Plan ready: {}", plan.title());
        Ok(PlanRun { plan, trace })
    }

    /// Blocking variant of [`plan_from_brief`](Self::plan_from_brief) for
    /// synchronous callers. Inside a Tokio runtime it returns
    /// `PlanError::InsideRuntime` without making any call.
    pub fn plan_from_brief_blocking(&self, input: &str) -> Result<CreativePlan, PlanError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(PlanError::InsideRuntime);
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(PlanError::Runtime)?;
        runtime.block_on(self.plan_from_brief(input))
    }

    /// Describes the media with the vision backend. The caption is an
    /// ordinary brief from here on.
    pub async fn caption_media(&self, bytes: &[u8], kind: MediaKind) -> Result<CreativeBrief, PlanError> {
        let vision = self.vision.as_ref().ok_or(PlanError::VisionUnavailable)?;
        let caption = vision
            .caption(bytes, kind)
            .await
            .map_err(PlanError::Captioning)?;
        info!("Caption for {:?}: {}", kind, caption);
        CreativeBrief::new(caption)
    }

    pub async fn plan_from_media(&self, bytes: &[u8], kind: MediaKind) -> Result<CreativePlan, PlanError> {
        let brief = self.caption_media(bytes, kind).await?;
        self.plan_from_brief(brief.as_str()).await
    }

    /// Asks the model for a random one-sentence brief.
    pub async fn surprise_brief(&self) -> Result<CreativeBrief, PlanError> {
        let text = self
            .llm
            .complete(&prompts::surprise_brief())
            .await
            .map_err(|source| PlanError::Generation {
                stage: Stage::SingleShot,
                source,
            })?;
        CreativeBrief::new(text.trim().trim_matches('"'))
    }
}

fn final_stage(mode: GenerationMode) -> Stage {
    match mode {
        GenerationMode::Chained => Stage::PlanSynthesis,
        GenerationMode::SingleShot => Stage::SingleShot,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::observer::SilentObserver;
    use crate::services::testing::{canned_chain, ScriptedLlm, ScriptedVision};
    use std::sync::Mutex;

    const ASTRONAUT: &str = "An astronaut tries to start a flower shop on the moon.";

    const PLAN_JSON: &str = r#"{
        "title": "Petals in Low Gravity",
        "concept_summary": "A lone astronaut fights the vacuum to sell flowers.",
        "hook": "Would you buy a rose that has never felt wind?",
        "visual_style": "Soft pastel sci-fi with glowing flora",
        "tone": "Bittersweet",
        "scene_ideas": ["Seeds drift out of a torn packet", "First customer: a rover"]
    }"#;

    fn orchestrator(llm: &ScriptedLlm, mode: GenerationMode) -> PlanOrchestrator {
        PlanOrchestrator::new(
            Arc::new(llm.clone()),
            PlannerOptions {
                mode,
                stage_timeout: None,
            },
        )
        .with_observer(Arc::new(SilentObserver))
    }

    #[tokio::test]
    async fn test_astronaut_brief_end_to_end() {
        let llm = ScriptedLlm::new(canned_chain(PLAN_JSON));
        let planner = orchestrator(&llm, GenerationMode::Chained);

        let plan = planner.plan_from_brief(ASTRONAUT).await.unwrap();

        assert_eq!(plan.title(), "Petals in Low Gravity");
        assert!(!plan.concept_summary().is_empty());
        assert!(!plan.hook().is_empty());
        assert_eq!(plan.scenes().len(), 2);
        assert_eq!(llm.call_count(), 7);
    }

    #[tokio::test]
    async fn test_fenced_incomplete_plan_is_schema_error() {
        let llm = ScriptedLlm::new(canned_chain("```json\n{\"title\":\"T\"}\n```"));
        let planner = orchestrator(&llm, GenerationMode::Chained);

        let err = planner.plan_from_brief(ASTRONAUT).await.unwrap_err();

        assert!(err.is_schema());
        match err {
            PlanError::Schema { missing_fields, .. } => {
                assert!(missing_fields.contains(&"scene_ideas".to_string()));
                assert!(missing_fields.contains(&"hook".to_string()));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_prose_answer_is_format_error() {
        let llm = ScriptedLlm::new(canned_chain("Sure! Here is a plan about flowers."));
        let planner = orchestrator(&llm, GenerationMode::Chained);

        let err = planner.plan_from_brief(ASTRONAUT).await.unwrap_err();
        assert!(err.is_format());
    }

    #[tokio::test]
    async fn test_service_failure_names_stage_and_stops() {
        let llm = ScriptedLlm::new(canned_chain(PLAN_JSON)).failing_on_call(3);
        let planner = orchestrator(&llm, GenerationMode::Chained);

        let err = planner.plan_from_brief(ASTRONAUT).await.unwrap_err();

        assert_eq!(err.stage(), Some(Stage::SelectionWithJustification));
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_brief_makes_no_calls() {
        let llm = ScriptedLlm::new(canned_chain(PLAN_JSON));
        let planner = orchestrator(&llm, GenerationMode::Chained);

        let err = planner.plan_from_brief("   ").await.unwrap_err();

        assert!(matches!(err, PlanError::EmptyBrief));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_single_shot_mode() {
        let llm = ScriptedLlm::new(vec![format!("```json\n{}\n```", PLAN_JSON)]);
        let planner = orchestrator(&llm, GenerationMode::SingleShot);

        let run = planner.plan_with_trace(ASTRONAUT).await.unwrap();

        assert_eq!(run.plan.title(), "Petals in Low Gravity");
        assert_eq!(run.trace.completed_stages(), vec![Stage::SingleShot]);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_trace_keeps_every_stage_output() {
        let llm = ScriptedLlm::new(canned_chain(PLAN_JSON));
        let planner = orchestrator(&llm, GenerationMode::Chained);

        let run = planner.plan_with_trace(ASTRONAUT).await.unwrap();

        for stage in Stage::CHAIN {
            assert!(run.trace.output(stage).is_some(), "no output kept for {}", stage);
        }
        assert_eq!(run.trace.original_input(), ASTRONAUT);
    }

    #[test]
    fn test_blocking_entry_point() {
        let llm = ScriptedLlm::new(canned_chain(PLAN_JSON));
        let planner = orchestrator(&llm, GenerationMode::Chained);

        let plan = planner.plan_from_brief_blocking(ASTRONAUT).unwrap();

        assert_eq!(plan.title(), "Petals in Low Gravity");
        assert_eq!(llm.call_count(), 7);
    }

    #[tokio::test]
    async fn test_blocking_entry_point_refuses_inside_runtime() {
        let llm = ScriptedLlm::new(canned_chain(PLAN_JSON));
        let planner = orchestrator(&llm, GenerationMode::Chained);

        let err = planner.plan_from_brief_blocking(ASTRONAUT).unwrap_err();

        assert!(matches!(err, PlanError::InsideRuntime));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_independent() {
        let first = ScriptedLlm::new(canned_chain(PLAN_JSON));
        let second = ScriptedLlm::new(canned_chain(&PLAN_JSON.replace("Petals in Low Gravity", "Crater Bouquet")));
        let planner_a = orchestrator(&first, GenerationMode::Chained);
        let planner_b = orchestrator(&second, GenerationMode::Chained);

        let (a, b) = futures_util::future::join(
            planner_a.plan_from_brief(ASTRONAUT),
            planner_b.plan_from_brief("A lighthouse keeper adopts a whale."),
        )
        .await;

        assert_eq!(a.unwrap().title(), "Petals in Low Gravity");
        assert_eq!(b.unwrap().title(), "Crater Bouquet");
        assert!(second.prompts()[0].contains("lighthouse"));
    }

    #[tokio::test]
    async fn test_plan_from_image_uses_caption_as_brief() {
        let llm = ScriptedLlm::new(canned_chain(PLAN_JSON));
        let vision = ScriptedVision::captioning("A neon koi swims through a rainy alley.");
        let planner = orchestrator(&llm, GenerationMode::Chained).with_vision(Arc::new(vision.clone()));

        let plan = planner.plan_from_media(b"fake-bytes", MediaKind::Image).await.unwrap();

        assert_eq!(plan.title(), "Petals in Low Gravity");
        assert_eq!(vision.calls(), vec![MediaKind::Image]);
        assert!(llm.prompts()[0].contains("neon koi"));
    }

    #[tokio::test]
    async fn test_caption_failure_skips_pipeline() {
        let llm = ScriptedLlm::new(canned_chain(PLAN_JSON));
        let planner = orchestrator(&llm, GenerationMode::Chained)
            .with_vision(Arc::new(ScriptedVision::failing()));

        let err = planner.plan_from_media(b"video", MediaKind::Video).await.unwrap_err();

        assert!(matches!(err, PlanError::Captioning(_)));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_media_without_vision_backend() {
        let llm = ScriptedLlm::new(vec![]);
        let planner = orchestrator(&llm, GenerationMode::Chained);

        let err = planner.plan_from_media(b"img", MediaKind::Image).await.unwrap_err();
        assert!(matches!(err, PlanError::VisionUnavailable));
    }

    #[tokio::test]
    async fn test_surprise_brief_strips_quotes() {
        let llm = ScriptedLlm::new(vec!["\"A choir of traffic cones sings at dawn.\"\n".to_string()]);
        let planner = orchestrator(&llm, GenerationMode::Chained);

        let brief = planner.surprise_brief().await.unwrap();

        assert_eq!(brief.as_str(), "A choir of traffic cones sings at dawn.");
        assert!(llm.prompts()[0].contains("35 words"));
    }

    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl PipelineObserver for RecordingObserver {
        fn stage_started(&self, stage: Stage) {
            self.events.lock().unwrap().push(format!("start {}", stage));
        }

        fn stage_completed(&self, stage: Stage, _output: &str, _elapsed: Duration) {
            self.events.lock().unwrap().push(format!("done {}", stage));
        }

        fn stage_failed(&self, stage: Stage, _error: &crate::core::error::ServiceError) {
            self.events.lock().unwrap().push(format!("fail {}", stage));
        }

        fn run_completed(&self, _state: &ChainState) {
            self.events.lock().unwrap().push("run done".to_string());
        }
    }

    #[tokio::test]
    async fn test_observer_sees_each_stage() {
        let observer = Arc::new(RecordingObserver { events: Mutex::new(Vec::new()) });
        let llm = ScriptedLlm::new(canned_chain(PLAN_JSON)).failing_on_call(2);
        let planner = orchestrator(&llm, GenerationMode::Chained).with_observer(observer.clone());

        planner.plan_from_brief(ASTRONAUT).await.unwrap_err();

        let events = observer.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "start Essence Extraction",
                "done Essence Extraction",
                "start Divergent Brainstorming",
                "fail Divergent Brainstorming",
            ]
        );
    }
}
