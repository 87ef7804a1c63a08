use crate::core::error::PlanError;
use crate::core::plan::CreativePlan;
use serde_json::{Map, Value};

/// Removes a Markdown code fence wrapping the whole text, if there is one.
///
/// The opening fence may carry a `json` tag. Text that only contains a fence
/// somewhere in the middle is returned trimmed but otherwise untouched.
pub fn strip_code_blocks(s: &str) -> &str {
    let s = s.trim();
    let Some(body) = s.strip_prefix("```").and_then(|rest| rest.strip_suffix("```")) else {
        return s;
    };

    let body = match body.split_once('\n') {
        Some((tag, rest)) if is_fence_tag(tag) => rest,
        Some(_) => body,
        None => strip_tag_prefix(body),
    };
    body.trim()
}

fn is_fence_tag(tag: &str) -> bool {
    let tag = tag.trim();
    tag.is_empty() || tag.eq_ignore_ascii_case("json")
}

// Single-line fences: ```json {...}```
fn strip_tag_prefix(body: &str) -> &str {
    match body.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &body[4..],
        _ => body,
    }
}

/// Turns raw model output into a validated plan.
///
/// Malformed JSON is a `Format` error; JSON that parses but lacks or
/// mistypes plan fields is a `Schema` error listing every offending key.
pub fn normalize_and_validate(raw: &str) -> Result<CreativePlan, PlanError> {
    let clean_json = strip_code_blocks(raw);
    let parsed: Value = serde_json::from_str(clean_json).map_err(|source| PlanError::Format {
        raw_text: raw.to_string(),
        source,
    })?;
    validate_plan(parsed)
}

fn validate_plan(parsed: Value) -> Result<CreativePlan, PlanError> {
    let Some(object) = parsed.as_object() else {
        return Err(PlanError::Schema {
            missing_fields: Vec::new(),
            invalid_fields: vec!["<root> (expected a JSON object)".to_string()],
            parsed_json: parsed,
        });
    };

    let mut reader = FieldReader::new(object);
    let title = reader.required_text("title", &[]);
    let concept_summary = reader.required_text("concept_summary", &["conceptSummary"]);
    let hook = reader.required_text("hook", &[]);
    let visual_style = reader.required_text("visual_style", &["visualStyle"]);
    let tone = reader.required_text("tone", &[]);
    let scenes = reader.required_list("scene_ideas", &["scenes"]);
    let audience = reader.optional_text("audience", &[]);
    let characters = reader.optional_list("characters", &[]);
    let inspirations = reader.optional_list("inspirations", &[]);
    let dialogue_ideas = reader.optional_list("dialogue_ideas", &["dialogueIdeas"]);
    let soundtrack_style = reader.optional_text("soundtrack_style", &["soundtrackStyle"]);
    let foley_effects = reader.optional_list("foley_fx", &["foley_effects", "foleyEffects"]);
    let intended_platform = reader.optional_text("intended_platform", &["intendedPlatform"]);
    let hashtags = reader.optional_list("hashtags", &[]);

    let FieldReader { missing, invalid, .. } = reader;
    match (title, concept_summary, hook, visual_style, tone, scenes) {
        (Some(title), Some(concept_summary), Some(hook), Some(visual_style), Some(tone), Some(scenes))
            if missing.is_empty() && invalid.is_empty() =>
        {
            Ok(CreativePlan {
                title,
                concept_summary,
                hook,
                visual_style,
                tone,
                audience,
                scenes,
                characters,
                inspirations,
                dialogue_ideas,
                soundtrack_style,
                foley_effects,
                intended_platform,
                hashtags,
            })
        }
        _ => Err(PlanError::Schema {
            missing_fields: missing,
            invalid_fields: invalid,
            parsed_json: parsed,
        }),
    }
}

/// Pulls typed fields out of the parsed object, collecting every problem
/// instead of stopping at the first.
struct FieldReader<'a> {
    object: &'a Map<String, Value>,
    missing: Vec<String>,
    invalid: Vec<String>,
}

impl<'a> FieldReader<'a> {
    fn new(object: &'a Map<String, Value>) -> Self {
        Self {
            object,
            missing: Vec::new(),
            invalid: Vec::new(),
        }
    }

    /// Canonical key first, then aliases. `null` counts as absent.
    fn lookup(&self, key: &str, aliases: &[&str]) -> Option<&'a Value> {
        std::iter::once(key)
            .chain(aliases.iter().copied())
            .filter_map(|k| self.object.get(k))
            .find(|v| !v.is_null())
    }

    fn required_text(&mut self, key: &str, aliases: &[&str]) -> Option<String> {
        match self.lookup(key, aliases) {
            None => {
                self.missing.push(key.to_string());
                None
            }
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::String(_)) => {
                self.invalid.push(format!("{} (must not be empty)", key));
                None
            }
            Some(_) => {
                self.invalid.push(format!("{} (expected a string)", key));
                None
            }
        }
    }

    fn required_list(&mut self, key: &str, aliases: &[&str]) -> Option<Vec<String>> {
        match self.lookup(key, aliases) {
            None => {
                self.missing.push(key.to_string());
                None
            }
            Some(value) => {
                let items = self.string_list(key, value)?;
                if items.is_empty() {
                    self.invalid.push(format!("{} (must contain at least one entry)", key));
                    return None;
                }
                Some(items)
            }
        }
    }

    fn optional_text(&mut self, key: &str, aliases: &[&str]) -> Option<String> {
        match self.lookup(key, aliases)? {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.trim().to_string()),
            _ => {
                self.invalid.push(format!("{} (expected a string)", key));
                None
            }
        }
    }

    fn optional_list(&mut self, key: &str, aliases: &[&str]) -> Vec<String> {
        self.lookup(key, aliases)
            .and_then(|value| self.string_list(key, value))
            .unwrap_or_default()
    }

    fn string_list(&mut self, key: &str, value: &Value) -> Option<Vec<String>> {
        let Some(items) = value.as_array() else {
            self.invalid.push(format!("{} (expected a list of strings)", key));
            return None;
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item.as_str() {
                Some(s) if s.trim().is_empty() => {}
                Some(s) => out.push(s.trim().to_string()),
                None => {
                    self.invalid.push(format!("{} (expected a list of strings)", key));
                    return None;
                }
            }
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_PLAN: &str = r#"{
        "title": "Moon Bloom",
        "concept_summary": "An astronaut grows flowers in regolith.",
        "hook": "What smells like roses at 1/6 gravity?",
        "visual_style": "Pastel retro-futurism",
        "tone": "Whimsical",
        "audience": "Gen Z",
        "characters": ["Astronaut Ivy", "A curious rover"],
        "inspirations": ["Wes Anderson"],
        "dialogue_ideas": ["Fresh tulips, only 384,400 km away!"],
        "soundtrack_style": "Lo-fi synth",
        "foley_fx": ["helmet hiss", "soft crunch of dust"],
        "scene_ideas": ["Ivy plants a seed", "The rover sniffs a petal"],
        "intended_platform": "TikTok",
        "extra_key": {"ignored": true}
    }"#;

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(strip_code_blocks("json"), "json");
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("  ```json  \n  {}  \n  ```  "), "{}");
        assert_eq!(strip_code_blocks("```JSON\n[1]\n```"), "[1]");
        assert_eq!(strip_code_blocks("```json{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn test_strip_code_blocks_requires_both_fences() {
        assert_eq!(strip_code_blocks("```json\n{}"), "```json\n{}");
        assert_eq!(strip_code_blocks("{}\n```"), "{}\n```");
        assert_eq!(strip_code_blocks("```"), "```");
    }

    #[test]
    fn test_mid_content_fences_are_kept() {
        let text = "Here is your plan:\n```json\n{}\n```";
        assert_eq!(strip_code_blocks(text), text);
        assert!(normalize_and_validate(text).unwrap_err().is_format());
    }

    #[test]
    fn test_full_plan_validates() {
        let plan = normalize_and_validate(FULL_PLAN).unwrap();

        assert_eq!(plan.title(), "Moon Bloom");
        assert_eq!(plan.scenes().len(), 2);
        assert_eq!(plan.characters()[1], "A curious rover");
        assert_eq!(plan.foley_effects().len(), 2);
        assert_eq!(plan.soundtrack_style(), Some("Lo-fi synth"));
        assert_eq!(plan.intended_platform(), Some("TikTok"));
        assert!(plan.hashtags().is_empty());
    }

    #[test]
    fn test_fenced_round_trip_is_identity() {
        let plan = normalize_and_validate(FULL_PLAN).unwrap();
        let fenced = format!("```json\n{}\n```", plan.to_json_pretty().unwrap());

        assert_eq!(normalize_and_validate(&fenced).unwrap(), plan);
    }

    #[test]
    fn test_serialized_plan_is_revalidated_on_read() {
        let plan = normalize_and_validate(FULL_PLAN).unwrap();
        let mut value = serde_json::to_value(&plan).unwrap();
        value["scene_ideas"] = serde_json::json!([]);

        let err = normalize_and_validate(&value.to_string()).unwrap_err();
        match err {
            PlanError::Schema { invalid_fields, .. } => {
                assert_eq!(invalid_fields, vec!["scene_ideas (must contain at least one entry)"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_not_json_is_format_error() {
        let err = normalize_and_validate("not json").unwrap_err();
        assert!(err.is_format());
        assert!(!err.is_schema());
        match err {
            PlanError::Format { raw_text, .. } => assert_eq!(raw_text, "not json"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_title_only_names_every_missing_field() {
        let err = normalize_and_validate(r#"{"title":"x"}"#).unwrap_err();
        match err {
            PlanError::Schema { missing_fields, invalid_fields, parsed_json } => {
                assert_eq!(
                    missing_fields,
                    vec!["concept_summary", "hook", "visual_style", "tone", "scene_ideas"]
                );
                assert!(invalid_fields.is_empty());
                assert_eq!(parsed_json["title"], "x");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_empty_scenes_and_wrong_types_are_schema_errors() {
        let raw = r#"{
            "title": "T", "concept_summary": "C", "hook": 7,
            "visual_style": "V", "tone": "  ", "scene_ideas": [],
            "characters": "just one"
        }"#;
        match normalize_and_validate(raw).unwrap_err() {
            PlanError::Schema { missing_fields, invalid_fields, .. } => {
                assert!(missing_fields.is_empty());
                assert_eq!(
                    invalid_fields,
                    vec![
                        "hook (expected a string)",
                        "tone (must not be empty)",
                        "scene_ideas (must contain at least one entry)",
                        "characters (expected a list of strings)",
                    ]
                );
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_blank_scene_entries_do_not_count() {
        let raw = r#"{
            "title": "T", "concept_summary": "C", "hook": "H",
            "visual_style": "V", "tone": "dry", "scene_ideas": ["   ", ""]
        }"#;
        match normalize_and_validate(raw).unwrap_err() {
            PlanError::Schema { missing_fields, invalid_fields, .. } => {
                assert!(missing_fields.is_empty());
                assert_eq!(invalid_fields, vec!["scene_ideas (must contain at least one entry)"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let raw = r##"{
            "title": "T", "concept_summary": "C", "hook": "H", "visual_style": "V",
            "tone": "dry", "scene_ideas": [" Ivy waters a tulip ", "  "], "hashtags": ["", "#moon"]
        }"##;
        let plan = normalize_and_validate(raw).unwrap();
        assert_eq!(plan.scenes(), ["Ivy waters a tulip".to_string()]);
        assert_eq!(plan.hashtags(), ["#moon".to_string()]);
    }

    #[test]
    fn test_non_object_is_schema_error() {
        let err = normalize_and_validate("[1, 2, 3]").unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn test_aliases_and_nulls() {
        let raw = r#"{
            "title": "T", "conceptSummary": "C", "hook": "H", "visualStyle": "V",
            "tone": "dry", "scenes": ["s1"], "audience": null, "foleyEffects": ["clank"]
        }"#;
        let plan = normalize_and_validate(raw).unwrap();

        assert_eq!(plan.concept_summary(), "C");
        assert_eq!(plan.scenes(), ["s1".to_string()]);
        assert_eq!(plan.audience(), None);
        assert_eq!(plan.foley_effects(), ["clank".to_string()]);
    }
}
