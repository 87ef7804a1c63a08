//! Prompt builders for every model call the planner makes.
//!
//! All functions here are pure: same input, same prompt.

use crate::core::plan::MediaKind;

const PERSONA: &str = "You are a wildly creative short-form video concept generator.";

/// Field list shared by every prompt that asks for a plan object.
pub const PLAN_JSON_FIELDS: &str = "\
Respond ONLY in JSON format with the following fields:

- title: string
- concept_summary: string
- hook: string
- visual_style: string
- tone: string
- intended_platform: string
- audience: string
- characters: list of strings
- inspirations: list of strings (e.g., directors, genres, existing media)
- dialogue_ideas: list of strings (snippets or phrases)
- soundtrack_style: string
- foley_fx: list of sound design elements
- scene_ideas: list of short scene descriptions
";

const JSON_ONLY: &str = "\
Respond only with a single valid JSON object.
Do not include any explanations, headers, or commentary.
Do not wrap your answer in Markdown or backticks.
All string values (including those inside lists) must be enclosed in double quotes.";

/// Brief straight to plan JSON, used in single-shot mode.
pub fn single_shot_plan(brief: &str) -> String {
    format!(
        "{PERSONA}\n\n\
        Given the following user brief, generate a highly imaginative and vivid creative plan for a video idea.\n\
        The goal is to surprise, delight, and push boundaries of what's expected.\n\n\
        {PLAN_JSON_FIELDS}\n\
        User brief:\n\"\"\"{brief}\"\"\"\n\n\
        {JSON_ONLY}\n"
    )
}

pub fn essence(brief: &str) -> String {
    format!(
        "{PERSONA}\n\n\
        You are given the following user input:\n'{brief}'\n\n\
        Summarize this into a high-level creative concept (1-2 sentences). \
        Capture emotional tone, themes, or metaphors. Be abstract if needed.\n\n\
        Respond only with the summary, without any explanation or commentary."
    )
}

pub fn brainstorm(essence: &str, brief: &str) -> String {
    format!(
        "{PERSONA}\n\n\
        The concept is:\n'{essence}'\n\n\
        Brainstorm 5 completely different short-form video ideas based on this. \
        Each should be bizarre, cinematic, or emotionally provocative. Vary genre, setting, and tone.\n\
        Each idea should still relate to the original user prompt:\n'{brief}'\n\n\
        Respond only with the 5 ideas, without commentary, headers, or extra explanation."
    )
}

pub fn selection(brainstorm: &str) -> String {
    format!(
        "{PERSONA}\n\n\
        Here are the brainstormed ideas:\n{brainstorm}\n\n\
        Pick the most visually original idea and explain why in 2-3 sentences. \
        Prioritize uniqueness and visual impact.\n\n\
        Respond only with the chosen idea and justification: no intro, no conclusion, no labels."
    )
}

pub fn cinematic_line(selected_idea: &str) -> String {
    format!(
        "{PERSONA}\n\n\
        Based on the selected idea:\n{selected_idea}\n\n\
        Write a vivid, one-sentence short-form video prompt. Make it cinematic and unpredictable.\n\n\
        Respond only with the sentence: no preamble, no quotes, no additional commentary."
    )
}

pub fn story_expansion(cinematic_line: &str, brief: &str) -> String {
    format!(
        "{PERSONA}\n\n\
        Based on this vivid one-sentence prompt:\n{cinematic_line}\n\n\
        Expand the prompt into a full-blown, paragraph-long story synopsis with details, twists, \
        and visually-evocative descriptions.\n\
        Make sure it's still rooted in the original user input:\n'{brief}'\n\n\
        Respond only with the story paragraph: no labels, framing, or commentary."
    )
}

pub fn self_critique(story: &str, brief: &str) -> String {
    format!(
        "{PERSONA}\n\n\
        Review the following story for creativity and originality.\n\n\
        Story:\n{story}\n\n\
        To yourself, rate its creativity from 1 to 10. Can you think of any improvements that would \
        make it even more surprising, bold, or unexpected?\n\
        If so, revise it, but keep the length to one paragraph. Preserve visual richness and \
        connections to the user's original idea: '{brief}'.\n\n\
        Respond only with the revised story paragraph (or the original if no changes are needed).\n\
        Do not include critique, ratings, or any commentary: just the paragraph."
    )
}

pub fn plan_synthesis(final_story: &str) -> String {
    format!(
        "{PERSONA}\n\n\
        Given the following prompt, generate a highly imaginative and vivid creative plan for a video idea.\n\
        The goal is to surprise, delight, and push boundaries of what's expected.\n\n\
        {PLAN_JSON_FIELDS}\n\
        Prompt:\n\"\"\"{final_story}\"\"\"\n\n\
        {JSON_ONLY}\n"
    )
}

pub fn media_caption(kind: MediaKind) -> String {
    match kind {
        MediaKind::Image => "Describe this image creatively. Please keep your answer to a single paragraph. \
            Be sure to mention visual styles, emotions conveyed, and any other important info you can glean from the image."
            .to_string(),
        MediaKind::Video => "Describe this video creatively. Keep your answer to a single paragraph. \
            Mention the visuals, sounds, emotions, pacing, and anything else that would help inspire a short-form video idea."
            .to_string(),
    }
}

pub fn surprise_brief() -> String {
    "You are a highly original idea generator for weird and viral short-form videos. \
    You must avoid repeating themes or concepts across responses.\n\n\
    Generate a one-sentence brief for a bizarre, surprising, or surreal short-form video concept. \
    Do not use food-related themes. Avoid common tropes. Surprise me with something unexpected, \
    strange, or genre-defying. Be playful, absurd, or uncanny. Limit to 35 words. \
    No quotes, no explanation: just the brief."
        .to_string()
}
