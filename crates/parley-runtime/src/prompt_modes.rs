//! Reply modes and prompt template resolution.
//!
//! A mode is a set of overrides layered over the base placeholder table. The
//! resolved table is substituted into a `{{KEY}}` template; resolution fails
//! when a required key or template token is missing, or when any `{{...}}`
//! token survives substitution.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const BUILTIN_REPLY_TEMPLATE: &str = include_str!("../templates/reply-prompt.md");

pub const REQUIRED_PROMPT_KEYS: [&str; 8] = [
    "STANCE",
    "TONE",
    "MODE_SPECIFIC_GUIDANCE",
    "LENGTH_REQUIREMENT",
    "PHASE2_REQUIREMENTS",
    "PHASE3_REQUIREMENTS",
    "PHASE4_LENGTH_TARGET",
    "PHASE4_COUNTER_GUIDANCE",
];

pub type PromptTable = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Standard,
    Agree,
    Friendly,
    Dunk,
    FactCheck,
}

impl Mode {
    /// Listing order, from most to least agreeable.
    pub const UI_ORDER: [Mode; 5] = [
        Mode::Agree,
        Mode::Friendly,
        Mode::Standard,
        Mode::FactCheck,
        Mode::Dunk,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Standard => "standard",
            Mode::Agree => "agree",
            Mode::Friendly => "friendly",
            Mode::Dunk => "dunk",
            Mode::FactCheck => "fact_check",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        Mode::UI_ORDER
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "unsupported mode '{raw}' (expected one of: {})",
                    Mode::UI_ORDER
                        .iter()
                        .map(|mode| mode.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

/// Human-facing label for a mode.
pub fn mode_display_label(mode: Mode) -> &'static str {
    match mode {
        Mode::Agree => "Agree ✅",
        Mode::Friendly => "Friendly 🤝",
        Mode::Standard => "Standard 💼",
        Mode::FactCheck => "Fact Check 🔎",
        Mode::Dunk => "Dunk 🏀",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptTemplateError {
    #[error("prompt table is missing keys: {}", .0.join(", "))]
    MissingKeys(Vec<String>),
    #[error("prompt template is missing placeholders: {}", .0.join(", "))]
    MissingTokens(Vec<String>),
    #[error("prompt template has unresolved placeholders: {}", .0.join(", "))]
    UnresolvedTokens(Vec<String>),
}

fn table(entries: &[(&str, &str)]) -> PromptTable {
    entries
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect()
}

pub fn base_prompt_table() -> PromptTable {
    table(&[
        (
            "STANCE",
            "Take a politically conservative stance on the issue being argued. You're here to disagree and present a counter-perspective.",
        ),
        (
            "TONE",
            "STANDARD MODE: Be direct, fact-based, and to the point - think Ben Shapiro style. Present your conservative perspective with clarity and confidence. You're not here to be friendly, but you're also not overtly aggressive. State facts, make logical arguments, and directly challenge flawed reasoning. Use a matter-of-fact tone that says 'here's why you're wrong' without being unnecessarily combative. Be assertive and unapologetic about your position, but let the facts do the heavy lifting rather than personal attacks.",
        ),
        ("MODE_SPECIFIC_GUIDANCE", ""),
        (
            "LENGTH_REQUIREMENT",
            "LENGTH MATCHING IS MANDATORY: Your final comment MUST be approximately the same length as the comment you're responding to (the last comment in the chain). You may be 1-2 sentences longer, but NO MORE. This is about matching the effort level of the person you're responding to.",
        ),
        (
            "PHASE2_REQUIREMENTS",
            "Show your strategic thinking:\n- Analyze the opponent's last comment in detail\n- Identify their main claims, assumptions, and logical structure\n- Assess the strength of their argument and potential weaknesses\n- Consider how your research findings (if applicable) or logical reasoning can effectively counter their points\n- EXPLICITLY WRITE OUT your strategic analysis before moving to the next phase",
        ),
        (
            "PHASE3_REQUIREMENTS",
            "Show your counter-response predictions:\n- Identify ALL possible counter-responses the opponent might make to your reply\n- Assign probability weights (%) to EACH potential counter-response\n- List them out explicitly (e.g., \"Response A: 40%, Response B: 30%, Response C: 20%, Response D: 10%\")\n- Explain which high-probability responses you will preemptively address and HOW\n- SHOW ALL OF THIS ANALYSIS in your response before moving to the next phase",
        ),
        (
            "PHASE4_LENGTH_TARGET",
            "Set your target length: approximately the same length, or at most 1-2 sentences longer",
        ),
        (
            "PHASE4_COUNTER_GUIDANCE",
            "- Explain how you'll preemptively address the most likely counter-responses in each draft",
        ),
    ])
}

pub fn mode_overrides(mode: Mode) -> PromptTable {
    match mode {
        Mode::Standard => PromptTable::new(),
        Mode::Friendly => table(&[
            (
                "STANCE",
                "Take the most objective, well-reasoned position on the topic, regardless of whether it strictly aligns with conservative ideology. Your goal is to find common ground and contribute meaningfully to the discussion.",
            ),
            (
                "TONE",
                "FRIENDLY MODE: Use a warm, thoughtful, and genuinely respectful tone. You're here to share insights and engage in meaningful dialogue. Be personable and open-minded - like you're having a conversation with a friend over coffee. Focus on understanding their perspective while offering your own thoughtful take. Use phrases like 'That's an interesting point,' 'I can see where you're coming from,' 'Here's how I think about it,' or 'What if we considered...' Avoid any hint of confrontation or debate.",
            ),
        ]),
        Mode::Dunk => table(&[
            (
                "STANCE",
                "Take a politically conservative stance on the issue being argued. Your goal is to completely dismantle the opposing position.",
            ),
            (
                "TONE",
                "DUNK MODE ACTIVATED: Be ruthless, cutting, and mercilessly critical. Call out weak reasoning, expose logical fallacies by name, and demolish their argument piece by piece. Use sharp, incisive language that leaves no room for their position. Be unapologetically aggressive while staying factually grounded. The goal is to completely dismantle their argument and make them regret engaging. This is a debate, and you're here to win decisively.",
            ),
        ]),
        Mode::Agree => table(&[
            (
                "STANCE",
                "AGREE MODE: You are aligned with the final commenter. Reinforce their core points, add supporting context, and strengthen their position without undermining it.",
            ),
            (
                "TONE",
                "AGREE MODE TONE: Be encouraging, confident, and collaborative. Sound like a thoughtful ally who appreciates the original point and is eager to build on it with useful detail or personal insight.",
            ),
            (
                "MODE_SPECIFIC_GUIDANCE",
                "AGREE MODE DIRECTIVE: This is not a debate. Focus on amplifying and enhancing the final comment rather than arguing against anyone.",
            ),
            (
                "LENGTH_REQUIREMENT",
                "LENGTH FLEXIBILITY: Aim to match the length of the comment you're supporting, but you may go up to roughly 150% of its length if needed to add meaningful reinforcement or context.",
            ),
            (
                "PHASE2_REQUIREMENTS",
                "Agree mode is collaborative, so no strategic takedown is needed. Provide a brief note such as \"Strategic Analysis: N/A - Agree mode (reinforcing, not debating).\"",
            ),
            (
                "PHASE3_REQUIREMENTS",
                "Agree mode does not require anticipating counter-responses. Provide a note such as \"Counter-Response Prediction: N/A - Agree mode.\"",
            ),
            (
                "PHASE4_LENGTH_TARGET",
                "Set your target length to roughly match the original comment, with permission to go up to about 150% if that's helpful for reinforcement",
            ),
            (
                "PHASE4_COUNTER_GUIDANCE",
                "- Instead of counter-response planning, explain how each draft will reinforce and expand on the original comment while keeping the supportive tone consistent",
            ),
        ]),
        Mode::FactCheck => table(&[
            (
                "STANCE",
                "FACT CHECK MODE: Take no partisan side. Your job is to assess whether the factual claims in the final comment are accurate, misleading, or unsupported.",
            ),
            (
                "TONE",
                "FACT CHECK MODE TONE: Be neutral, precise, and calm. Quote the specific claim, state what the evidence shows, and acknowledge uncertainty where the record is unclear. Never mock the commenter.",
            ),
            (
                "MODE_SPECIFIC_GUIDANCE",
                "FACT CHECK DIRECTIVE: Address only checkable claims. Opinions and value judgments are out of scope; say so briefly if the comment contains no verifiable claim.",
            ),
            (
                "PHASE2_REQUIREMENTS",
                "List every factual claim in the final comment:\n- Quote each claim exactly\n- Rate it as accurate, misleading, false, or unverifiable\n- Name the kind of source that settles it (official statistics, court record, primary document)",
            ),
            (
                "PHASE3_REQUIREMENTS",
                "Anticipate how the commenter might dispute your assessment:\n- List the likely objections with probability weights (%)\n- Note which objections the final reply should preempt with a source or a caveat",
            ),
            (
                "PHASE4_COUNTER_GUIDANCE",
                "- Explain how each draft cites or describes evidence for every correction it makes",
            ),
        ]),
    }
}

fn placeholder_token(key: &str) -> String {
    format!("{{{{{key}}}}}")
}

fn leftover_placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("leftover placeholder pattern compiles")
    })
}

/// Layers `overrides` over `base` and substitutes the result into `template`.
pub fn compose_prompt(
    template: &str,
    base: &PromptTable,
    overrides: &PromptTable,
) -> Result<String, PromptTemplateError> {
    let mut resolved = base.clone();
    for (key, value) in overrides {
        resolved.insert(key.clone(), value.clone());
    }

    let missing_keys = REQUIRED_PROMPT_KEYS
        .iter()
        .filter(|key| !resolved.contains_key(**key))
        .map(|key| (*key).to_string())
        .collect::<Vec<_>>();
    if !missing_keys.is_empty() {
        return Err(PromptTemplateError::MissingKeys(missing_keys));
    }

    let missing_tokens = REQUIRED_PROMPT_KEYS
        .iter()
        .map(|key| placeholder_token(key))
        .filter(|token| !template.contains(token.as_str()))
        .collect::<Vec<_>>();
    if !missing_tokens.is_empty() {
        return Err(PromptTemplateError::MissingTokens(missing_tokens));
    }

    let mut prompt = template.to_string();
    for (key, value) in &resolved {
        prompt = prompt.replace(&placeholder_token(key), value);
    }

    let mut unresolved = leftover_placeholder_pattern()
        .captures_iter(&prompt)
        .filter_map(|captures| captures.get(1).map(|name| name.as_str().to_string()))
        .collect::<Vec<_>>();
    if !unresolved.is_empty() {
        unresolved.sort();
        unresolved.dedup();
        return Err(PromptTemplateError::UnresolvedTokens(unresolved));
    }
    Ok(prompt)
}

pub fn compose_mode_prompt(mode: Mode, template: &str) -> Result<String, PromptTemplateError> {
    compose_prompt(template, &base_prompt_table(), &mode_overrides(mode))
}

/// Resolves every mode against `template`; used as a startup check.
pub fn validate_all_modes(template: &str) -> Result<()> {
    for mode in Mode::UI_ORDER {
        compose_mode_prompt(mode, template)
            .with_context(|| format!("prompt template does not resolve for mode '{mode}'"))?;
    }
    Ok(())
}

/// Final generation prompt: resolved mode instructions followed by the thread.
pub fn compose_generation_prompt(mode_prompt: &str, thread_context: &str) -> String {
    format!(
        "{}\n\nTHREAD CONTEXT:\n\n{}",
        mode_prompt.trim_end(),
        thread_context.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::{
        base_prompt_table, compose_generation_prompt, compose_mode_prompt, compose_prompt,
        mode_display_label, mode_overrides, validate_all_modes, Mode, PromptTable,
        PromptTemplateError, BUILTIN_REPLY_TEMPLATE,
    };

    #[test]
    fn unit_every_mode_resolves_without_leftover_placeholders() {
        for mode in Mode::UI_ORDER {
            let prompt = compose_mode_prompt(mode, BUILTIN_REPLY_TEMPLATE).expect("resolve");
            assert!(!prompt.contains("{{"), "leftover placeholder in {mode}");
        }
        validate_all_modes(BUILTIN_REPLY_TEMPLATE).expect("validate");
    }

    #[test]
    fn functional_dunk_and_friendly_differ_in_stance_and_tone() {
        let dunk = compose_mode_prompt(Mode::Dunk, BUILTIN_REPLY_TEMPLATE).expect("dunk");
        let friendly =
            compose_mode_prompt(Mode::Friendly, BUILTIN_REPLY_TEMPLATE).expect("friendly");
        let standard =
            compose_mode_prompt(Mode::Standard, BUILTIN_REPLY_TEMPLATE).expect("standard");
        assert!(dunk.contains("dismantle"));
        assert!(!friendly.contains("dismantle"));
        assert_ne!(dunk, friendly);
        for mode in [Mode::Agree, Mode::Friendly, Mode::Dunk, Mode::FactCheck] {
            let prompt = compose_mode_prompt(mode, BUILTIN_REPLY_TEMPLATE).expect("resolve");
            assert_ne!(prompt, standard, "{mode} should change stance or tone");
        }
    }

    #[test]
    fn unit_overrides_replace_whole_values() {
        let base = base_prompt_table();
        let mut overrides = PromptTable::new();
        overrides.insert("TONE".to_string(), "short".to_string());
        let prompt = compose_prompt(BUILTIN_REPLY_TEMPLATE, &base, &overrides).expect("resolve");
        assert!(prompt.contains("TONE:\nshort\n"));
        assert!(!prompt.contains("Ben Shapiro"));
    }

    #[test]
    fn regression_missing_keys_are_named() {
        let mut base = base_prompt_table();
        base.remove("PHASE3_REQUIREMENTS");
        base.remove("TONE");
        let error = compose_prompt(BUILTIN_REPLY_TEMPLATE, &base, &PromptTable::new())
            .expect_err("missing keys");
        assert_eq!(
            error,
            PromptTemplateError::MissingKeys(vec![
                "TONE".to_string(),
                "PHASE3_REQUIREMENTS".to_string()
            ])
        );
    }

    #[test]
    fn regression_template_drift_is_rejected() {
        let missing = BUILTIN_REPLY_TEMPLATE.replace("{{PHASE4_LENGTH_TARGET}}", "");
        let error =
            compose_mode_prompt(Mode::Standard, &missing).expect_err("missing placeholder");
        assert!(matches!(error, PromptTemplateError::MissingTokens(ref tokens) if tokens == &["{{PHASE4_LENGTH_TARGET}}".to_string()]));

        let extra = format!("{BUILTIN_REPLY_TEMPLATE}\n{{{{AUDIENCE}}}} {{{{ AUDIENCE }}}}");
        let error = compose_mode_prompt(Mode::Standard, &extra).expect_err("unknown placeholder");
        assert_eq!(
            error,
            PromptTemplateError::UnresolvedTokens(vec!["AUDIENCE".to_string()])
        );
        assert!(validate_all_modes(&extra).is_err());
    }

    #[test]
    fn unit_mode_parsing_labels_and_order() {
        assert_eq!("fact-check".parse::<Mode>(), Ok(Mode::FactCheck));
        assert_eq!(" DUNK ".parse::<Mode>(), Ok(Mode::Dunk));
        assert!("snark".parse::<Mode>().is_err());
        assert_eq!(mode_display_label(Mode::Agree), "Agree ✅");
        assert_eq!(Mode::UI_ORDER[0], Mode::Agree);
        assert_eq!(Mode::default(), Mode::Standard);
        assert!(mode_overrides(Mode::Standard).is_empty());
    }

    #[test]
    fn unit_generation_prompt_appends_thread_context() {
        let prompt = compose_generation_prompt("Instructions\n", "REDDIT POST:\nop: T");
        assert_eq!(prompt, "Instructions\n\nTHREAD CONTEXT:\n\nREDDIT POST:\nop: T");
    }
}
