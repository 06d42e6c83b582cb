// src/llm/model_limits.rs
// Static model -> context-window table used by the summarizer to compute its
// input token budget. Unknown models fall back to a conservative default.

const DEFAULT_MAX_TOKENS: u32 = 2_048;

const MODEL_LIMITS: &[(&str, u32)] = &[
    ("gpt-4o", 128_000),
    ("gpt-4o-mini", 128_000),
    ("gpt-4-turbo", 128_000),
    ("gpt-3.5-turbo", 16_385),
    ("claude-3-5-sonnet", 200_000),
    ("claude-3-opus", 200_000),
    ("claude-3-haiku", 200_000),
];

/// Look up a model's max-token context window, falling back to 2,048.
pub fn max_tokens_for_model(model: &str) -> u32 {
    MODEL_LIMITS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, limit)| *limit)
        .unwrap_or(DEFAULT_MAX_TOKENS)
}
