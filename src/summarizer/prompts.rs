// src/summarizer/prompts.rs
// One rolling-summary prompt per LLM family, following
// `backend/src/prompt/internal.rs`'s `pub mod summarization { pub const ... }`
// layout. A template is valid only if it carries both substitution tokens.

use crate::config::llm::LlmFamily;

pub const PREVIOUS_SUMMARY_TOKEN: &str = "{previous-summary}";
pub const JOINED_MESSAGES_TOKEN: &str = "{joined-messages}";

pub mod summarization {
    pub const OPENAI: &str = "\
You maintain a running summary of a conversation. Fold the new messages \
below into the existing summary, keeping it concise while preserving \
important facts, decisions, and open questions.

Existing summary:
{previous-summary}

New messages:
{joined-messages}

Write the updated summary.";

    pub const ANTHROPIC: &str = "\
Here is the summary of our conversation so far:

{previous-summary}

Here are new messages to fold in:

{joined-messages}

Produce an updated summary. Stay concise and keep every fact that still matters.";
}

pub fn default_prompt(family: LlmFamily) -> &'static str {
    match family {
        LlmFamily::OpenAi => summarization::OPENAI,
        LlmFamily::Anthropic => summarization::ANTHROPIC,
    }
}

/// A prompt template is valid only if it contains both substitution tokens.
pub fn validate_prompt_template(template: &str) -> Result<(), String> {
    let has_previous = template.contains(PREVIOUS_SUMMARY_TOKEN);
    let has_joined = template.contains(JOINED_MESSAGES_TOKEN);
    if has_previous && has_joined {
        Ok(())
    } else {
        Err(format!(
            "prompt template must contain both {PREVIOUS_SUMMARY_TOKEN} and {JOINED_MESSAGES_TOKEN}"
        ))
    }
}

/// Fills a validated template with the running summary and joined message text.
pub fn render(template: &str, previous_summary: &str, joined_messages: &str) -> String {
    template
        .replace(PREVIOUS_SUMMARY_TOKEN, previous_summary)
        .replace(JOINED_MESSAGES_TOKEN, joined_messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_prompts_are_valid() {
        assert!(validate_prompt_template(summarization::OPENAI).is_ok());
        assert!(validate_prompt_template(summarization::ANTHROPIC).is_ok());
    }

    #[test]
    fn rejects_template_missing_a_token() {
        assert!(validate_prompt_template("just {previous-summary}, no other token").is_err());
        assert!(validate_prompt_template("no tokens at all").is_err());
    }

    #[test]
    fn render_substitutes_both_tokens() {
        let out = render(summarization::OPENAI, "prior text", "user: hi");
        assert!(out.contains("prior text"));
        assert!(out.contains("user: hi"));
        assert!(!out.contains(PREVIOUS_SUMMARY_TOKEN));
        assert!(!out.contains(JOINED_MESSAGES_TOKEN));
    }
}
