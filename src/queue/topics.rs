//! The fixed set of topics the fan-out (C5) and the router (C4) both know
//! about. A plain enum rather than stringly-typed topic names
//! everywhere, while `as_str()` is what actually hits the log table name.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    MessageTokenCount,
    MessageEmbedder,
    MessageSummarizer,
    MessageNer,
    MessageIntent,
    MessageSummaryEmbedder,
    MessageSummaryNer,
    DocumentEmbedder,
    /// Terminal sink for envelopes that exhausted their retry budget.
    PoisonQueue,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::MessageTokenCount => "message_token_count",
            Topic::MessageEmbedder => "message_embedder",
            Topic::MessageSummarizer => "message_summarizer",
            Topic::MessageNer => "message_ner",
            Topic::MessageIntent => "message_intent",
            Topic::MessageSummaryEmbedder => "message_summary_embedder",
            Topic::MessageSummaryNer => "message_summary_ner",
            Topic::DocumentEmbedder => "document_embedder",
            Topic::PoisonQueue => "poison_queue",
        }
    }

    pub const ALL_MESSAGE_TOPICS: [Topic; 5] = [
        Topic::MessageTokenCount,
        Topic::MessageEmbedder,
        Topic::MessageSummarizer,
        Topic::MessageNer,
        Topic::MessageIntent,
    ];
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
