pub enum AgentEvent {
    TextDelta(String),
    ThinkingDelta(String),
    /// Tool call started: (id, name, arguments)
    ToolCallStart(String, String, serde_json::Value),
    ToolCallResult(String, String, bool),
    CompactionStatus {
        before: usize,
        after: usize,
    },
    TokenUsage {
        used: usize,
        max: usize,
    },
    InputTokens(usize),
    OutputTokensDelta(usize),
    /// Provider-reported token usage (more accurate than local estimates).
    ProviderUsage {
        input_tokens: usize,
        output_tokens: usize,
    },
    /// Retry in progress: (reason, `delay_seconds`)
    Retry(String, u64),
    Finished(String),
    Error(String),
    /// The `session_before_compact` event chose to hand off instead of compacting.
    HandoffInstead,
}
