/// Events emitted during a model turn, per §4.4.4.1 (Design Note §9's
/// "Event iterator → typed channel").
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Incremental text content from the model.
    TextDelta { text: String },

    /// Model wants to call a tool.
    ToolUse {
        id: String,
        name: String,
        args: serde_json::Value,
    },

    /// Result of a tool call the runtime has already executed.
    ToolResult {
        id: String,
        name: String,
        content: String,
        is_error: bool,
    },

    /// Turn completed successfully.
    Done { stop_reason: String },

    /// Error during the turn.
    Error { message: String },
}
