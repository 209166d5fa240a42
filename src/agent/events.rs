use serde::{Deserialize, Serialize};

/// A structured item produced during a turn. Only `id` and `type` are
/// interpreted; every other field is carried through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThreadItem {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl ThreadItem {
    pub const AGENT_MESSAGE: &'static str = "agent_message";
    pub const REASONING: &'static str = "reasoning";

    pub fn text(&self) -> Option<&str> {
        self.fields.get("text").and_then(|v| v.as_str())
    }

    pub fn is_agent_message(&self) -> bool {
        self.kind == Self::AGENT_MESSAGE
    }

    pub fn is_reasoning(&self) -> bool {
        self.kind == Self::REASONING
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub cached_input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadError {
    pub message: String,
}

/// One line of the agent's JSONL event stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ThreadEvent {
    #[serde(rename = "thread.started")]
    ThreadStarted { thread_id: String },
    #[serde(rename = "turn.started")]
    TurnStarted,
    #[serde(rename = "turn.completed")]
    TurnCompleted {
        #[serde(default)]
        usage: Option<Usage>,
    },
    #[serde(rename = "turn.failed")]
    TurnFailed { error: ThreadError },

    #[serde(rename = "item.started")]
    ItemStarted { item: ThreadItem },
    #[serde(rename = "item.updated")]
    ItemUpdated { item: ThreadItem },
    #[serde(rename = "item.completed")]
    ItemCompleted { item: ThreadItem },

    #[serde(rename = "error")]
    Error { message: String },

    /// Event types this service does not know about yet.
    #[serde(other)]
    Unknown,
}

impl ThreadEvent {
    pub fn type_tag(&self) -> &'static str {
        match self {
            ThreadEvent::ThreadStarted { .. } => "thread.started",
            ThreadEvent::TurnStarted => "turn.started",
            ThreadEvent::TurnCompleted { .. } => "turn.completed",
            ThreadEvent::TurnFailed { .. } => "turn.failed",
            ThreadEvent::ItemStarted { .. } => "item.started",
            ThreadEvent::ItemUpdated { .. } => "item.updated",
            ThreadEvent::ItemCompleted { .. } => "item.completed",
            ThreadEvent::Error { .. } => "error",
            ThreadEvent::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_completed_keeps_unknown_fields() {
        let payload = r#"{"type":"item.completed","item":{"id":"cmd_1","type":"command_execution","command":"ls","exit_code":0,"status":"completed"}}"#;
        let event: ThreadEvent = serde_json::from_str(payload).unwrap();
        let ThreadEvent::ItemCompleted { item } = &event else {
            panic!("Expected ItemCompleted, got {:?}", event);
        };
        assert_eq!(item.kind, "command_execution");
        assert_eq!(item.fields["command"], "ls");

        let round: serde_json::Value = serde_json::to_value(&event).unwrap();
        let original: serde_json::Value = serde_json::from_str(payload).unwrap();
        assert_eq!(round, original);
    }

    #[test]
    fn test_agent_message_text() {
        let event: ThreadEvent = serde_json::from_str(
            r#"{"type":"item.completed","item":{"id":"m1","type":"agent_message","text":"done"}}"#,
        )
        .unwrap();
        let ThreadEvent::ItemCompleted { item } = event else {
            panic!("Expected ItemCompleted");
        };
        assert!(item.is_agent_message());
        assert_eq!(item.text(), Some("done"));
    }

    #[test]
    fn test_unit_and_unknown_events() {
        let started: ThreadEvent = serde_json::from_str(r#"{"type":"turn.started"}"#).unwrap();
        assert_eq!(started, ThreadEvent::TurnStarted);

        let unknown: ThreadEvent =
            serde_json::from_str(r#"{"type":"turn.duration","duration_ms":12}"#).unwrap();
        assert_eq!(unknown, ThreadEvent::Unknown);
    }

    #[test]
    fn test_turn_completed_without_usage() {
        let event: ThreadEvent = serde_json::from_str(r#"{"type":"turn.completed"}"#).unwrap();
        assert_eq!(event, ThreadEvent::TurnCompleted { usage: None });
        assert_eq!(event.type_tag(), "turn.completed");
    }
}
