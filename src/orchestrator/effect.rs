//! Effects produced by the reducer (spec §4.1). Effects are a tagged union;
//! the executor dispatches on them with an exhaustive match.

use crate::orchestrator::event::ToolCall;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Mode {
    Room,
    Personal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallChatInput {
    pub session_buffer: Vec<(String, String)>,
    pub user_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum InnerTask {
    ConsentDecision { utterance: String },
    MemoryExtract { assistant_text: String },
    SessionSummary { messages: Vec<(String, String)> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Effect {
    KioskRecordStart,
    KioskRecordStop,

    CallStt { id: String },
    CallChat { id: String, input: CallChatInput },
    CallInnerTask { id: String, task: InnerTask },

    Say { text: String, chat_request_id: Option<String> },

    KioskToolCalls { tool_calls: Vec<ToolCall> },
    SetExpression { expression: String },
    PlayMotion { motion_id: String, instance_id: String },
    SetMode { mode: Mode },
    ShowConsentUi { visible: bool },

    StoreWritePending {
        kind: String,
        value: String,
        source_quote: Option<String>,
    },
    StoreWriteSessionSummaryPending {
        title: String,
        summary: String,
        topics: Vec<String>,
        staff_notes: Vec<String>,
    },
}
