//! Events consumed by the reducer (spec §4.1).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConsentAnswer {
    Yes,
    No,
}

/// Which front-end asserted a PTT event. A listening session started by
/// one source only ends when that same source releases (spec §4.1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PttSource {
    Kiosk,
    Staff,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub function_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Event {
    PttDown { source: PttSource },
    PttUp { source: PttSource },
    UiConsentButton { answer: ConsentAnswer },
    StaffResetSession,
    StaffEmergencyStop,
    StaffResume,

    SttResult { text: String, id: String },
    SttFailed { id: String },

    ChatResult {
        text: String,
        id: String,
        expression: String,
        motion_id: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    ChatFailed { id: String },

    InnerTaskResult { json: String, id: String },
    InnerTaskFailed { id: String },

    Tick,
}
