//! Outbound kiosk commands (spec §6) — names are bit-exact on the wire.
//! `KioskCommandSink` is the fan-out point; the SSE layer (not built here)
//! is the concrete subscriber set.

use crate::orchestrator::event::ToolCall;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum KioskCommand {
    #[serde(rename = "kiosk.command.record_start")]
    RecordStart,
    #[serde(rename = "kiosk.command.record_stop")]
    RecordStop { stt_request_id: Option<String> },
    #[serde(rename = "kiosk.command.speech.start")]
    SpeechStart { utterance_id: String, chat_request_id: Option<String> },
    #[serde(rename = "kiosk.command.speech.segment")]
    SpeechSegment {
        utterance_id: String,
        chat_request_id: Option<String>,
        segment_index: usize,
        text: String,
        is_last: bool,
    },
    #[serde(rename = "kiosk.command.speech.end")]
    SpeechEnd { utterance_id: String, chat_request_id: Option<String> },
    #[serde(rename = "kiosk.command.speak")]
    Speak { say_id: String, text: String, expression: Option<String> },
    #[serde(rename = "kiosk.command.play_motion")]
    PlayMotion { motion_id: String, motion_instance_id: String },
    #[serde(rename = "kiosk.command.tool_calls")]
    ToolCalls { tool_calls: Vec<ToolCallWire> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallWire {
    pub id: String,
    pub function: FunctionNameWire,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionNameWire {
    pub name: String,
}

pub fn tool_calls_to_wire(tool_calls: &[ToolCall]) -> Vec<ToolCallWire> {
    tool_calls
        .iter()
        .map(|t| ToolCallWire { id: t.id.clone(), function: FunctionNameWire { name: t.function_name.clone() } })
        .collect()
}

#[async_trait]
pub trait KioskCommandSink: Send + Sync {
    async fn send(&self, command: KioskCommand);
}

/// A TTFA (time-to-first-audio) observation; text is deliberately omitted
/// (spec §4.2) so metric observers never see user/assistant content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TtfaObservation {
    pub emitted_at_ms: i64,
    pub utterance_id: String,
    pub chat_request_id: Option<String>,
    pub segment_count: usize,
    pub first_segment_length: usize,
}

pub trait MetricsObserver: Send + Sync {
    fn observe_ttfa(&self, observation: TtfaObservation);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_calls_drop_arguments_on_the_wire() {
        let wire = tool_calls_to_wire(&[ToolCall { id: "call-1".to_string(), function_name: "set_timer".to_string() }]);
        assert_eq!(wire, vec![ToolCallWire { id: "call-1".to_string(), function: FunctionNameWire { name: "set_timer".to_string() } }]);
    }

    #[test]
    fn command_serializes_with_tagged_type_field() {
        let cmd = KioskCommand::PlayMotion { motion_id: "idle".to_string(), motion_instance_id: "motion-chat-1".to_string() };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "kiosk.command.play_motion");
        assert_eq!(json["motion_id"], "idle");
    }
}
