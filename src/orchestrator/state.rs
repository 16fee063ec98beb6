//! Orchestrator state (spec §3): an immutable snapshot between events.

use crate::orchestrator::effect::Mode;
use crate::orchestrator::event::PttSource;
use crate::orchestrator::session_buffer::SessionBuffer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Listening,
    WaitingStt,
    WaitingChat,
    AskingConsent,
    WaitingInnerTask,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MemoryKind {
    Likes,
    Food,
    Play,
    Hobby,
}

impl MemoryKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "likes" => Some(MemoryKind::Likes),
            "food" => Some(MemoryKind::Food),
            "play" => Some(MemoryKind::Play),
            "hobby" => Some(MemoryKind::Hobby),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Likes => "likes",
            MemoryKind::Food => "food",
            MemoryKind::Play => "play",
            MemoryKind::Hobby => "hobby",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryCandidate {
    pub kind: MemoryKind,
    pub value: String,
    pub source_quote: Option<String>,
}

/// At most one outstanding request id per async operation slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InFlight {
    pub stt: Option<String>,
    pub chat: Option<String>,
    pub consent_inner: Option<String>,
    pub memory_extract: Option<String>,
    pub session_summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestratorState {
    pub mode: Mode,
    pub personal_name: Option<String>,
    pub phase: Phase,
    pub last_action_at_ms: i64,
    pub session_buffer: SessionBuffer,
    pub consent_deadline_at_ms: Option<i64>,
    pub memory_candidate: Option<MemoryCandidate>,
    pub in_flight: InFlight,
    pub is_emergency_stopped: bool,
    pub is_kiosk_ptt_held: bool,
    pub listening_source: Option<PttSource>,
    pub request_seq: u64,
}

impl OrchestratorState {
    pub fn initial(now_ms: i64) -> Self {
        Self {
            mode: Mode::Room,
            personal_name: None,
            phase: Phase::Idle,
            last_action_at_ms: now_ms,
            session_buffer: SessionBuffer::new(),
            consent_deadline_at_ms: None,
            memory_candidate: None,
            in_flight: InFlight::default(),
            is_emergency_stopped: false,
            is_kiosk_ptt_held: false,
            listening_source: None,
            request_seq: 0,
        }
    }

    /// Mint a new unique request id `{prefix}-{n}`, bumping `request_seq`.
    pub fn mint_id(&mut self, prefix: &str) -> String {
        self.request_seq += 1;
        format!("{prefix}-{}", self.request_seq)
    }

    pub fn invariants_hold(&self) -> bool {
        let consent_pair_ok =
            self.consent_deadline_at_ms.is_some() == self.memory_candidate.is_some();
        let personal_name_ok = (self.mode == Mode::Personal) == self.personal_name.is_some();
        consent_pair_ok && personal_name_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_satisfies_invariants() {
        let s = OrchestratorState::initial(0);
        assert!(s.invariants_hold());
        assert_eq!(s.phase, Phase::Idle);
    }

    #[test]
    fn mint_id_is_monotonic_and_unique() {
        let mut s = OrchestratorState::initial(0);
        let a = s.mint_id("stt");
        let b = s.mint_id("stt");
        assert_ne!(a, b);
        assert_eq!(a, "stt-1");
        assert_eq!(b, "stt-2");
    }

    #[test]
    fn memory_kind_rejects_unknown_strings() {
        assert!(MemoryKind::parse("likes").is_some());
        assert!(MemoryKind::parse("prototype-name-like").is_none());
    }
}
