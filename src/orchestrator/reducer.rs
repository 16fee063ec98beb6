//! The pure Orchestrator Reducer (spec §4.1): `reduce(state, event, now_ms,
//! config) -> (next_state, effects[])`. No I/O, no clocks, no randomness —
//! every external observation arrives through `event` or `now_ms`.

use crate::config::OrchestratorConfig;
use crate::orchestrator::effect::{CallChatInput, Effect, InnerTask, Mode};
use crate::orchestrator::event::{ConsentAnswer, Event, PttSource, ToolCall};
use crate::orchestrator::state::{InFlight, MemoryCandidate, MemoryKind, OrchestratorState, Phase};
use crate::text::pii;
use serde::Deserialize;

const STT_FALLBACK: &str = "ごめんね、もう一回言ってね";
const CHAT_FALLBACK: &str = "ごめんね、もう一回言ってね";
const FORGET_CONSENT: &str = "さっきのことは忘れるね";
const CONSENT_PROMPT: &str = "覚えていい？";

const SUMMARY_FALLBACK_TITLE: &str = "要約";
const SUMMARY_FALLBACK_SUMMARY: &str = "要約を生成できませんでした。";

fn thinking_motion_id(chat_id: &str) -> String {
    format!("motion-{chat_id}-thinking")
}

fn reply_motion_id(chat_id: &str) -> String {
    format!("motion-{chat_id}")
}

/// `motion_id` allowlist: anything outside `{idle, greeting, cheer}` falls
/// back to `idle`. `thinking` is reserved for the pre-chat motion and is
/// never accepted here even if a provider forwards it verbatim.
fn normalize_motion_id(requested: Option<&str>) -> String {
    match requested {
        Some("greeting") => "greeting".to_string(),
        Some("cheer") => "cheer".to_string(),
        Some("idle") => "idle".to_string(),
        _ => "idle".to_string(),
    }
}

pub fn reduce(
    state: &OrchestratorState,
    event: &Event,
    now_ms: i64,
    config: &OrchestratorConfig,
) -> (OrchestratorState, Vec<Effect>) {
    if state.is_emergency_stopped && !matches!(event, Event::StaffResume) {
        return (state.clone(), Vec::new());
    }

    match event {
        Event::PttDown { source } => handle_ptt_down(state, *source, now_ms),
        Event::PttUp { source } => handle_ptt_up(state, *source, now_ms),
        Event::UiConsentButton { answer } => handle_consent_button(state, answer, now_ms),
        Event::StaffResetSession => handle_staff_reset_session(state, now_ms),
        Event::StaffEmergencyStop => handle_staff_emergency_stop(state, now_ms),
        Event::StaffResume => handle_staff_resume(state, now_ms),
        Event::SttResult { text, id } => handle_stt_result(state, text, id, now_ms),
        Event::SttFailed { id } => handle_stt_failed(state, id),
        Event::ChatResult {
            text,
            id,
            expression,
            motion_id,
            tool_calls,
        } => handle_chat_result(state, text, id, expression, motion_id.as_deref(), tool_calls, now_ms),
        Event::ChatFailed { id } => handle_chat_failed(state, id),
        Event::InnerTaskResult { json, id } => handle_inner_task_result(state, json, id, now_ms, config),
        Event::InnerTaskFailed { id } => handle_inner_task_failed(state, id),
        Event::Tick => handle_tick(state, now_ms, config),
    }
}

fn handle_ptt_down(state: &OrchestratorState, source: PttSource, now_ms: i64) -> (OrchestratorState, Vec<Effect>) {
    let mut next = state.clone();
    if source == PttSource::Kiosk {
        next.is_kiosk_ptt_held = true;
    }
    if matches!(next.phase, Phase::Idle | Phase::AskingConsent) {
        next.phase = Phase::Listening;
        next.listening_source = Some(source);
        next.last_action_at_ms = now_ms;
        return (next, vec![Effect::KioskRecordStart]);
    }
    (next, Vec::new())
}

fn handle_ptt_up(state: &OrchestratorState, source: PttSource, now_ms: i64) -> (OrchestratorState, Vec<Effect>) {
    let mut next = state.clone();
    if source == PttSource::Kiosk {
        next.is_kiosk_ptt_held = false;
    }
    if next.phase == Phase::Listening && next.listening_source == Some(source) {
        let id = next.mint_id("stt");
        next.in_flight.stt = Some(id.clone());
        next.phase = Phase::WaitingStt;
        next.listening_source = None;
        next.last_action_at_ms = now_ms;
        return (next, vec![Effect::KioskRecordStop, Effect::CallStt { id }]);
    }
    (next, Vec::new())
}

fn handle_stt_result(state: &OrchestratorState, text: &str, id: &str, now_ms: i64) -> (OrchestratorState, Vec<Effect>) {
    if state.phase != Phase::WaitingStt || state.in_flight.stt.as_deref() != Some(id) {
        return (state.clone(), Vec::new());
    }
    let mut next = state.clone();
    next.in_flight.stt = None;
    next.last_action_at_ms = now_ms;

    if next.consent_deadline_at_ms.is_some() {
        let inner_id = next.mint_id("inner");
        next.in_flight.consent_inner = Some(inner_id.clone());
        next.phase = Phase::WaitingInnerTask;
        return (
            next,
            vec![Effect::CallInnerTask {
                id: inner_id,
                task: InnerTask::ConsentDecision { utterance: text.to_string() },
            }],
        );
    }

    next.session_buffer.push("user", text);
    let chat_id = next.mint_id("chat");
    next.in_flight.chat = Some(chat_id.clone());
    next.phase = Phase::WaitingChat;
    let input = CallChatInput {
        session_buffer: next.session_buffer.messages().to_vec(),
        user_text: text.to_string(),
    };
    (
        next,
        vec![
            Effect::PlayMotion { motion_id: "thinking".to_string(), instance_id: thinking_motion_id(&chat_id) },
            Effect::CallChat { id: chat_id, input },
        ],
    )
}

fn handle_stt_failed(state: &OrchestratorState, id: &str) -> (OrchestratorState, Vec<Effect>) {
    if state.phase != Phase::WaitingStt || state.in_flight.stt.as_deref() != Some(id) {
        return (state.clone(), Vec::new());
    }
    let mut next = state.clone();
    next.in_flight.stt = None;
    next.phase = if next.consent_deadline_at_ms.is_some() { Phase::AskingConsent } else { Phase::Idle };
    (next, vec![Effect::Say { text: STT_FALLBACK.to_string(), chat_request_id: None }])
}

fn handle_chat_result(
    state: &OrchestratorState,
    text: &str,
    id: &str,
    expression: &str,
    motion_id: Option<&str>,
    tool_calls: &[ToolCall],
    now_ms: i64,
) -> (OrchestratorState, Vec<Effect>) {
    if state.phase != Phase::WaitingChat || state.in_flight.chat.as_deref() != Some(id) {
        return (state.clone(), Vec::new());
    }
    let mut next = state.clone();
    next.in_flight.chat = None;
    next.session_buffer.push("assistant", text);
    next.last_action_at_ms = now_ms;

    let mut effects = vec![
        Effect::SetExpression { expression: expression.to_string() },
        Effect::PlayMotion { motion_id: normalize_motion_id(motion_id), instance_id: reply_motion_id(id) },
    ];
    if !tool_calls.is_empty() {
        effects.push(Effect::KioskToolCalls { tool_calls: tool_calls.to_vec() });
    }
    effects.push(Effect::Say { text: text.to_string(), chat_request_id: Some(id.to_string()) });

    if next.mode == Mode::Personal && next.memory_candidate.is_none() {
        let inner_id = next.mint_id("inner");
        next.in_flight.memory_extract = Some(inner_id.clone());
        next.phase = Phase::WaitingInnerTask;
        effects.push(Effect::CallInnerTask {
            id: inner_id,
            task: InnerTask::MemoryExtract { assistant_text: text.to_string() },
        });
    } else {
        next.phase = Phase::Idle;
    }

    (next, effects)
}

fn handle_chat_failed(state: &OrchestratorState, id: &str) -> (OrchestratorState, Vec<Effect>) {
    if state.phase != Phase::WaitingChat || state.in_flight.chat.as_deref() != Some(id) {
        return (state.clone(), Vec::new());
    }
    let mut next = state.clone();
    next.in_flight.chat = None;
    next.phase = Phase::Idle;
    (
        next,
        vec![
            Effect::PlayMotion { motion_id: "idle".to_string(), instance_id: reply_motion_id(id) },
            Effect::Say { text: CHAT_FALLBACK.to_string(), chat_request_id: Some(id.to_string()) },
        ],
    )
}

fn handle_consent_button(state: &OrchestratorState, answer: &ConsentAnswer, now_ms: i64) -> (OrchestratorState, Vec<Effect>) {
    if state.phase == Phase::Listening {
        return (state.clone(), Vec::new());
    }
    let applies_here =
        state.phase == Phase::AskingConsent || (state.phase == Phase::WaitingInnerTask && state.in_flight.consent_inner.is_some());
    if !applies_here || state.memory_candidate.is_none() {
        return (state.clone(), Vec::new());
    }

    let mut next = state.clone();
    next.in_flight.consent_inner = None;
    next.consent_deadline_at_ms = None;
    next.last_action_at_ms = now_ms;

    let mut effects = Vec::new();
    match answer {
        ConsentAnswer::Yes => {
            if let Some(candidate) = next.memory_candidate.take() {
                effects.push(Effect::StoreWritePending {
                    kind: candidate.kind.as_str().to_string(),
                    value: pii::mask(&candidate.value),
                    source_quote: candidate.source_quote.as_deref().map(pii::mask),
                });
            }
        }
        ConsentAnswer::No => {
            next.memory_candidate = None;
        }
    }
    effects.push(Effect::ShowConsentUi { visible: false });
    next.phase = Phase::Idle;
    (next, effects)
}

fn reset_effects_and_state(state: &OrchestratorState, motion_instance_id: &str) -> (OrchestratorState, Vec<Effect>) {
    let mut next = state.clone();
    let was_listening = next.phase == Phase::Listening;
    next.mode = Mode::Room;
    next.personal_name = None;
    next.phase = Phase::Idle;
    next.listening_source = None;
    next.session_buffer.clear();
    next.memory_candidate = None;
    next.consent_deadline_at_ms = None;
    next.in_flight = InFlight::default();

    let mut effects = Vec::new();
    if was_listening {
        effects.push(Effect::KioskRecordStop);
    }
    effects.push(Effect::PlayMotion { motion_id: "idle".to_string(), instance_id: motion_instance_id.to_string() });
    effects.push(Effect::SetMode { mode: Mode::Room });
    effects.push(Effect::ShowConsentUi { visible: false });
    (next, effects)
}

fn handle_staff_emergency_stop(state: &OrchestratorState, now_ms: i64) -> (OrchestratorState, Vec<Effect>) {
    let (mut next, effects) = reset_effects_and_state(state, "motion-emergency-stop");
    next.is_emergency_stopped = true;
    next.last_action_at_ms = now_ms;
    (next, effects)
}

fn handle_staff_reset_session(state: &OrchestratorState, now_ms: i64) -> (OrchestratorState, Vec<Effect>) {
    let (mut next, effects) = reset_effects_and_state(state, "motion-reset-session");
    next.last_action_at_ms = now_ms;
    (next, effects)
}

fn handle_staff_resume(state: &OrchestratorState, now_ms: i64) -> (OrchestratorState, Vec<Effect>) {
    let (mut next, effects) = reset_effects_and_state(state, "motion-resume");
    next.is_emergency_stopped = false;
    next.last_action_at_ms = now_ms;
    (next, effects)
}

#[derive(Deserialize)]
struct ConsentDecisionPayload {
    decision: String,
}

#[derive(Deserialize, Default)]
struct MemoryExtractPayload {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    source_quote: Option<String>,
}

#[derive(Deserialize, Default)]
struct SessionSummaryPayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    staff_notes: Vec<String>,
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn normalize_field(value: Option<String>, max_chars: usize) -> String {
    let trimmed = value.unwrap_or_default();
    let collapsed = collapse_whitespace(trimmed.trim());
    truncate_chars(&pii::mask(&collapsed), max_chars)
}

fn clamp_list(items: Vec<String>, max_items: usize, max_chars: usize) -> Vec<String> {
    items
        .into_iter()
        .map(|s| truncate_chars(&pii::mask(&collapse_whitespace(s.trim())), max_chars))
        .filter(|s| !s.is_empty())
        .take(max_items)
        .collect()
}

/// Parse → clamp → validate a `session_summary` inner-task result, or
/// degrade to the fixed fallback DTO (spec §3) on any invalid shape.
fn normalize_session_summary(json: &str) -> (String, String, Vec<String>, Vec<String>) {
    let payload: SessionSummaryPayload = serde_json::from_str(json).unwrap_or_default();
    let title = normalize_field(payload.title, 60);
    let summary = normalize_field(payload.summary, 400);
    if title.is_empty() || summary.is_empty() {
        return (SUMMARY_FALLBACK_TITLE.to_string(), SUMMARY_FALLBACK_SUMMARY.to_string(), Vec::new(), Vec::new());
    }
    let topics = clamp_list(payload.topics, 5, 40);
    let staff_notes = clamp_list(payload.staff_notes, 5, 80);
    (title, summary, topics, staff_notes)
}

fn handle_inner_task_result(
    state: &OrchestratorState,
    json: &str,
    id: &str,
    now_ms: i64,
    config: &OrchestratorConfig,
) -> (OrchestratorState, Vec<Effect>) {
    let mut next = state.clone();

    if next.in_flight.consent_inner.as_deref() == Some(id) {
        next.in_flight.consent_inner = None;
        let decision = serde_json::from_str::<ConsentDecisionPayload>(json).ok().map(|p| p.decision);
        let mut effects = Vec::new();
        match decision.as_deref() {
            Some("yes") => {
                if let Some(candidate) = next.memory_candidate.take() {
                    effects.push(Effect::StoreWritePending {
                        kind: candidate.kind.as_str().to_string(),
                        value: pii::mask(&candidate.value),
                        source_quote: candidate.source_quote.as_deref().map(pii::mask),
                    });
                }
                effects.push(Effect::ShowConsentUi { visible: false });
                next.consent_deadline_at_ms = None;
                next.phase = Phase::Idle;
            }
            Some("no") => {
                next.memory_candidate = None;
                next.consent_deadline_at_ms = None;
                next.phase = Phase::Idle;
                effects.push(Effect::ShowConsentUi { visible: false });
            }
            _ => {
                next.phase = Phase::AskingConsent;
            }
        }
        return (next, effects);
    }

    if next.in_flight.memory_extract.as_deref() == Some(id) {
        next.in_flight.memory_extract = None;
        let parsed = serde_json::from_str::<MemoryExtractPayload>(json).ok();
        let candidate = parsed.and_then(|p| {
            let kind = MemoryKind::parse(p.kind.as_deref().unwrap_or(""))?;
            let value = p.value?.trim().to_string();
            if value.is_empty() {
                return None;
            }
            Some(MemoryCandidate { kind, value, source_quote: p.source_quote })
        });
        return match candidate {
            Some(c) => {
                next.memory_candidate = Some(c);
                next.consent_deadline_at_ms = Some(now_ms + config.consent_timeout_ms);
                next.phase = Phase::AskingConsent;
                (
                    next,
                    vec![
                        Effect::Say { text: CONSENT_PROMPT.to_string(), chat_request_id: None },
                        Effect::ShowConsentUi { visible: true },
                    ],
                )
            }
            None => {
                next.phase = Phase::Idle;
                (next, Vec::new())
            }
        };
    }

    if next.in_flight.session_summary.as_deref() == Some(id) {
        next.in_flight.session_summary = None;
        let (title, summary, topics, staff_notes) = normalize_session_summary(json);
        return (next, vec![Effect::StoreWriteSessionSummaryPending { title, summary, topics, staff_notes }]);
    }

    (state.clone(), Vec::new())
}

fn handle_inner_task_failed(state: &OrchestratorState, id: &str) -> (OrchestratorState, Vec<Effect>) {
    let mut next = state.clone();

    if next.in_flight.consent_inner.as_deref() == Some(id) {
        next.in_flight.consent_inner = None;
        next.phase = Phase::AskingConsent;
        return (next, Vec::new());
    }

    if next.in_flight.memory_extract.as_deref() == Some(id) {
        next.in_flight.memory_extract = None;
        next.phase = Phase::Idle;
        return (next, Vec::new());
    }

    if next.in_flight.session_summary.as_deref() == Some(id) {
        next.in_flight.session_summary = None;
        return (
            next,
            vec![Effect::StoreWriteSessionSummaryPending {
                title: SUMMARY_FALLBACK_TITLE.to_string(),
                summary: SUMMARY_FALLBACK_SUMMARY.to_string(),
                topics: Vec::new(),
                staff_notes: Vec::new(),
            }],
        );
    }

    (state.clone(), Vec::new())
}

fn handle_tick(state: &OrchestratorState, now_ms: i64, config: &OrchestratorConfig) -> (OrchestratorState, Vec<Effect>) {
    let mut next = state.clone();
    let mut effects = Vec::new();

    if let Some(deadline) = next.consent_deadline_at_ms {
        if now_ms >= deadline && next.phase != Phase::Listening {
            next.consent_deadline_at_ms = None;
            next.memory_candidate = None;
            next.in_flight.consent_inner = None;
            if matches!(next.phase, Phase::AskingConsent | Phase::WaitingInnerTask) {
                next.phase = Phase::Idle;
            }
            effects.push(Effect::Say { text: FORGET_CONSENT.to_string(), chat_request_id: None });
            effects.push(Effect::ShowConsentUi { visible: false });
        }
    }

    if next.phase == Phase::Idle
        && next.in_flight.session_summary.is_none()
        && now_ms - next.last_action_at_ms >= config.inactivity_timeout_ms
        && !next.session_buffer.is_empty()
    {
        let messages = next.session_buffer.messages().to_vec();
        let inner_id = next.mint_id("inner");
        next.in_flight.session_summary = Some(inner_id.clone());
        next.session_buffer.clear();
        effects.push(Effect::CallInnerTask { id: inner_id, task: InnerTask::SessionSummary { messages } });
    }

    (next, effects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::state::MemoryKind;

    fn config() -> OrchestratorConfig {
        OrchestratorConfig { consent_timeout_ms: 30_000, inactivity_timeout_ms: 300_000 }
    }

    #[test]
    fn reducer_is_deterministic_across_repeated_application() {
        let s0 = OrchestratorState::initial(0);
        let cfg = config();
        let (s1, e1) = reduce(&s0, &Event::PttDown { source: PttSource::Staff }, 100, &cfg);
        let (s1_again, e1_again) = reduce(&s0, &Event::PttDown { source: PttSource::Staff }, 100, &cfg);
        assert_eq!(s1, s1_again);
        assert_eq!(e1, e1_again);
    }

    #[test]
    fn invariants_hold_through_a_full_consent_cycle() {
        let cfg = config();
        let mut s = OrchestratorState::initial(0);
        s.mode = Mode::Personal;
        s.personal_name = Some("ひなた".to_string());
        s.phase = Phase::WaitingChat;
        s.in_flight.chat = Some("chat-1".to_string());
        assert!(s.invariants_hold());

        let (s, _) = reduce(
            &s,
            &Event::ChatResult {
                text: "いいね".to_string(),
                id: "chat-1".to_string(),
                expression: "neutral".to_string(),
                motion_id: None,
                tool_calls: vec![],
            },
            10,
            &cfg,
        );
        assert!(s.invariants_hold());
        assert_eq!(s.phase, Phase::WaitingInnerTask);

        let inner_id = s.in_flight.memory_extract.clone().unwrap();
        let json = r#"{"kind":"food","value":"いちご","source_quote":"いちごすき"}"#;
        let (s, _) = reduce(&s, &Event::InnerTaskResult { json: json.to_string(), id: inner_id }, 20, &cfg);
        assert!(s.invariants_hold());
        assert_eq!(s.phase, Phase::AskingConsent);
        assert!(s.memory_candidate.is_some());

        let (s, _) = reduce(&s, &Event::UiConsentButton { answer: ConsentAnswer::Yes }, 30, &cfg);
        assert!(s.invariants_hold());
        assert_eq!(s.phase, Phase::Idle);
        assert!(s.memory_candidate.is_none());
    }

    #[test]
    fn boundary_consent_timeout_fires_exactly_at_deadline() {
        let cfg = config();
        let mut s = OrchestratorState::initial(0);
        s.phase = Phase::AskingConsent;
        s.consent_deadline_at_ms = Some(1000);
        s.memory_candidate = Some(MemoryCandidate { kind: MemoryKind::Likes, value: "いちご".to_string(), source_quote: None });

        let (s, effects) = reduce(&s, &Event::Tick, 1000, &cfg);
        assert_eq!(s.phase, Phase::Idle);
        assert!(s.memory_candidate.is_none());
        assert_eq!(
            effects,
            vec![
                Effect::Say { text: FORGET_CONSENT.to_string(), chat_request_id: None },
                Effect::ShowConsentUi { visible: false },
            ]
        );
    }

    #[test]
    fn consent_timeout_does_not_fire_while_listening() {
        let cfg = config();
        let mut s = OrchestratorState::initial(0);
        s.phase = Phase::Listening;
        s.listening_source = Some(PttSource::Kiosk);
        s.consent_deadline_at_ms = Some(1000);
        s.memory_candidate = Some(MemoryCandidate { kind: MemoryKind::Likes, value: "いちご".to_string(), source_quote: None });

        let (s, effects) = reduce(&s, &Event::Tick, 1000, &cfg);
        assert_eq!(s.phase, Phase::Listening);
        assert!(s.memory_candidate.is_some());
        assert!(effects.is_empty());
    }

    #[test]
    fn boundary_inactivity_summary_dispatches_exactly_at_elapsed() {
        let cfg = config();
        let mut s = OrchestratorState::initial(0);
        s.session_buffer.push("user", "hello");
        s.last_action_at_ms = 0;

        let (s, effects) = reduce(&s, &Event::Tick, 300_000, &cfg);
        assert_eq!(effects.len(), 1);
        assert!(matches!(effects[0], Effect::CallInnerTask { task: InnerTask::SessionSummary { .. }, .. }));
        assert!(s.session_buffer.is_empty());
    }

    #[test]
    fn empty_session_buffer_never_dispatches_summary() {
        let cfg = config();
        let mut s = OrchestratorState::initial(0);
        s.last_action_at_ms = 0;
        let (_, effects) = reduce(&s, &Event::Tick, 1_000_000, &cfg);
        assert!(effects.is_empty());
    }

    // S1: PTT happy path in ROOM.
    #[test]
    fn scenario_s1_ptt_happy_path_room() {
        let cfg = config();
        let s0 = OrchestratorState::initial(0);

        let (s1, e1) = reduce(&s0, &Event::PttDown { source: PttSource::Staff }, 100, &cfg);
        assert_eq!(e1, vec![Effect::KioskRecordStart]);
        assert_eq!(s1.phase, Phase::Listening);

        let (s2, e2) = reduce(&s1, &Event::PttUp { source: PttSource::Staff }, 200, &cfg);
        assert_eq!(s2.phase, Phase::WaitingStt);
        let stt_id = s2.in_flight.stt.clone().unwrap();
        assert_eq!(e2, vec![Effect::KioskRecordStop, Effect::CallStt { id: stt_id.clone() }]);

        let (s3, e3) = reduce(
            &s2,
            &Event::SttResult { text: "こんにちは".to_string(), id: stt_id },
            210,
            &cfg,
        );
        assert_eq!(s3.phase, Phase::WaitingChat);
        let chat_id = s3.in_flight.chat.clone().unwrap();
        assert_eq!(
            e3,
            vec![
                Effect::PlayMotion { motion_id: "thinking".to_string(), instance_id: thinking_motion_id(&chat_id) },
                Effect::CallChat {
                    id: chat_id.clone(),
                    input: CallChatInput { session_buffer: vec![("user".to_string(), "こんにちは".to_string())], user_text: "こんにちは".to_string() },
                },
            ]
        );

        let (s4, e4) = reduce(
            &s3,
            &Event::ChatResult {
                text: "やあ".to_string(),
                id: chat_id.clone(),
                expression: "neutral".to_string(),
                motion_id: None,
                tool_calls: vec![],
            },
            220,
            &cfg,
        );
        assert_eq!(s4.phase, Phase::Idle);
        assert_eq!(
            e4,
            vec![
                Effect::SetExpression { expression: "neutral".to_string() },
                Effect::PlayMotion { motion_id: "idle".to_string(), instance_id: reply_motion_id(&chat_id) },
                Effect::Say { text: "やあ".to_string(), chat_request_id: Some(chat_id) },
            ]
        );
    }

    // S6: emergency stop then resume.
    #[test]
    fn scenario_s6_emergency_stop_then_resume() {
        let cfg = config();
        let mut s = OrchestratorState::initial(0);
        s.phase = Phase::Listening;
        s.listening_source = Some(PttSource::Kiosk);
        s.is_kiosk_ptt_held = true;

        let (s, effects) = reduce(&s, &Event::StaffEmergencyStop, 50, &cfg);
        assert!(s.is_emergency_stopped);
        assert_eq!(s.phase, Phase::Idle);
        assert_eq!(
            effects,
            vec![
                Effect::KioskRecordStop,
                Effect::PlayMotion { motion_id: "idle".to_string(), instance_id: "motion-emergency-stop".to_string() },
                Effect::SetMode { mode: Mode::Room },
                Effect::ShowConsentUi { visible: false },
            ]
        );

        let (s, dropped) = reduce(&s, &Event::PttDown { source: PttSource::Kiosk }, 60, &cfg);
        assert!(dropped.is_empty());
        assert!(s.is_emergency_stopped);

        let (s, effects) = reduce(&s, &Event::StaffResume, 70, &cfg);
        assert!(!s.is_emergency_stopped);
        assert_eq!(
            effects,
            vec![
                Effect::PlayMotion { motion_id: "idle".to_string(), instance_id: "motion-resume".to_string() },
                Effect::SetMode { mode: Mode::Room },
                Effect::ShowConsentUi { visible: false },
            ]
        );
    }

    #[test]
    fn stale_request_ids_are_ignored() {
        let cfg = config();
        let mut s = OrchestratorState::initial(0);
        s.phase = Phase::WaitingStt;
        s.in_flight.stt = Some("stt-1".to_string());
        let (next, effects) = reduce(&s, &Event::SttResult { text: "hi".to_string(), id: "stt-999".to_string() }, 10, &cfg);
        assert_eq!(next, s);
        assert!(effects.is_empty());
    }

    #[test]
    fn consent_button_ignored_while_listening() {
        let cfg = config();
        let mut s = OrchestratorState::initial(0);
        s.phase = Phase::Listening;
        s.listening_source = Some(PttSource::Kiosk);
        s.memory_candidate = Some(MemoryCandidate { kind: MemoryKind::Play, value: "ブロック".to_string(), source_quote: None });
        s.consent_deadline_at_ms = Some(5000);

        let (next, effects) = reduce(&s, &Event::UiConsentButton { answer: ConsentAnswer::Yes }, 10, &cfg);
        assert_eq!(next, s);
        assert!(effects.is_empty());
    }

    #[test]
    fn session_summary_parse_failure_degrades_to_fallback_dto() {
        let (title, summary, topics, staff_notes) = normalize_session_summary("not json");
        assert_eq!(title, SUMMARY_FALLBACK_TITLE);
        assert_eq!(summary, SUMMARY_FALLBACK_SUMMARY);
        assert!(topics.is_empty());
        assert!(staff_notes.is_empty());
    }

    #[test]
    fn session_summary_dto_parse_clamp_revalidate_is_idempotent() {
        let json = r#"{"title":"today","summary":"we played blocks","topics":["blocks","lego"],"staff_notes":["happy"]}"#;
        let first = normalize_session_summary(json);
        let re_encoded = serde_json::json!({
            "title": first.0,
            "summary": first.1,
            "topics": first.2,
            "staff_notes": first.3,
        })
        .to_string();
        let second = normalize_session_summary(&re_encoded);
        assert_eq!(first, second);
    }
}
