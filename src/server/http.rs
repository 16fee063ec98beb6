//! HTTP router (spec §4.11). Thin translation layer: parse the request,
//! turn it into an orchestrator event or a direct executor/store call,
//! let the core do the deciding.

use crate::config::KioskConfig;
use crate::executor::executor::Executor;
use crate::orchestrator::event::{ConsentAnswer, Event, PttSource};
use crate::orchestrator::queue::EventQueue;
use crate::server::auth::{cookie_header, issue_cookie, StaffAuth};
use crate::server::sse::{kiosk_sse_stream, staff_sse_stream, KioskBroadcaster, StaffBroadcaster};
use crate::server::static_files::web_assets_service;
use crate::store::SqliteStore;
use axum::extract::{Multipart, Path as AxumPath, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<EventQueue<Executor>>,
    pub executor: Arc<Executor>,
    pub store: Arc<SqliteStore>,
    pub kiosk_broadcaster: Arc<KioskBroadcaster>,
    pub staff_broadcaster: Arc<StaffBroadcaster>,
    pub staff_cookie_secret: Arc<String>,
    pub staff_session_ttl_ms: i64,
    pub sse_keepalive_interval_ms: u64,
}

/// Inbound wire events (spec §6's "Kiosk/Staff events → orchestrator
/// events" table). Bit-exact wire types on the `type` tag.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum InboundWireEvent {
    #[serde(rename = "KIOSK_PTT_DOWN")]
    KioskPttDown,
    #[serde(rename = "KIOSK_PTT_UP")]
    KioskPttUp,
    #[serde(rename = "UI_CONSENT_BUTTON")]
    UiConsentButton { answer: ConsentAnswer },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum StaffWireEvent {
    #[serde(rename = "STAFF_PTT_DOWN")]
    StaffPttDown,
    #[serde(rename = "STAFF_PTT_UP")]
    StaffPttUp,
    #[serde(rename = "STAFF_EMERGENCY_STOP")]
    StaffEmergencyStop,
    #[serde(rename = "STAFF_RESUME")]
    StaffResume,
    #[serde(rename = "STAFF_RESET_SESSION")]
    StaffResetSession,
}

impl From<InboundWireEvent> for Event {
    fn from(wire: InboundWireEvent) -> Self {
        match wire {
            InboundWireEvent::KioskPttDown => Event::PttDown { source: PttSource::Kiosk },
            InboundWireEvent::KioskPttUp => Event::PttUp { source: PttSource::Kiosk },
            InboundWireEvent::UiConsentButton { answer } => Event::UiConsentButton { answer },
        }
    }
}

impl From<StaffWireEvent> for Event {
    fn from(wire: StaffWireEvent) -> Self {
        match wire {
            StaffWireEvent::StaffPttDown => Event::PttDown { source: PttSource::Staff },
            StaffWireEvent::StaffPttUp => Event::PttUp { source: PttSource::Staff },
            StaffWireEvent::StaffEmergencyStop => Event::StaffEmergencyStop,
            StaffWireEvent::StaffResume => Event::StaffResume,
            StaffWireEvent::StaffResetSession => Event::StaffResetSession,
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn build_router(state: AppState, config: &KioskConfig) -> Router {
    Router::new()
        .route("/api/kiosk/event", post(kiosk_event))
        .route("/api/kiosk/ptt", post(kiosk_ptt_upload))
        .route("/api/kiosk/events", get(kiosk_events_sse))
        .route("/api/staff/login", post(staff_login))
        .route("/api/staff/event", post(staff_event))
        .route("/api/staff/events", get(staff_events_sse))
        .route("/api/staff/pending", get(staff_pending))
        .route("/api/staff/pending/{id}/confirm", post(staff_pending_confirm))
        .route("/api/staff/pending/{id}/deny", post(staff_pending_deny))
        .route("/api/tts", post(tts_synthesize))
        .fallback_service(web_assets_service(&config.server.static_dir))
        .with_state(state)
}

async fn kiosk_event(State(state): State<AppState>, Json(wire): Json<InboundWireEvent>) -> StatusCode {
    state.queue.enqueue_event(wire.into(), now_ms()).await;
    StatusCode::ACCEPTED
}

async fn staff_event(_auth: StaffAuth, State(state): State<AppState>, Json(wire): Json<StaffWireEvent>) -> StatusCode {
    state.queue.enqueue_event(wire.into(), now_ms()).await;
    StatusCode::ACCEPTED
}

async fn kiosk_ptt_upload(State(state): State<AppState>, mut multipart: Multipart) -> Result<StatusCode, (StatusCode, String)> {
    let mut wav_bytes: Option<Vec<u8>> = None;
    let mut mode = "default".to_string();

    while let Some(field) = multipart.next_field().await.map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))? {
        match field.name().unwrap_or_default() {
            "mode" => {
                mode = field.text().await.map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
            }
            _ => {
                let bytes = field.bytes().await.map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
                wav_bytes = Some(bytes.to_vec());
            }
        }
    }

    let wav = wav_bytes.ok_or((StatusCode::BAD_REQUEST, "missing audio field".to_string()))?;
    hound::WavReader::new(std::io::Cursor::new(&wav)).map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid WAV: {e}")))?;

    let stt_id = state
        .queue
        .snapshot()
        .in_flight
        .stt
        .ok_or((StatusCode::CONFLICT, "no STT request in flight".to_string()))?;

    state.executor.transcribe_stt(stt_id, mode, wav, now_ms());
    Ok(StatusCode::ACCEPTED)
}

async fn kiosk_events_sse(State(state): State<AppState>) -> impl IntoResponse {
    kiosk_sse_stream(state.kiosk_broadcaster.subscribe(), state.sse_keepalive_interval_ms)
}

async fn staff_events_sse(_auth: StaffAuth, State(state): State<AppState>) -> impl IntoResponse {
    staff_sse_stream(state.staff_broadcaster.subscribe(), state.sse_keepalive_interval_ms)
}

#[derive(Debug, Serialize)]
struct PendingResponse {
    memory: Vec<PendingMemoryView>,
    session_summaries: Vec<PendingSessionSummaryView>,
}

#[derive(Debug, Serialize)]
struct PendingMemoryView {
    id: String,
    kind: String,
    value: String,
    source_quote: Option<String>,
    created_at_ms: i64,
}

#[derive(Debug, Serialize)]
struct PendingSessionSummaryView {
    id: String,
    title: String,
    summary: String,
    topics: Vec<String>,
    staff_notes: Vec<String>,
    created_at_ms: i64,
}

async fn staff_pending(_auth: StaffAuth, State(state): State<AppState>) -> Result<Json<PendingResponse>, crate::error::KioskError> {
    let memory = state
        .store
        .list_pending_memory()
        .await?
        .into_iter()
        .map(|m| PendingMemoryView { id: m.id, kind: m.kind, value: m.value, source_quote: m.source_quote, created_at_ms: m.created_at_ms })
        .collect();
    let session_summaries = state
        .store
        .list_pending_session_summaries()
        .await?
        .into_iter()
        .map(|s| PendingSessionSummaryView {
            id: s.id,
            title: s.title,
            summary: s.summary,
            topics: s.topics,
            staff_notes: s.staff_notes,
            created_at_ms: s.created_at_ms,
        })
        .collect();
    Ok(Json(PendingResponse { memory, session_summaries }))
}

async fn staff_pending_confirm(
    _auth: StaffAuth,
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<StatusCode, crate::error::KioskError> {
    if state.store.confirm_pending_any(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

async fn staff_pending_deny(
    _auth: StaffAuth,
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<StatusCode, crate::error::KioskError> {
    if state.store.deny_pending_any(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

#[derive(Debug, Deserialize)]
struct StaffLoginRequest {
    #[allow(dead_code)]
    username: Option<String>,
}

async fn staff_login(State(state): State<AppState>, Json(_req): Json<StaffLoginRequest>) -> Response {
    let (_session, cookie_value) = issue_cookie(state.staff_cookie_secret.as_bytes(), now_ms(), state.staff_session_ttl_ms);
    let header_value = cookie_header(&cookie_value, state.staff_session_ttl_ms / 1000);
    (StatusCode::OK, [(header::SET_COOKIE, header_value)], Json(serde_json::json!({ "ok": true }))).into_response()
}

#[derive(Debug, Deserialize)]
struct TtsRequest {
    text: String,
}

async fn tts_synthesize(State(state): State<AppState>, Json(req): Json<TtsRequest>) -> Result<Response, crate::error::KioskError> {
    let wav = state.executor.synthesize(&req.text).await?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "audio/wav")], wav).into_response())
}
