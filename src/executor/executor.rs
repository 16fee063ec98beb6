//! Main effect dispatch (spec §4.2): translates reducer-produced effects
//! into provider calls, kiosk wire commands, and store writes.
//!
//! `CALL_CHAT`, `CALL_INNER_TASK`, and STT transcription are provider
//! round-trips that cannot resolve within a single `execute_effects` pass,
//! so they are spawned and report their outcome back into the event queue
//! asynchronously through `EventSink` rather than via that pass's return
//! value.

use crate::error::KioskError;
use crate::executor::correlation::StreamCorrelationTable;
use crate::executor::kiosk_command::{tool_calls_to_wire, KioskCommand, KioskCommandSink, MetricsObserver, TtfaObservation};
use crate::executor::providers::{ChatProvider, InnerTaskProvider, SttInput, SttProvider, TtsProvider};
use crate::executor::streaming::run_streaming_chat;
use crate::orchestrator::effect::{CallChatInput, Effect, InnerTask};
use crate::orchestrator::event::Event;
use crate::orchestrator::queue::EffectSink;
use crate::text::sentence_splitter::split_sentences;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use tokio::sync::Mutex as AsyncMutex;

/// Receives events resolved after a provider round-trip completes, i.e.
/// everything `execute_effects` couldn't hand back synchronously.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn enqueue_event(&self, event: Event, now_ms: i64);
}

#[async_trait]
impl<S: EffectSink> EventSink for crate::orchestrator::queue::EventQueue<S> {
    async fn enqueue_event(&self, event: Event, now_ms: i64) {
        crate::orchestrator::queue::EventQueue::enqueue_event(self, event, now_ms).await;
    }
}

/// Persists the consent/summary writes the reducer asks for. Kept separate
/// from the provider traits: this is storage, not an AI call.
#[async_trait]
pub trait StoreWriter: Send + Sync {
    async fn write_pending(&self, kind: String, value: String, source_quote: Option<String>);
    async fn write_session_summary_pending(
        &self,
        title: String,
        summary: String,
        topics: Vec<String>,
        staff_notes: Vec<String>,
    );
}

pub struct Executor {
    stt: Arc<dyn SttProvider>,
    chat: Arc<dyn ChatProvider>,
    inner_task: Arc<dyn InnerTaskProvider>,
    tts: Arc<dyn TtsProvider>,
    kiosk: Arc<dyn KioskCommandSink>,
    store: Arc<dyn StoreWriter>,
    correlation: Arc<StreamCorrelationTable>,
    metrics: Option<Arc<dyn MetricsObserver>>,
    say_seq: AtomicUsize,
    current_expression: AsyncMutex<String>,
    // Set once the queue that owns this executor exists — see
    // `bind_event_sink`. A Weak avoids an Executor <-> EventQueue cycle.
    event_sink: OnceLock<Weak<dyn EventSink>>,
}

impl Executor {
    pub fn new(
        stt: Arc<dyn SttProvider>,
        chat: Arc<dyn ChatProvider>,
        inner_task: Arc<dyn InnerTaskProvider>,
        tts: Arc<dyn TtsProvider>,
        kiosk: Arc<dyn KioskCommandSink>,
        store: Arc<dyn StoreWriter>,
        correlation: Arc<StreamCorrelationTable>,
        metrics: Option<Arc<dyn MetricsObserver>>,
    ) -> Self {
        Self {
            stt,
            chat,
            inner_task,
            tts,
            kiosk,
            store,
            correlation,
            metrics,
            say_seq: AtomicUsize::new(0),
            current_expression: AsyncMutex::new("neutral".to_string()),
            event_sink: OnceLock::new(),
        }
    }

    /// Must be called once, right after the `EventQueue` wrapping this
    /// executor is constructed, so spawned provider calls can report their
    /// outcome back in.
    pub fn bind_event_sink(&self, sink: Weak<dyn EventSink>) {
        let _ = self.event_sink.set(sink);
    }

    /// The HTTP upload handler's entry point once a WAV has fully arrived.
    /// Not reached via an effect: the reducer never holds audio bytes, so
    /// `Effect::CallStt` is only a marker that STT should be in flight.
    pub fn transcribe_stt(&self, id: String, mode: String, wav: Vec<u8>, now_ms: i64) {
        let stt = self.stt.clone();
        let event_sink = self.event_sink.get().cloned();
        tokio::spawn(async move {
            let event = match stt.transcribe(SttInput { mode, wav }).await {
                Ok(output) => Event::SttResult { text: output.text, id },
                Err(_) => Event::SttFailed { id },
            };
            notify(event_sink, event, now_ms).await;
        });
    }

    /// Delegated directly by the HTTP layer's audio-fetch route; not part
    /// of the effect pipeline.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, KioskError> {
        self.tts.synthesize(text).await
    }

    fn spawn_chat(&self, id: String, input: CallChatInput, now_ms: i64) {
        let chat = self.chat.clone();
        let kiosk = self.kiosk.clone();
        let correlation = self.correlation.clone();
        let metrics = self.metrics.clone();
        let event_sink = self.event_sink.get().cloned();
        tokio::spawn(async move {
            let event = run_streaming_chat(chat.as_ref(), input, id, now_ms, kiosk.as_ref(), correlation.as_ref(), metrics.as_deref()).await;
            notify(event_sink, event, now_ms).await;
        });
    }

    fn spawn_inner_task(&self, id: String, task: InnerTask, now_ms: i64) {
        let inner_task = self.inner_task.clone();
        let event_sink = self.event_sink.get().cloned();
        tokio::spawn(async move {
            let event = match inner_task.call(&task).await {
                Ok(json) => Event::InnerTaskResult { json, id },
                Err(_) => Event::InnerTaskFailed { id },
            };
            notify(event_sink, event, now_ms).await;
        });
    }

    /// spec §4.2 "SAY effect handling": probe the correlation table for a
    /// chat id the streamer already spoke; if absent (no stream emitted
    /// anything, or this reply never streamed), speak the whole text as
    /// sentence-aligned segments under the effective chat-id. The
    /// `kiosk.command.speak` caption/TTS command is always sent regardless.
    async fn handle_say(&self, text: String, chat_request_id: Option<String>, now_ms: i64) {
        let stream_already_handled = match &chat_request_id {
            Some(id) => self.correlation.delete(id, now_ms),
            None => false,
        };

        let utterance_id = format!("say-{}", self.say_seq.fetch_add(1, Ordering::SeqCst));
        let effective_id = chat_request_id.clone().unwrap_or_else(|| utterance_id.clone());

        if !stream_already_handled {
            let segments = split_sentences(&text);
            if !segments.is_empty() {
                self.kiosk
                    .send(KioskCommand::SpeechStart { utterance_id: effective_id.clone(), chat_request_id: Some(effective_id.clone()) })
                    .await;
                let last_index = segments.len() - 1;
                let first_segment_length = segments[0].chars().count();
                for (index, segment) in segments.into_iter().enumerate() {
                    self.kiosk
                        .send(KioskCommand::SpeechSegment {
                            utterance_id: effective_id.clone(),
                            chat_request_id: Some(effective_id.clone()),
                            segment_index: index,
                            text: segment,
                            is_last: index == last_index,
                        })
                        .await;
                }
                self.kiosk
                    .send(KioskCommand::SpeechEnd { utterance_id: effective_id.clone(), chat_request_id: Some(effective_id.clone()) })
                    .await;
                if let Some(observer) = &self.metrics {
                    observer.observe_ttfa(TtfaObservation {
                        emitted_at_ms: now_ms,
                        utterance_id: effective_id.clone(),
                        chat_request_id: Some(effective_id.clone()),
                        segment_count: last_index + 1,
                        first_segment_length,
                    });
                }
            } else {
                self.kiosk
                    .send(KioskCommand::SpeechStart { utterance_id: effective_id.clone(), chat_request_id: Some(effective_id.clone()) })
                    .await;
                self.kiosk
                    .send(KioskCommand::SpeechEnd { utterance_id: effective_id.clone(), chat_request_id: Some(effective_id.clone()) })
                    .await;
            }
        }

        let say_id = if stream_already_handled { effective_id } else { utterance_id };
        let expression = self.current_expression.lock().await.clone();
        self.kiosk.send(KioskCommand::Speak { say_id, text, expression: Some(expression) }).await;
    }
}

async fn notify(event_sink: Option<Weak<dyn EventSink>>, event: Event, now_ms: i64) {
    if let Some(sink) = event_sink.and_then(|weak| weak.upgrade()) {
        sink.enqueue_event(event, now_ms).await;
    }
}

#[async_trait]
impl EffectSink for Executor {
    async fn execute_effects(&self, effects: Vec<Effect>, now_ms: i64) -> Vec<Event> {
        for effect in effects {
            match effect {
                Effect::KioskRecordStart => self.kiosk.send(KioskCommand::RecordStart).await,
                Effect::KioskRecordStop => self.kiosk.send(KioskCommand::RecordStop { stt_request_id: None }).await,
                Effect::CallStt { id: _ } => {}
                Effect::CallChat { id, input } => self.spawn_chat(id, input, now_ms),
                Effect::CallInnerTask { id, task } => self.spawn_inner_task(id, task, now_ms),
                Effect::Say { text, chat_request_id } => self.handle_say(text, chat_request_id, now_ms).await,
                Effect::KioskToolCalls { tool_calls } => {
                    self.kiosk.send(KioskCommand::ToolCalls { tool_calls: tool_calls_to_wire(&tool_calls) }).await;
                }
                Effect::SetExpression { expression } => {
                    *self.current_expression.lock().await = expression;
                }
                Effect::PlayMotion { motion_id, instance_id } => {
                    self.kiosk.send(KioskCommand::PlayMotion { motion_id, motion_instance_id: instance_id }).await;
                }
                // Staff/session-facing concerns, not kiosk wire commands;
                // surfaced through the staff SSE stream instead.
                Effect::SetMode { mode: _ } => {}
                Effect::ShowConsentUi { visible: _ } => {}
                Effect::StoreWriteSessionSummaryPending { title, summary, topics, staff_notes } => {
                    self.store.write_session_summary_pending(title, summary, topics, staff_notes).await;
                }
                Effect::StoreWritePending { kind, value, source_quote } => {
                    self.store.write_pending(kind, value, source_quote).await;
                }
            }
        }
        Vec::new()
    }
}
