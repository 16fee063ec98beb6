//! Event Queue (spec §4.5): a single-threaded cooperative FIFO that
//! serializes reducer application. `enqueue_event` drains synchronously
//! with respect to orchestrator state; recursive enqueues during a drain
//! append to the same pass instead of nesting a new one.

use crate::config::OrchestratorConfig;
use crate::orchestrator::effect::Effect;
use crate::orchestrator::event::Event;
use crate::orchestrator::reducer::reduce;
use crate::orchestrator::state::OrchestratorState;
use async_trait::async_trait;
use futures::FutureExt;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Executes the effects a single reducer call produced and returns any
/// events it could resolve synchronously (spec §4.2's sync-path contract).
/// Implementations must not let provider errors escape as panics; convert
/// them to `*_FAILED` events instead.
#[async_trait]
pub trait EffectSink: Send + Sync {
    async fn execute_effects(&self, effects: Vec<Effect>, now_ms: i64) -> Vec<Event>;
}

pub struct EventQueue<S: EffectSink> {
    config: OrchestratorConfig,
    state: Mutex<OrchestratorState>,
    pending: Mutex<VecDeque<(Event, i64)>>,
    draining: Mutex<bool>,
    sink: Arc<S>,
}

impl<S: EffectSink> EventQueue<S> {
    pub fn new(initial: OrchestratorState, config: OrchestratorConfig, sink: S) -> Self {
        Self::with_shared_sink(initial, config, Arc::new(sink))
    }

    /// Like `new`, but takes a sink the caller already holds an `Arc` to —
    /// needed when something outside the queue (an HTTP handler, say) must
    /// call through to the same sink instance directly.
    pub fn with_shared_sink(initial: OrchestratorState, config: OrchestratorConfig, sink: Arc<S>) -> Self {
        Self {
            config,
            state: Mutex::new(initial),
            pending: Mutex::new(VecDeque::new()),
            draining: Mutex::new(false),
            sink,
        }
    }

    pub fn snapshot(&self) -> OrchestratorState {
        self.state.lock().unwrap().clone()
    }

    /// Push `event` onto the queue and drain it, unless a drain from an
    /// earlier call on this call stack is already in progress.
    pub async fn enqueue_event(&self, event: Event, now_ms: i64) {
        self.pending.lock().unwrap().push_back((event, now_ms));

        {
            let mut draining = self.draining.lock().unwrap();
            if *draining {
                return;
            }
            *draining = true;
        }

        self.drain().await;
    }

    async fn drain(&self) {
        loop {
            let next = self.pending.lock().unwrap().pop_front();
            let Some((event, now_ms)) = next else {
                *self.draining.lock().unwrap() = false;
                return;
            };

            let effects = {
                let mut state = self.state.lock().unwrap();
                let (next_state, effects) = reduce(&state, &event, now_ms, &self.config);
                *state = next_state;
                effects
            };

            let outcome = std::panic::AssertUnwindSafe(self.sink.execute_effects(effects, now_ms))
                .catch_unwind()
                .await;
            let follow_up = match outcome {
                Ok(events) => events,
                Err(_) => {
                    tracing::error!(?event, "effect execution panicked; dropping this event's follow-ups");
                    Vec::new()
                }
            };

            let mut pending = self.pending.lock().unwrap();
            for ev in follow_up {
                pending.push_back((ev, now_ms));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::event::PttSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingSink {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EffectSink for RecordingSink {
        async fn execute_effects(&self, _effects: Vec<Effect>, _now_ms: i64) -> Vec<Event> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        }
    }

    #[tokio::test]
    async fn drains_single_event_and_updates_state() {
        let queue = EventQueue::new(
            OrchestratorState::initial(0),
            OrchestratorConfig { consent_timeout_ms: 30_000, inactivity_timeout_ms: 300_000 },
            RecordingSink { calls: AtomicUsize::new(0) },
        );
        queue.enqueue_event(Event::PttDown { source: PttSource::Kiosk }, 100).await;
        assert_eq!(queue.snapshot().phase, crate::orchestrator::state::Phase::Listening);
        assert_eq!(queue.sink.calls.load(Ordering::SeqCst), 1);
    }

    struct ChainingSink {
        stt_id: Mutex<Option<String>>,
    }

    #[async_trait]
    impl EffectSink for ChainingSink {
        async fn execute_effects(&self, effects: Vec<Effect>, _now_ms: i64) -> Vec<Event> {
            let mut out = Vec::new();
            for effect in effects {
                if let Effect::CallStt { id } = effect {
                    *self.stt_id.lock().unwrap() = Some(id.clone());
                    out.push(Event::SttResult { text: "hi".to_string(), id });
                }
            }
            out
        }
    }

    #[tokio::test]
    async fn follow_up_events_from_the_sink_drain_within_the_same_call() {
        let mut seed = OrchestratorState::initial(0);
        seed.phase = crate::orchestrator::state::Phase::Listening;
        seed.listening_source = Some(PttSource::Kiosk);

        let queue = EventQueue::new(
            seed,
            OrchestratorConfig { consent_timeout_ms: 30_000, inactivity_timeout_ms: 300_000 },
            ChainingSink { stt_id: Mutex::new(None) },
        );
        queue.enqueue_event(Event::PttUp { source: PttSource::Kiosk }, 200).await;
        assert_eq!(queue.snapshot().phase, crate::orchestrator::state::Phase::WaitingChat);
    }
}
