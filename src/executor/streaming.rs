//! The streaming coordinator (spec §4.2, "the hardest sub-part"). Runs a
//! chat provider's non-streaming call and its optional streaming call
//! concurrently, emitting sentence-aligned speech segments as they become
//! available while still producing a single authoritative `CHAT_RESULT`
//! (or `CHAT_FAILED`) from the non-streaming call.

use crate::error::KioskError;
use crate::executor::correlation::StreamCorrelationTable;
use crate::executor::kiosk_command::{KioskCommand, KioskCommandSink, MetricsObserver, TtfaObservation};
use crate::executor::providers::ChatProvider;
use crate::orchestrator::effect::CallChatInput;
use crate::orchestrator::event::Event;
use crate::text::sentence_splitter::{extract_complete_sentence_prefix, split_sentences};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::Notify;

pub async fn run_streaming_chat(
    provider: &dyn ChatProvider,
    input: CallChatInput,
    chat_id: String,
    now_ms: i64,
    kiosk: &dyn KioskCommandSink,
    correlation: &StreamCorrelationTable,
    metrics: Option<&dyn MetricsObserver>,
) -> Event {
    let Some(mut stream) = provider.stream(&input) else {
        return run_call_only(provider, &input, chat_id).await;
    };

    let call_fut = provider.call(&input);
    tokio::pin!(call_fut);

    let gate = Notify::new();
    let mut buffer = String::new();
    let mut started = false;
    // One segment of lookahead so the *actual* final segment can carry
    // is_last=true instead of guessing at emission time.
    let mut pending: Option<(usize, String)> = None;
    let mut emitted_count = 0usize;
    let mut first_segment_length = 0usize;
    let mut stream_done = false;
    let mut call_result: Option<Result<crate::executor::providers::ChatOutput, KioskError>> = None;

    loop {
        if call_result.is_some() && (emitted_count == 0 || stream_done) {
            break;
        }

        tokio::select! {
            res = &mut call_fut, if call_result.is_none() => {
                call_result = Some(res);
                // Give the stream a microscopic window to land its first
                // segment so finalization can't observably preempt it.
                let _ = tokio::time::timeout(Duration::from_millis(0), gate.notified()).await;
            }
            maybe_delta = stream.next(), if !stream_done => {
                match maybe_delta {
                    None => stream_done = true,
                    Some(delta) if delta.is_empty() => {}
                    Some(delta) => {
                        buffer.push_str(&delta);
                        let (complete, rest) = extract_complete_sentence_prefix(&buffer);
                        buffer = rest;
                        if !complete.is_empty() {
                            if !started {
                                kiosk
                                    .send(KioskCommand::SpeechStart { utterance_id: chat_id.clone(), chat_request_id: Some(chat_id.clone()) })
                                    .await;
                                started = true;
                            }
                            for segment in split_sentences(&complete) {
                                if let Some((prev_idx, prev_text)) = pending.take() {
                                    emit_segment(kiosk, &chat_id, prev_idx, prev_text, false).await;
                                }
                                if emitted_count == 0 {
                                    first_segment_length = segment.chars().count();
                                    gate.notify_waiters();
                                }
                                pending = Some((emitted_count, segment));
                                emitted_count += 1;
                            }
                        }
                    }
                }
            }
        }
    }

    if emitted_count > 0 {
        let tail = buffer.trim();
        if !tail.is_empty() {
            for segment in split_sentences(tail) {
                if let Some((prev_idx, prev_text)) = pending.take() {
                    emit_segment(kiosk, &chat_id, prev_idx, prev_text, false).await;
                }
                pending = Some((emitted_count, segment));
                emitted_count += 1;
            }
        }
    }
    if let Some((idx, text)) = pending.take() {
        emit_segment(kiosk, &chat_id, idx, text, true).await;
    }

    if started {
        kiosk
            .send(KioskCommand::SpeechEnd { utterance_id: chat_id.clone(), chat_request_id: Some(chat_id.clone()) })
            .await;
        if emitted_count > 0 {
            correlation.set(&chat_id, now_ms);
            if let Some(observer) = metrics {
                observer.observe_ttfa(TtfaObservation {
                    emitted_at_ms: now_ms,
                    utterance_id: chat_id.clone(),
                    chat_request_id: Some(chat_id.clone()),
                    segment_count: emitted_count,
                    first_segment_length,
                });
            }
        }
    }

    match call_result.expect("call future resolves before the loop can exit") {
        Ok(output) => Event::ChatResult {
            text: output.assistant_text,
            id: chat_id,
            expression: output.expression,
            motion_id: output.motion_id,
            tool_calls: output.tool_calls,
        },
        Err(_) => Event::ChatFailed { id: chat_id },
    }
}

async fn emit_segment(kiosk: &dyn KioskCommandSink, chat_id: &str, index: usize, text: String, is_last: bool) {
    kiosk
        .send(KioskCommand::SpeechSegment {
            utterance_id: chat_id.to_string(),
            chat_request_id: Some(chat_id.to_string()),
            segment_index: index,
            text,
            is_last,
        })
        .await;
}

async fn run_call_only(provider: &dyn ChatProvider, input: &CallChatInput, chat_id: String) -> Event {
    match provider.call(input).await {
        Ok(output) => Event::ChatResult {
            text: output.assistant_text,
            id: chat_id,
            expression: output.expression,
            motion_id: output.motion_id,
            tool_calls: output.tool_calls,
        },
        Err(_) => Event::ChatFailed { id: chat_id },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::providers::ChatDeltaStream;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Mutex;

    struct FakeChatProvider {
        deltas: Vec<&'static str>,
        final_text: &'static str,
        delay_before_final_ms: u64,
    }

    #[async_trait]
    impl ChatProvider for FakeChatProvider {
        async fn call(&self, _input: &CallChatInput) -> Result<crate::executor::providers::ChatOutput, KioskError> {
            tokio::time::sleep(Duration::from_millis(self.delay_before_final_ms)).await;
            Ok(crate::executor::providers::ChatOutput {
                assistant_text: self.final_text.to_string(),
                expression: "neutral".to_string(),
                motion_id: None,
                tool_calls: vec![],
            })
        }

        fn stream(&self, _input: &CallChatInput) -> Option<ChatDeltaStream> {
            let deltas: Vec<String> = self.deltas.iter().map(|s| s.to_string()).collect();
            Some(Box::pin(futures::stream::iter(deltas).then(|d| async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                d
            })))
        }
    }

    struct RecordingSink {
        sent: Mutex<Vec<KioskCommand>>,
    }

    #[async_trait]
    impl KioskCommandSink for RecordingSink {
        async fn send(&self, command: KioskCommand) {
            self.sent.lock().await.push(command);
        }
    }

    struct RecordingObserver {
        observations: StdMutex<Vec<TtfaObservation>>,
    }

    impl MetricsObserver for RecordingObserver {
        fn observe_ttfa(&self, observation: TtfaObservation) {
            self.observations.lock().unwrap().push(observation);
        }
    }

    #[tokio::test]
    async fn streamed_segments_precede_chat_result_and_last_segment_is_marked() {
        let provider = FakeChatProvider { deltas: vec!["こんにちは。", "よろしくね。"], final_text: "こんにちは。よろしくね。", delay_before_final_ms: 50 };
        let kiosk = RecordingSink { sent: Mutex::new(Vec::new()) };
        let correlation = StreamCorrelationTable::with_capacity_and_ttl(8, 300_000);
        let observer = RecordingObserver { observations: StdMutex::new(Vec::new()) };

        let input = CallChatInput { session_buffer: vec![], user_text: "hi".to_string() };
        let event = run_streaming_chat(&provider, input, "chat-1".to_string(), 1_000, &kiosk, &correlation, Some(&observer)).await;

        match event {
            Event::ChatResult { id, text, .. } => {
                assert_eq!(id, "chat-1");
                assert_eq!(text, "こんにちは。よろしくね。");
            }
            other => panic!("expected ChatResult, got {other:?}"),
        }

        let sent = kiosk.sent.lock().await;
        assert!(matches!(sent.first(), Some(KioskCommand::SpeechStart { .. })));
        assert!(matches!(sent.last(), Some(KioskCommand::SpeechEnd { .. })));
        let segments: Vec<&KioskCommand> = sent.iter().filter(|c| matches!(c, KioskCommand::SpeechSegment { .. })).collect();
        assert_eq!(segments.len(), 2);
        assert!(matches!(segments[0], KioskCommand::SpeechSegment { is_last: false, .. }));
        assert!(matches!(segments[1], KioskCommand::SpeechSegment { is_last: true, .. }));

        assert!(correlation.delete("chat-1", 1_100));
        assert_eq!(observer.observations.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn no_stream_support_falls_back_to_call_only() {
        struct CallOnlyProvider;
        #[async_trait]
        impl ChatProvider for CallOnlyProvider {
            async fn call(&self, _input: &CallChatInput) -> Result<crate::executor::providers::ChatOutput, KioskError> {
                Ok(crate::executor::providers::ChatOutput {
                    assistant_text: "やあ".to_string(),
                    expression: "neutral".to_string(),
                    motion_id: None,
                    tool_calls: vec![],
                })
            }
            fn stream(&self, _input: &CallChatInput) -> Option<ChatDeltaStream> {
                None
            }
        }

        let kiosk = RecordingSink { sent: Mutex::new(Vec::new()) };
        let correlation = StreamCorrelationTable::with_capacity_and_ttl(8, 300_000);
        let input = CallChatInput { session_buffer: vec![], user_text: "hi".to_string() };
        let event = run_streaming_chat(&CallOnlyProvider, input, "chat-2".to_string(), 0, &kiosk, &correlation, None).await;
        assert!(matches!(event, Event::ChatResult { .. }));
        assert!(kiosk.sent.lock().await.is_empty());
    }
}
