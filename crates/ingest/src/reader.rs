//! 리더 -- 드레인된 엔트리의 파싱, 필터, 생성, 전달
//!
//! 링에서 꺼낸 [`RawEvent`] 목록을 받아 엔트리마다 다음을 수행합니다.
//!
//! 1. 구조화 파싱 (실패 시 원문 텍스트로 대체, 주기를 중단하지 않음)
//! 2. 필터 후보 계산 (`@message` 또는 원문)
//! 3. 필터 평가 (제외 시 조용히 건너뜀)
//! 4. 알림 생성 후 싱크로 전달
//!
//! 이 단계들은 링 잠금 밖에서 실행됩니다. 싱크가 가득 차면 자리가 날 때까지
//! 기다리므로, 링이 받아들인 엔트리는 싱크가 닫힌 경우에만 버려집니다.

use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

use sysevent_core::metrics as m;

use crate::error::IngestError;
use crate::event::{EventBuilder, EventFields, NotificationEvent};
use crate::filter::{FilterDecision, MessageFilter};
use crate::listener::epoch_micros;
use crate::parser::parse_structured;
use crate::ring::RawEvent;

/// 한 번의 읽기 주기 결과 요약
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// 링에서 꺼낸 엔트리 수
    pub drained: usize,
    /// 싱크로 전달된 알림 수
    pub dispatched: usize,
    /// 필터로 제외된 수
    pub filtered: usize,
    /// 원문 처리로 대체된 수
    pub parse_fallbacks: usize,
    /// 생성 실패 수
    pub build_failures: usize,
    /// 전달 실패 수
    pub dispatch_failures: usize,
}

/// 드레인된 엔트리를 알림으로 변환하여 전달하는 리더
pub struct Reader {
    filter: MessageFilter,
    builder: EventBuilder,
    sink: mpsc::Sender<NotificationEvent>,
}

impl Reader {
    /// 새 리더를 생성합니다.
    pub fn new(
        filter: MessageFilter,
        builder: EventBuilder,
        sink: mpsc::Sender<NotificationEvent>,
    ) -> Self {
        Self {
            filter,
            builder,
            sink,
        }
    }

    /// 마지막으로 발급한 이벤트 ID를 반환합니다.
    pub fn last_event_id(&self) -> u64 {
        self.builder.last_event_id()
    }

    /// 필터를 반환합니다.
    pub fn filter(&self) -> &MessageFilter {
        &self.filter
    }

    /// 엔트리 목록을 처리합니다.
    pub async fn process(&mut self, events: Vec<RawEvent>) -> CycleSummary {
        let mut summary = CycleSummary {
            drained: events.len(),
            ..Default::default()
        };

        for raw in &events {
            self.process_one(raw, &mut summary).await;
        }

        if summary.drained > 0 {
            debug!(
                drained = summary.drained,
                dispatched = summary.dispatched,
                filtered = summary.filtered,
                parse_fallbacks = summary.parse_fallbacks,
                build_failures = summary.build_failures,
                dispatch_failures = summary.dispatch_failures,
                "read cycle complete"
            );
        }

        summary
    }

    async fn process_one(&mut self, raw: &RawEvent, summary: &mut CycleSummary) {
        let text = raw.text();
        let local_host = self.builder.local_host().to_owned();

        let parsed = match parse_structured(&raw.payload) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                trace!(error = %e, "payload is not structured, using raw text");
                summary.parse_fallbacks += 1;
                metrics::counter!(m::PARSE_FALLBACKS_TOTAL).increment(1);
                None
            }
        };

        let fields = match &parsed {
            Some(p) => EventFields {
                message: p.message_or(&text),
                severity: p.severity.as_deref(),
                severity_code: p.severity_code,
                process: p.process.as_deref(),
                host: p.host.as_deref().unwrap_or(&local_host),
                timestamp_us: raw.timestamp_us,
            },
            None => EventFields {
                message: &text,
                host: &local_host,
                timestamp_us: raw.timestamp_us,
                ..Default::default()
            },
        };

        if self.filter.evaluate(fields.message) == FilterDecision::Excluded {
            trace!("message excluded by filter");
            summary.filtered += 1;
            metrics::counter!(m::MESSAGES_FILTERED_TOTAL).increment(1);
            return;
        }

        let event = match self.builder.build(&fields, epoch_micros()) {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "failed to build notification, event dropped");
                summary.build_failures += 1;
                metrics::counter!(m::BUILD_FAILURES_TOTAL).increment(1);
                return;
            }
        };

        match self.dispatch(event).await {
            Ok(()) => {
                summary.dispatched += 1;
                metrics::counter!(m::NOTIFICATIONS_DISPATCHED_TOTAL).increment(1);
            }
            Err(e) => {
                warn!(error = %e, "failed to dispatch notification, event dropped");
                summary.dispatch_failures += 1;
                metrics::counter!(m::DISPATCH_FAILURES_TOTAL).increment(1);
            }
        }
    }

    async fn dispatch(&self, event: NotificationEvent) -> Result<(), IngestError> {
        let started = Instant::now();
        let result = self
            .sink
            .send(event)
            .await
            .map_err(|_| IngestError::Dispatch("notification sink closed".to_owned()));

        let elapsed = started.elapsed();
        if elapsed.as_millis() > 1 {
            debug!(elapsed_us = elapsed.as_micros() as u64, "slow notification dispatch");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{NotificationSeverity, Priority};
    use bytes::Bytes;

    fn raw(payload: &str, ts: u64) -> RawEvent {
        RawEvent {
            payload: Bytes::copy_from_slice(payload.as_bytes()),
            timestamp_us: ts,
        }
    }

    fn reader(
        patterns: &[&str],
        sink_capacity: usize,
    ) -> (Reader, mpsc::Receiver<NotificationEvent>) {
        let (tx, rx) = mpsc::channel(sink_capacity);
        let filter = MessageFilter::from_patterns(patterns).unwrap();
        (Reader::new(filter, EventBuilder::new("local-host", 4096), tx), rx)
    }

    #[tokio::test]
    async fn every_message_dispatched_without_rules() {
        let (mut reader, mut rx) = reader(&[], 16);
        let summary = reader
            .process(vec![raw("one", 1), raw("two", 2), raw("three", 3)])
            .await;

        assert_eq!(summary.drained, 3);
        assert_eq!(summary.dispatched, 3);
        assert_eq!(summary.filtered, 0);

        let messages: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.ves.syslog_fields.syslog_msg)
            .collect();
        assert_eq!(messages, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn structured_payload_is_mapped() {
        let (mut reader, mut rx) = reader(&[], 4);
        let payload = r#"{"@source_host":"web-01","@message":"oom killer invoked",
            "@fields":{"severity":"warning","severity-num":"4","program":"kernel"}}"#;
        reader.process(vec![raw(payload, 99)]).await;

        let event = rx.try_recv().unwrap();
        assert_eq!(event.host, "local-host");
        assert_eq!(event.severity, NotificationSeverity::Okay);
        assert_eq!(event.ves.priority, Priority::Medium);
        assert_eq!(event.ves.source_name, "kernel");
        assert_eq!(event.ves.start_epoch_microsec, 99);
        assert_eq!(event.ves.event_name, "host web-01 rsyslog message");
        assert_eq!(event.ves.syslog_fields.syslog_msg, "oom killer invoked");
        assert_eq!(event.ves.syslog_fields.syslog_sev.as_deref(), Some("warning"));
    }

    #[tokio::test]
    async fn low_severity_code_is_failure() {
        let (mut reader, mut rx) = reader(&[], 4);
        reader
            .process(vec![raw(
                r#"{"@message":"disk failed","@fields":{"severity-num":"2"}}"#,
                1,
            )])
            .await;
        assert_eq!(rx.try_recv().unwrap().severity, NotificationSeverity::Failure);
    }

    #[tokio::test]
    async fn malformed_payload_uses_raw_text() {
        let (mut reader, mut rx) = reader(&[], 4);
        let payload = r#"{"@message": "broken"#;
        let summary = reader.process(vec![raw(payload, 5)]).await;

        assert_eq!(summary.parse_fallbacks, 1);
        assert_eq!(summary.dispatched, 1);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.ves.syslog_fields.syslog_msg, payload);
        assert_eq!(event.ves.syslog_fields.event_source_host, "local-host");
        assert_eq!(event.ves.source_name, "syslog");
        assert!(event.ves.syslog_fields.syslog_proc.is_none());
        assert!(event.ves.syslog_fields.syslog_sev.is_none());
        assert_eq!(event.ves.priority, Priority::Unknown);
    }

    #[tokio::test]
    async fn filter_uses_structured_message() {
        let (mut reader, mut rx) = reader(&["/refused/"], 4);
        let summary = reader
            .process(vec![
                raw(r#"{"@message":"connection refused"}"#, 1),
                raw(r#"{"@message":"connection accepted"}"#, 2),
                raw("plain refused text", 3),
                raw("plain other text", 4),
            ])
            .await;

        assert_eq!(summary.dispatched, 2);
        assert_eq!(summary.filtered, 2);
        assert_eq!(rx.try_recv().unwrap().ves.syslog_fields.syslog_msg, "connection refused");
        assert_eq!(rx.try_recv().unwrap().ves.syslog_fields.syslog_msg, "plain refused text");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn event_ids_are_consecutive_across_cycles() {
        let (mut reader, mut rx) = reader(&[], 16);
        reader.process(vec![raw("a", 1), raw("b", 2)]).await;
        reader.process(vec![raw("c", 3)]).await;

        let ids: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.ves.event_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(reader.last_event_id(), 3);
    }

    #[tokio::test]
    async fn full_sink_waits_for_capacity() {
        let (mut reader, mut rx) = reader(&[], 1);
        let consumer = tokio::spawn(async move {
            let mut messages = Vec::new();
            while let Some(event) = rx.recv().await {
                messages.push(event.ves.syslog_fields.syslog_msg);
            }
            messages
        });

        let batch: Vec<_> = (0..50u64).map(|i| raw(&format!("m{i}"), i)).collect();
        let summary = reader.process(batch).await;
        assert_eq!(summary.dispatched, 50);
        assert_eq!(summary.dispatch_failures, 0);

        drop(reader);
        let messages = consumer.await.unwrap();
        assert_eq!(messages.len(), 50);
        assert_eq!(messages[0], "m0");
        assert_eq!(messages[49], "m49");
    }

    #[tokio::test]
    async fn blank_source_host_is_dispatched() {
        let (mut reader, mut rx) = reader(&[], 4);
        let summary = reader
            .process(vec![
                raw(r#"{"@source_host":"","@message":"hello"}"#, 1),
                raw(r#"{"@source_host":"   ","@message":"world"}"#, 2),
            ])
            .await;

        assert_eq!(summary.dispatched, 2);
        assert_eq!(summary.build_failures, 0);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.ves.syslog_fields.syslog_msg, "hello");
        assert_eq!(event.ves.syslog_fields.event_source_host, "local-host");
    }

    #[tokio::test]
    async fn invalid_utf8_payload_is_not_cut() {
        let (tx, mut rx) = mpsc::channel(4);
        let width = 64;
        let mut reader = Reader::new(
            MessageFilter::default(),
            EventBuilder::new("local-host", width),
            tx,
        );

        // 치환 문자는 3바이트라 텍스트는 슬롯 폭보다 길어짐
        let mut payload = vec![0xFFu8; width - 2];
        payload.push(b'!');
        let summary = reader
            .process(vec![RawEvent {
                payload: Bytes::from(payload),
                timestamp_us: 1,
            }])
            .await;
        assert_eq!(summary.dispatched, 1);

        let message = rx.try_recv().unwrap().ves.syslog_fields.syslog_msg;
        assert_eq!(message.chars().count(), width - 1);
        assert!(message.len() > width);
        assert!(message.ends_with('!'));
    }

    #[tokio::test]
    async fn closed_sink_does_not_abort_cycle() {
        let (mut reader, rx) = reader(&[], 4);
        drop(rx);
        let summary = reader.process(vec![raw("a", 1), raw("b", 2)]).await;
        assert_eq!(summary.drained, 2);
        assert_eq!(summary.dispatch_failures, 2);
    }

    #[tokio::test]
    async fn empty_drain_is_empty_summary() {
        let (mut reader, _rx) = reader(&[], 4);
        assert_eq!(reader.process(Vec::new()).await, CycleSummary::default());
    }
}
