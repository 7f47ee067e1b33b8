//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 수집 코어는 이 상수로 `metrics::counter!()`, `metrics::gauge!()`를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `sysevent_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use sysevent_core::metrics as m;
//!
//! metrics::counter!(m::DATAGRAMS_RECEIVED_TOTAL).increment(1);
//! ```

// ─── 레이블 ─────────────────────────────────────────────────────────

/// 드롭 사유 레이블 키
pub const LABEL_REASON: &str = "reason";

/// 드롭 사유: 링 버퍼 가득 참
pub const REASON_RING_FULL: &str = "ring_full";

/// 드롭 사유: 데이터그램이 버퍼 폭 이상
pub const REASON_OVERSIZED: &str = "oversized";

// ─── 수집 메트릭 ────────────────────────────────────────────────────

/// 수신된 데이터그램 수 (counter)
pub const DATAGRAMS_RECEIVED_TOTAL: &str = "sysevent_datagrams_received_total";

/// 드롭된 데이터그램 수 (counter, label: reason)
pub const DATAGRAMS_DROPPED_TOTAL: &str = "sysevent_datagrams_dropped_total";

/// 현재 링 버퍼 대기 엔트리 수 (gauge)
pub const RING_PENDING: &str = "sysevent_ring_pending";

/// 리스너 재시작 횟수 (counter)
pub const LISTENER_RESTARTS_TOTAL: &str = "sysevent_listener_restarts_total";

// ─── 변환/전달 메트릭 ───────────────────────────────────────────────

/// 전달된 알림 수 (counter)
pub const NOTIFICATIONS_DISPATCHED_TOTAL: &str = "sysevent_notifications_dispatched_total";

/// 필터로 제외된 메시지 수 (counter)
pub const MESSAGES_FILTERED_TOTAL: &str = "sysevent_messages_filtered_total";

/// 구조화 파싱 실패로 원문 처리된 메시지 수 (counter)
pub const PARSE_FALLBACKS_TOTAL: &str = "sysevent_parse_fallbacks_total";

/// 이벤트 생성 실패 수 (counter)
pub const BUILD_FAILURES_TOTAL: &str = "sysevent_build_failures_total";

/// 전달 실패 수 (counter)
pub const DISPATCH_FAILURES_TOTAL: &str = "sysevent_dispatch_failures_total";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        DATAGRAMS_RECEIVED_TOTAL,
        "Total number of datagrams received on the listen socket"
    );
    describe_counter!(
        DATAGRAMS_DROPPED_TOTAL,
        "Datagrams dropped before buffering (ring_full, oversized)"
    );
    describe_gauge!(RING_PENDING, "Entries pending in the ring buffer");
    describe_counter!(
        LISTENER_RESTARTS_TOTAL,
        "Listener restarts triggered by receive errors"
    );
    describe_counter!(
        NOTIFICATIONS_DISPATCHED_TOTAL,
        "Notifications handed to the dispatch sink"
    );
    describe_counter!(
        MESSAGES_FILTERED_TOTAL,
        "Messages excluded by the regex filter"
    );
    describe_counter!(
        PARSE_FALLBACKS_TOTAL,
        "Messages treated as raw text after structured parsing failed"
    );
    describe_counter!(
        BUILD_FAILURES_TOTAL,
        "Notification payloads that could not be built"
    );
    describe_counter!(
        DISPATCH_FAILURES_TOTAL,
        "Notifications dropped because the sink was full or closed"
    );
}
