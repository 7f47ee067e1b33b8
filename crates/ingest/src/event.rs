//! 알림 이벤트 -- 구조화 페이로드 생성
//!
//! [`EventBuilder`]는 파싱된 필드(또는 원문 텍스트)로부터 [`NotificationEvent`]를 생성합니다.
//! 알림은 공통 헤더(`ves`)와 syslog 도메인 블록(`syslogFields`)으로 구성되며,
//! `serde_json`으로 직렬화하면 하위 전달 계층이 기대하는 필드 이름을 사용합니다.
//!
//! # 이벤트 ID
//! 이벤트 ID는 빌더(세션) 단위로 소유되며, 생성에 성공할 때마다 정확히 1 증가합니다.
//! 생성 실패 시에는 소비되지 않습니다.

use serde::Serialize;

use crate::error::IngestError;

/// 헤더 도메인
pub const DOMAIN: &str = "syslog";
/// 보고 주체 이름
pub const REPORTING_ENTITY_NAME: &str = "collectd sysevent plugin";
/// 헤더 시퀀스 (고정)
pub const SEQUENCE: u64 = 0;
/// 프로세스 이름이 없을 때의 소스 이름
pub const DEFAULT_SOURCE_NAME: &str = "syslog";
/// 헤더 스키마 버전
pub const HEADER_VERSION: f64 = 1.0;
/// 이벤트 소스 유형
pub const EVENT_SOURCE_TYPE: &str = "host";
/// syslog 도메인 블록 스키마 버전
pub const SYSLOG_FIELDS_VERSION: f64 = 1.0;
/// syslog 태그 (고정)
pub const SYSLOG_TAG: &str = "NILVALUE";
/// 알림 플러그인 이름
pub const PLUGIN_NAME: &str = "sysevent";
/// 알림 타입 표시
pub const TYPE_MARKER: &str = "gauge";

/// 이름류 문자열 필드 최대 길이 (바이트)
pub const MAX_NAME_LEN: usize = 128;

/// 우선순위 구간
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// 심각도 4
    Medium,
    /// 심각도 5
    Normal,
    /// 심각도 6, 7
    Low,
    /// 그 외 또는 없음
    Unknown,
}

impl Priority {
    /// 심각도 숫자 코드를 우선순위 구간으로 변환합니다.
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(4) => Self::Medium,
            Some(5) => Self::Normal,
            Some(6 | 7) => Self::Low,
            _ => Self::Unknown,
        }
    }
}

/// 알림 심각도 구분
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSeverity {
    /// 정보성
    Okay,
    /// 장애성 (심각도 코드 < 4)
    Failure,
}

impl NotificationSeverity {
    /// 심각도 숫자 코드로부터 알림 심각도를 결정합니다.
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(c) if c < 4 => Self::Failure,
            _ => Self::Okay,
        }
    }
}

/// syslog 도메인 블록
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyslogFields {
    pub event_source_host: String,
    pub event_source_type: String,
    pub syslog_fields_version: f64,
    pub syslog_msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syslog_proc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syslog_sev: Option<String>,
    pub syslog_tag: String,
}

/// 공통 이벤트 헤더
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHeader {
    pub domain: String,
    pub event_id: u64,
    pub event_name: String,
    pub last_epoch_microsec: u64,
    pub priority: Priority,
    pub reporting_entity_name: String,
    pub sequence: u64,
    pub source_name: String,
    pub start_epoch_microsec: u64,
    pub version: f64,
    pub syslog_fields: SyslogFields,
}

/// 하위 전달 계층으로 보내는 알림
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationEvent {
    /// 장애/정보 구분
    pub severity: NotificationSeverity,
    /// 알림 생성 시각 (마이크로초)
    pub time_us: u64,
    /// 로컬 호스트 이름
    pub host: String,
    /// 플러그인 이름 (`"sysevent"`)
    pub plugin: String,
    /// 타입 표시 (`"gauge"`)
    #[serde(rename = "type")]
    pub type_marker: String,
    /// 메타데이터 트리
    pub ves: EventHeader,
}

/// 알림 생성 입력
#[derive(Debug, Clone, Default)]
pub struct EventFields<'a> {
    /// 메시지 텍스트
    pub message: &'a str,
    /// 심각도 텍스트
    pub severity: Option<&'a str>,
    /// 심각도 숫자 코드
    pub severity_code: Option<i32>,
    /// 프로세스 이름
    pub process: Option<&'a str>,
    /// 이벤트 소스 호스트
    pub host: &'a str,
    /// 수신 시각 (마이크로초)
    pub timestamp_us: u64,
}

/// 알림 이벤트 빌더
///
/// 세션이 하나를 소유하며, 이벤트 ID 카운터를 관리합니다.
#[derive(Debug)]
pub struct EventBuilder {
    /// 알림의 `host` (로컬 호스트 이름)
    local_host: String,
    /// 메시지 최대 길이 (문자 수)
    max_message_len: usize,
    /// 마지막으로 발급한 이벤트 ID
    last_event_id: u64,
}

impl EventBuilder {
    /// 새 빌더를 생성합니다.
    ///
    /// `max_message_len`은 보통 링 버퍼 슬롯 폭입니다. 원문 바이트 하나가
    /// 최대 한 문자가 되므로 문자 수로 제한하면 치환 문자가 섞여도 슬롯보다 짧은 페이로드는 잘리지 않습니다.
    pub fn new(local_host: impl Into<String>, max_message_len: usize) -> Self {
        Self {
            local_host: local_host.into(),
            max_message_len,
            last_event_id: 0,
        }
    }

    /// 마지막으로 발급한 이벤트 ID를 반환합니다 (아직 없으면 0).
    pub fn last_event_id(&self) -> u64 {
        self.last_event_id
    }

    /// 로컬 호스트 이름을 반환합니다.
    pub fn local_host(&self) -> &str {
        &self.local_host
    }

    /// 알림 이벤트를 생성합니다.
    ///
    /// `now_us`는 `lastEpochMicrosec`과 알림 시각으로 사용됩니다.
    ///
    /// 소스 호스트가 비어 있거나 공백뿐이면 로컬 호스트 이름을 사용합니다.
    ///
    /// # Errors
    /// 로컬 호스트 이름이 비어 있으면 [`IngestError::Build`]를 반환하며, 이벤트 ID는 소비되지 않습니다.
    pub fn build(
        &mut self,
        fields: &EventFields<'_>,
        now_us: u64,
    ) -> Result<NotificationEvent, IngestError> {
        let local_host = self.local_host.trim();
        if local_host.is_empty() {
            return Err(IngestError::Build("local host name is empty".to_owned()));
        }

        let source_host = match fields.host.trim() {
            "" => local_host,
            host => host,
        };
        let host = truncate_utf8(source_host, MAX_NAME_LEN);

        let process = fields
            .process
            .map(|p| truncate_utf8(p, MAX_NAME_LEN).to_owned());
        let source_name = process
            .clone()
            .unwrap_or_else(|| DEFAULT_SOURCE_NAME.to_owned());

        let event_id = self.last_event_id + 1;

        let header = EventHeader {
            domain: DOMAIN.to_owned(),
            event_id,
            event_name: truncate_utf8(&format!("host {host} rsyslog message"), MAX_NAME_LEN)
                .to_owned(),
            last_epoch_microsec: now_us,
            priority: Priority::from_code(fields.severity_code),
            reporting_entity_name: REPORTING_ENTITY_NAME.to_owned(),
            sequence: SEQUENCE,
            source_name,
            start_epoch_microsec: fields.timestamp_us,
            version: HEADER_VERSION,
            syslog_fields: SyslogFields {
                event_source_host: host.to_owned(),
                event_source_type: EVENT_SOURCE_TYPE.to_owned(),
                syslog_fields_version: SYSLOG_FIELDS_VERSION,
                syslog_msg: truncate_chars(fields.message, self.max_message_len).to_owned(),
                syslog_proc: process,
                syslog_sev: fields
                    .severity
                    .map(|s| truncate_utf8(s, MAX_NAME_LEN).to_owned()),
                syslog_tag: SYSLOG_TAG.to_owned(),
            },
        };

        self.last_event_id = event_id;

        Ok(NotificationEvent {
            severity: NotificationSeverity::from_code(fields.severity_code),
            time_us: now_us,
            host: truncate_utf8(&self.local_host, MAX_NAME_LEN).to_owned(),
            plugin: PLUGIN_NAME.to_owned(),
            type_marker: TYPE_MARKER.to_owned(),
            ves: header,
        })
    }
}

/// 최대 `max` 문자까지 자릅니다.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

/// `max` 바이트 이내로 문자 경계에서 자릅니다.
pub fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
