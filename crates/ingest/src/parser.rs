//! 구조화 페이로드 파서 -- JSON 형식 syslog 레코드
//!
//! 지원 형식 (rsyslog JSON 템플릿):
//! ```json
//! {
//!   "@timestamp": "2024-01-15T12:00:00Z",
//!   "@source_host": "web-01",
//!   "@message": "Connection refused",
//!   "@fields": {
//!     "facility": "daemon",
//!     "severity": "err",
//!     "severity-num": "3",
//!     "program": "nginx",
//!     "processid": "1234"
//!   }
//! }
//! ```
//!
//! JSON 객체가 아닌 페이로드는 파싱 실패로 처리되며, 호출자는 원문 텍스트로 대체합니다.

use serde_json::{Map, Value};

use crate::error::IngestError;

const KEY_TIMESTAMP: &str = "@timestamp";
const KEY_SOURCE_HOST: &str = "@source_host";
const KEY_MESSAGE: &str = "@message";
const KEY_FIELDS: &str = "@fields";

const FIELD_FACILITY: &str = "facility";
const FIELD_SEVERITY: &str = "severity";
const FIELD_SEVERITY_NUM: &str = "severity-num";
const FIELD_PROGRAM: &str = "program";
const FIELD_PROCESS_ID: &str = "processid";

/// 구조화 페이로드에서 추출한 필드
///
/// 모든 필드는 선택 사항입니다. 문자열이 아닌 값은 없는 것으로 취급합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedEvent {
    /// `@message`
    pub message: Option<String>,
    /// `@fields.severity`
    pub severity: Option<String>,
    /// `@fields.severity-num`
    pub severity_code: Option<i32>,
    /// `@fields.program`
    pub process: Option<String>,
    /// `@source_host`
    pub host: Option<String>,
    /// `@timestamp`
    pub timestamp: Option<String>,
    /// `@fields.facility`
    pub facility: Option<String>,
    /// `@fields.processid`
    pub pid: Option<String>,
}

impl ParsedEvent {
    /// 필터 평가 및 알림 메시지로 사용할 텍스트를 반환합니다.
    ///
    /// `@message`가 없으면 원문 텍스트를 사용합니다.
    pub fn message_or<'a>(&'a self, raw: &'a str) -> &'a str {
        self.message.as_deref().unwrap_or(raw)
    }
}

/// 페이로드를 구조화 이벤트로 파싱합니다.
///
/// # Errors
/// 유효한 JSON이 아니거나 최상위 값이 객체가 아니면 [`IngestError::Parse`]를 반환합니다.
pub fn parse_structured(payload: &[u8]) -> Result<ParsedEvent, IngestError> {
    let value: Value = serde_json::from_slice(payload).map_err(|e| IngestError::Parse {
        offset: e.column(),
        reason: e.to_string(),
    })?;

    let Value::Object(root) = value else {
        return Err(IngestError::Parse {
            offset: 0,
            reason: format!("expected a JSON object, got {}", json_type_name(&value)),
        });
    };

    let fields = root.get(KEY_FIELDS).and_then(Value::as_object);

    Ok(ParsedEvent {
        message: string_at(&root, KEY_MESSAGE),
        host: string_at(&root, KEY_SOURCE_HOST),
        timestamp: string_at(&root, KEY_TIMESTAMP),
        severity: fields.and_then(|f| string_at(f, FIELD_SEVERITY)),
        severity_code: fields.and_then(|f| severity_code_at(f, FIELD_SEVERITY_NUM)),
        process: fields.and_then(|f| string_at(f, FIELD_PROGRAM)),
        facility: fields.and_then(|f| string_at(f, FIELD_FACILITY)),
        pid: fields.and_then(|f| string_at(f, FIELD_PROCESS_ID)),
    })
}

fn string_at(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn severity_code_at(map: &Map<String, Value>, key: &str) -> Option<i32> {
    match map.get(key)? {
        Value::String(s) => Some(parse_leading_int(s)),
        Value::Number(n) => n
            .as_i64()
            .map(|i| i.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32),
        _ => None,
    }
}

/// 선행 정수를 관대하게 파싱합니다.
///
/// 앞 공백을 건너뛰고 선택적 부호와 숫자를 읽습니다. 숫자가 없으면 0을 반환하며,
/// 범위를 벗어나면 포화시킵니다.
pub fn parse_leading_int(s: &str) -> i32 {
    let trimmed = s.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut value: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        value = value * 10 + i64::from(b - b'0');
        if value > i64::from(i32::MAX) + 1 {
            break;
        }
    }

    let value = if negative { -value } else { value };
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
