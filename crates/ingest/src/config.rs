//! 수집 플러그인 설정 -- 옵션 단위 적용
//!
//! 설정은 `(키, 값 목록)` 형태의 [`ConfigOption`] 시퀀스로 전달됩니다.
//! 각 옵션은 독립적으로 검증되며, 잘못된 옵션은 경고 후 무시되고
//! 나머지 옵션은 그대로 적용됩니다.
//!
//! | 옵션 | 인자 | 범위/기본값 |
//! |---|---|---|
//! | `Listen` | ip, port (문자열) | 필수 |
//! | `BufferSize` | 정수 | 1024-65535, 기본 4096 |
//! | `BufferLength` | 정수 | 3-4096, 기본 10 |
//! | `RegexFilter` | 패턴 (문자열) | 반복 가능 |
//!
//! `Listen`의 포트는 숫자여야 합니다. `"syslog"` 같은 서비스 이름은 해석하지 않으며
//! `init()`에서 소켓 에러로 거부됩니다.
//!
//! # 사용 예시
//! ```ignore
//! use sysevent_ingest::config::{ConfigOption, SyseventConfig};
//!
//! let (config, rejected) = SyseventConfig::from_table(&daemon_config.sysevent);
//! for err in &rejected {
//!     eprintln!("ignored: {err}");
//! }
//! ```

use tracing::warn;

use crate::error::IngestError;
use crate::filter::FilterRule;

/// 슬롯 폭 기본값 (바이트)
pub const DEFAULT_BUFFER_SIZE: usize = 4096;
/// 슬롯 폭 최소값
pub const MIN_BUFFER_SIZE: usize = 1024;
/// 슬롯 폭 최대값
pub const MAX_BUFFER_SIZE: usize = 65535;

/// 링 버퍼 논리 슬롯 수 기본값
pub const DEFAULT_BUFFER_LENGTH: usize = 10;
/// 링 버퍼 논리 슬롯 수 최소값
pub const MIN_BUFFER_LENGTH: usize = 3;
/// 링 버퍼 논리 슬롯 수 최대값
pub const MAX_BUFFER_LENGTH: usize = 4096;

const OPT_LISTEN: &str = "Listen";
const OPT_BUFFER_SIZE: &str = "BufferSize";
const OPT_BUFFER_LENGTH: &str = "BufferLength";
const OPT_REGEX_FILTER: &str = "RegexFilter";

/// 옵션 값
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// 문자열
    String(String),
    /// 정수
    Integer(i64),
    /// 실수
    Float(f64),
    /// 불리언
    Boolean(bool),
    /// 지원하지 않는 형식 (형식 이름)
    Unsupported(String),
}

impl OptionValue {
    fn type_name(&self) -> &str {
        match self {
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Boolean(_) => "boolean",
            Self::Unsupported(name) => name,
        }
    }

    fn from_toml(value: &toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Self::String(s.clone()),
            toml::Value::Integer(i) => Self::Integer(*i),
            toml::Value::Float(f) => Self::Float(*f),
            toml::Value::Boolean(b) => Self::Boolean(*b),
            toml::Value::Datetime(_) => Self::Unsupported("datetime".to_owned()),
            toml::Value::Array(_) => Self::Unsupported("array".to_owned()),
            toml::Value::Table(_) => Self::Unsupported("table".to_owned()),
        }
    }
}

/// 설정 옵션 하나 (키 + 값 목록)
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigOption {
    /// 옵션 이름
    pub key: String,
    /// 인자 목록
    pub values: Vec<OptionValue>,
}

impl ConfigOption {
    /// 새 옵션을 생성합니다.
    pub fn new(key: impl Into<String>, values: Vec<OptionValue>) -> Self {
        Self {
            key: key.into(),
            values,
        }
    }

    /// 문자열 인자 하나를 가진 옵션을 생성합니다.
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, vec![OptionValue::String(value.into())])
    }

    /// 정수 인자 하나를 가진 옵션을 생성합니다.
    pub fn integer(key: impl Into<String>, value: i64) -> Self {
        Self::new(key, vec![OptionValue::Integer(value)])
    }

    /// TOML 테이블을 옵션 시퀀스로 변환합니다.
    ///
    /// - 배열 값은 인자 목록으로 변환됩니다 (`Listen = ["0.0.0.0", "514"]`).
    /// - `RegexFilter` 배열은 원소마다 별도 옵션으로 변환됩니다 (반복 옵션).
    pub fn from_table(table: &toml::Table) -> Vec<Self> {
        let mut options = Vec::with_capacity(table.len());

        for (key, value) in table {
            match value {
                toml::Value::Array(items) if key_matches(key, OPT_REGEX_FILTER) => {
                    for item in items {
                        options.push(Self::new(key.clone(), vec![OptionValue::from_toml(item)]));
                    }
                }
                toml::Value::Array(items) => {
                    options.push(Self::new(
                        key.clone(),
                        items.iter().map(OptionValue::from_toml).collect(),
                    ));
                }
                scalar => {
                    options.push(Self::new(key.clone(), vec![OptionValue::from_toml(scalar)]));
                }
            }
        }

        options
    }

    /// 정수 인자 하나를 추출합니다.
    fn single_int(&self) -> Result<i64, IngestError> {
        match self.values.as_slice() {
            [OptionValue::Integer(i)] => Ok(*i),
            [OptionValue::Float(f)] if f.fract() == 0.0 => Ok(*f as i64),
            _ => Err(IngestError::Config {
                field: self.key.clone(),
                reason: "needs exactly one integer argument".to_owned(),
            }),
        }
    }

    fn describe_values(&self) -> String {
        self.values
            .iter()
            .map(OptionValue::type_name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// 옵션 이름 비교 (대소문자, `_`, `-` 무시)
fn key_matches(key: &str, option: &str) -> bool {
    let normalized = key
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase());
    normalized.eq(option.chars().map(|c| c.to_ascii_lowercase()))
}

/// 수집 플러그인 설정
#[derive(Debug, Clone, PartialEq)]
pub struct SyseventConfig {
    /// 바인드 IP (또는 호스트명)
    pub listen_ip: Option<String>,
    /// 바인드 포트 (또는 서비스명)
    pub listen_port: Option<String>,
    /// 슬롯 폭 (바이트). 이 크기 이상의 데이터그램은 버려집니다.
    pub buffer_size: usize,
    /// 링 버퍼 논리 슬롯 수 (동시에 대기 가능한 엔트리는 N-1)
    pub buffer_length: usize,
    /// 필터 패턴 목록 (비어있으면 모든 메시지 통과)
    pub regex_filters: Vec<String>,
}

impl Default for SyseventConfig {
    fn default() -> Self {
        Self {
            listen_ip: None,
            listen_port: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            buffer_length: DEFAULT_BUFFER_LENGTH,
            regex_filters: Vec::new(),
        }
    }
}

impl SyseventConfig {
    /// 기본값에서 시작하여 TOML 옵션 테이블을 적용합니다.
    ///
    /// 거부된 옵션의 에러 목록을 함께 반환합니다.
    pub fn from_table(table: &toml::Table) -> (Self, Vec<IngestError>) {
        let mut config = Self::default();
        let rejected = config.configure(&ConfigOption::from_table(table));
        (config, rejected)
    }

    /// 옵션 시퀀스를 순서대로 적용합니다.
    ///
    /// 잘못된 옵션과 알 수 없는 옵션은 경고 후 건너뛰며, 전체 적용은 실패하지 않습니다.
    pub fn configure(&mut self, options: &[ConfigOption]) -> Vec<IngestError> {
        let mut rejected = Vec::new();
        for option in options {
            if let Err(e) = self.apply(option) {
                warn!(option = %option.key, error = %e, "config option rejected");
                rejected.push(e);
            }
        }
        rejected
    }

    /// 옵션 하나를 적용합니다.
    pub fn apply(&mut self, option: &ConfigOption) -> Result<(), IngestError> {
        if key_matches(&option.key, OPT_LISTEN) {
            self.apply_listen(option)
        } else if key_matches(&option.key, OPT_BUFFER_SIZE) {
            self.apply_buffer_size(option)
        } else if key_matches(&option.key, OPT_BUFFER_LENGTH) {
            self.apply_buffer_length(option)
        } else if key_matches(&option.key, OPT_REGEX_FILTER) {
            self.apply_regex_filter(option)
        } else {
            Err(IngestError::Config {
                field: option.key.clone(),
                reason: "option is not allowed here".to_owned(),
            })
        }
    }

    fn apply_listen(&mut self, option: &ConfigOption) -> Result<(), IngestError> {
        match option.values.as_slice() {
            [OptionValue::String(ip), OptionValue::String(port)] => {
                self.listen_ip = Some(ip.clone());
                self.listen_port = Some(port.clone());
                Ok(())
            }
            _ => Err(IngestError::Config {
                field: option.key.clone(),
                reason: format!(
                    "needs two string arguments (ip and port), got [{}]",
                    option.describe_values()
                ),
            }),
        }
    }

    fn apply_buffer_size(&mut self, option: &ConfigOption) -> Result<(), IngestError> {
        let value = option.single_int()?;
        match usize::try_from(value) {
            Ok(size) if (MIN_BUFFER_SIZE..=MAX_BUFFER_SIZE).contains(&size) => {
                self.buffer_size = size;
                Ok(())
            }
            _ => Err(IngestError::Config {
                field: OPT_BUFFER_SIZE.to_owned(),
                reason: format!(
                    "must be between {MIN_BUFFER_SIZE} and {MAX_BUFFER_SIZE}, got {value}"
                ),
            }),
        }
    }

    fn apply_buffer_length(&mut self, option: &ConfigOption) -> Result<(), IngestError> {
        let value = option.single_int()?;
        match usize::try_from(value) {
            Ok(length) if (MIN_BUFFER_LENGTH..=MAX_BUFFER_LENGTH).contains(&length) => {
                self.buffer_length = length;
                Ok(())
            }
            _ => Err(IngestError::Config {
                field: OPT_BUFFER_LENGTH.to_owned(),
                reason: format!(
                    "must be between {MIN_BUFFER_LENGTH} and {MAX_BUFFER_LENGTH}, got {value}"
                ),
            }),
        }
    }

    fn apply_regex_filter(&mut self, option: &ConfigOption) -> Result<(), IngestError> {
        let pattern = match option.values.as_slice() {
            [OptionValue::String(pattern)] => pattern,
            _ => {
                return Err(IngestError::Config {
                    field: option.key.clone(),
                    reason: "needs one string argument, a regular expression".to_owned(),
                });
            }
        };

        // 컴파일 가능한 패턴만 받아들임
        FilterRule::parse(pattern).map_err(|e| IngestError::Config {
            field: OPT_REGEX_FILTER.to_owned(),
            reason: format!("invalid regular expression '{pattern}': {e}"),
        })?;

        self.regex_filters.push(pattern.clone());
        Ok(())
    }

    /// 바인드 주소 (ip, port)를 반환합니다.
    pub fn listen(&self) -> Option<(&str, &str)> {
        match (&self.listen_ip, &self.listen_port) {
            (Some(ip), Some(port)) => Some((ip.as_str(), port.as_str())),
            _ => None,
        }
    }

    /// 초기화 전 필수 설정과 범위를 검증합니다.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.listen().is_none() {
            return Err(IngestError::Config {
                field: OPT_LISTEN.to_owned(),
                reason: "listen ip and port are required".to_owned(),
            });
        }

        if !(MIN_BUFFER_SIZE..=MAX_BUFFER_SIZE).contains(&self.buffer_size) {
            return Err(IngestError::Config {
                field: OPT_BUFFER_SIZE.to_owned(),
                reason: format!("must be between {MIN_BUFFER_SIZE} and {MAX_BUFFER_SIZE}"),
            });
        }

        if !(MIN_BUFFER_LENGTH..=MAX_BUFFER_LENGTH).contains(&self.buffer_length) {
            return Err(IngestError::Config {
                field: OPT_BUFFER_LENGTH.to_owned(),
                reason: format!("must be between {MIN_BUFFER_LENGTH} and {MAX_BUFFER_LENGTH}"),
            });
        }

        Ok(())
    }
}

/// 수집 플러그인 설정 빌더
///
/// 코드에서 직접 설정을 구성할 때 사용합니다. 옵션 단위 경고 대신
/// 첫 번째 잘못된 값에서 에러를 반환합니다.
#[derive(Default)]
pub struct SyseventConfigBuilder {
    options: Vec<ConfigOption>,
}

impl SyseventConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 바인드 주소를 설정합니다.
    pub fn listen(mut self, ip: impl Into<String>, port: impl Into<String>) -> Self {
        self.options.push(ConfigOption::new(
            OPT_LISTEN,
            vec![
                OptionValue::String(ip.into()),
                OptionValue::String(port.into()),
            ],
        ));
        self
    }

    /// 슬롯 폭을 설정합니다.
    pub fn buffer_size(mut self, size: i64) -> Self {
        self.options.push(ConfigOption::integer(OPT_BUFFER_SIZE, size));
        self
    }

    /// 링 버퍼 슬롯 수를 설정합니다.
    pub fn buffer_length(mut self, length: i64) -> Self {
        self.options
            .push(ConfigOption::integer(OPT_BUFFER_LENGTH, length));
        self
    }

    /// 필터 패턴을 추가합니다.
    pub fn regex_filter(mut self, pattern: impl Into<String>) -> Self {
        self.options
            .push(ConfigOption::string(OPT_REGEX_FILTER, pattern));
        self
    }

    /// 설정을 검증하고 `SyseventConfig`를 생성합니다.
    pub fn build(self) -> Result<SyseventConfig, IngestError> {
        let mut config = SyseventConfig::default();
        for option in &self.options {
            config.apply(option)?;
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listen_option() -> ConfigOption {
        ConfigOption::new(
            "Listen",
            vec![
                OptionValue::String("127.0.0.1".to_owned()),
                OptionValue::String("6666".to_owned()),
            ],
        )
    }

    #[test]
    fn defaults() {
        let config = SyseventConfig::default();
        assert_eq!(config.buffer_size, 4096);
        assert_eq!(config.buffer_length, 10);
        assert!(config.regex_filters.is_empty());
        assert!(config.listen().is_none());
    }

    #[test]
    fn default_without_listen_fails_validation() {
        let err = SyseventConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("Listen"));
    }

    #[test]
    fn listen_requires_two_strings() {
        let mut config = SyseventConfig::default();
        config.apply(&listen_option()).unwrap();
        assert_eq!(config.listen(), Some(("127.0.0.1", "6666")));

        let bad = ConfigOption::new(
            "Listen",
            vec![
                OptionValue::String("127.0.0.1".to_owned()),
                OptionValue::Integer(6666),
            ],
        );
        let err = SyseventConfig::default().apply(&bad).unwrap_err();
        assert!(err.to_string().contains("two string arguments"));
    }

    #[test]
    fn buffer_size_range_is_enforced() {
        let mut config = SyseventConfig::default();
        assert!(config.apply(&ConfigOption::integer("BufferSize", 1023)).is_err());
        assert!(config.apply(&ConfigOption::integer("BufferSize", 65536)).is_err());
        assert_eq!(config.buffer_size, 4096);

        config.apply(&ConfigOption::integer("BufferSize", 1024)).unwrap();
        assert_eq!(config.buffer_size, 1024);
        config.apply(&ConfigOption::integer("BufferSize", 65535)).unwrap();
        assert_eq!(config.buffer_size, 65535);
    }

    #[test]
    fn buffer_length_range_is_enforced() {
        let mut config = SyseventConfig::default();
        assert!(config.apply(&ConfigOption::integer("BufferLength", 2)).is_err());
        assert!(config.apply(&ConfigOption::integer("BufferLength", 4097)).is_err());
        assert!(config.apply(&ConfigOption::integer("BufferLength", -5)).is_err());
        assert_eq!(config.buffer_length, 10);

        config.apply(&ConfigOption::integer("BufferLength", 3)).unwrap();
        assert_eq!(config.buffer_length, 3);
    }

    #[test]
    fn buffer_size_rejects_non_integer() {
        let mut config = SyseventConfig::default();
        let err = config
            .apply(&ConfigOption::string("BufferSize", "big"))
            .unwrap_err();
        assert!(err.to_string().contains("integer"));

        config
            .apply(&ConfigOption::new("BufferSize", vec![OptionValue::Float(2048.0)]))
            .unwrap();
        assert_eq!(config.buffer_size, 2048);
    }

    #[test]
    fn regex_filter_is_repeatable() {
        let mut config = SyseventConfig::default();
        config.apply(&ConfigOption::string("RegexFilter", "/error/")).unwrap();
        config.apply(&ConfigOption::string("RegexFilter", "kernel")).unwrap();
        assert_eq!(config.regex_filters, vec!["/error/", "kernel"]);
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let mut config = SyseventConfig::default();
        let err = config
            .apply(&ConfigOption::string("RegexFilter", "/(unclosed/"))
            .unwrap_err();
        assert!(err.to_string().contains("invalid regular expression"));
        assert!(config.regex_filters.is_empty());
    }

    #[test]
    fn unknown_option_is_rejected_but_others_apply() {
        let mut config = SyseventConfig::default();
        let rejected = config.configure(&[
            ConfigOption::string("Interface", "eth0"),
            listen_option(),
            ConfigOption::integer("BufferLength", 1),
            ConfigOption::integer("BufferSize", 2048),
        ]);

        assert_eq!(rejected.len(), 2);
        assert_eq!(config.listen(), Some(("127.0.0.1", "6666")));
        assert_eq!(config.buffer_size, 2048);
        assert_eq!(config.buffer_length, 10);
        config.validate().unwrap();
    }

    #[test]
    fn key_matching_is_case_and_separator_insensitive() {
        assert!(key_matches("BufferSize", "BufferSize"));
        assert!(key_matches("buffer_size", "BufferSize"));
        assert!(key_matches("BUFFER-SIZE", "BufferSize"));
        assert!(key_matches("regexfilter", "RegexFilter"));
        assert!(!key_matches("buffer_sizes", "BufferSize"));
    }

    #[test]
    fn from_table_expands_repeated_regex_filter() {
        let table: toml::Table = toml::from_str(
            r#"
listen = ["0.0.0.0", "514"]
buffer_length = 16
regex_filter = ["/error/", "/fail/"]
"#,
        )
        .unwrap();

        let (config, rejected) = SyseventConfig::from_table(&table);
        assert!(rejected.is_empty());
        assert_eq!(config.listen(), Some(("0.0.0.0", "514")));
        assert_eq!(config.buffer_length, 16);
        assert_eq!(config.regex_filters.len(), 2);
    }

    #[test]
    fn from_table_reports_ill_typed_values() {
        let table: toml::Table = toml::from_str(
            r#"
Listen = ["0.0.0.0", "514"]
BufferSize = "huge"
Nested = { a = 1 }
"#,
        )
        .unwrap();

        let (config, rejected) = SyseventConfig::from_table(&table);
        assert_eq!(rejected.len(), 2);
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
        assert!(config.listen().is_some());
    }

    #[test]
    fn builder_creates_valid_config() {
        let config = SyseventConfigBuilder::new()
            .listen("::1", "5514")
            .buffer_size(2048)
            .buffer_length(3)
            .regex_filter("/sshd/")
            .build()
            .unwrap();
        assert_eq!(config.buffer_size, 2048);
        assert_eq!(config.buffer_length, 3);
        assert_eq!(config.regex_filters, vec!["/sshd/"]);
    }

    #[test]
    fn builder_rejects_out_of_range() {
        let result = SyseventConfigBuilder::new()
            .listen("127.0.0.1", "6666")
            .buffer_size(100)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_requires_listen() {
        assert!(SyseventConfigBuilder::new().build().is_err());
    }
}
