//! 설정 관리 -- sysevent.toml 파싱 및 런타임 설정
//!
//! [`DaemonConfig`]는 데몬 전체 설정을 담는 최상위 구조체입니다.
//! `[sysevent]` 섹션은 옵션 테이블 그대로 보관하며, 옵션별 검증과 적용은
//! 수집 코어(`sysevent-ingest`)가 담당합니다. 잘못된 옵션 하나가 나머지
//! 옵션의 적용을 막지 않도록 하기 위해서입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`SYSEVENT_GENERAL_LOG_LEVEL=debug` 형식)
//! 3. 설정 파일 (`sysevent.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), sysevent_core::error::SyseventError> {
//! use sysevent_core::config::DaemonConfig;
//!
//! let config = DaemonConfig::load("/etc/sysevent/sysevent.toml").await?;
//! let config = DaemonConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, SyseventError};

/// 읽기 주기 최대값 (초)
const MAX_INTERVAL_SECS: u64 = 3600;

/// sysevent 데몬 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// 수집 플러그인 옵션 테이블 (`Listen`, `BufferSize`, ...)
    #[serde(default)]
    pub sysevent: toml::Table,
}

impl DaemonConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SyseventError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, SyseventError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SyseventError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                SyseventError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, SyseventError> {
        toml::from_str(toml_str).map_err(|e| {
            SyseventError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `SYSEVENT_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "SYSEVENT_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "SYSEVENT_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.hostname, "SYSEVENT_GENERAL_HOSTNAME");
        override_u64(
            &mut self.general.interval_secs,
            "SYSEVENT_GENERAL_INTERVAL_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "SYSEVENT_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "SYSEVENT_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "SYSEVENT_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// `[sysevent]` 옵션은 여기서 검증하지 않습니다 (수집 코어가 옵션 단위로 처리).
    pub fn validate(&self) -> Result<(), SyseventError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.general.hostname.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "general.hostname".to_owned(),
                reason: "hostname must not be empty".to_owned(),
            }
            .into());
        }

        if self.general.interval_secs == 0 || self.general.interval_secs > MAX_INTERVAL_SECS {
            return Err(ConfigError::InvalidValue {
                field: "general.interval_secs".to_owned(),
                reason: format!("must be 1-{MAX_INTERVAL_SECS}"),
            }
            .into());
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "metrics.port".to_owned(),
                reason: "port must not be 0 when metrics are enabled".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 로컬 호스트명 (페이로드에 호스트가 없을 때 사용)
    pub hostname: String,
    /// 읽기 주기 (초)
    pub interval_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            hostname: "localhost".to_owned(),
            interval_secs: 10,
        }
    }
}

/// 메트릭 엔드포인트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// 스크레이프 경로 (현재 `/metrics`만 지원)
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = DaemonConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.general.interval_secs, 10);
        assert!(!config.metrics.enabled);
        assert!(config.sysevent.is_empty());
    }

    #[test]
    fn default_config_passes_validation() {
        DaemonConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = DaemonConfig::parse("").unwrap();
        assert_eq!(config.general.hostname, "localhost");
        assert_eq!(config.metrics.endpoint, "/metrics");
    }

    #[test]
    fn parse_keeps_sysevent_table_verbatim() {
        let toml = r#"
[general]
hostname = "collector-01"
interval_secs = 2

[sysevent]
Listen = ["127.0.0.1", "6666"]
BufferSize = 1024
regex_filter = ["/error/", "/fail/"]
Bogus = true
"#;
        let config = DaemonConfig::parse(toml).unwrap();
        assert_eq!(config.general.hostname, "collector-01");
        assert_eq!(config.general.interval_secs, 2);
        assert_eq!(config.sysevent.len(), 4);
        assert!(config.sysevent.contains_key("Bogus"));
        assert_eq!(
            config.sysevent.get("BufferSize").and_then(|v| v.as_integer()),
            Some(1024)
        );
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let err = DaemonConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            SyseventError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = DaemonConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = DaemonConfig::default();
        config.general.log_format = "xml".to_owned();
        assert!(config.validate().unwrap_err().to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = DaemonConfig::default();
        config.general.interval_secs = 0;
        assert!(config.validate().unwrap_err().to_string().contains("interval_secs"));
    }

    #[test]
    fn validate_rejects_blank_hostname() {
        let mut config = DaemonConfig::default();
        config.general.hostname = "  ".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn env_override_applies_to_general_and_metrics() {
        let mut config = DaemonConfig::default();
        // SAFETY: #[serial]로 환경변수를 조작하는 테스트를 직렬화합니다.
        unsafe {
            std::env::set_var("SYSEVENT_GENERAL_HOSTNAME", "edge-7");
            std::env::set_var("SYSEVENT_METRICS_PORT", "19200");
        }
        config.apply_env_overrides();
        assert_eq!(config.general.hostname, "edge-7");
        assert_eq!(config.metrics.port, 19200);
        unsafe {
            std::env::remove_var("SYSEVENT_GENERAL_HOSTNAME");
            std::env::remove_var("SYSEVENT_METRICS_PORT");
        }
    }

    #[test]
    #[serial]
    fn env_override_invalid_number_keeps_original() {
        let mut val = 10_u64;
        // SAFETY: #[serial]로 환경변수를 조작하는 테스트를 직렬화합니다.
        unsafe { std::env::set_var("TEST_SYSEVENT_U64_BAD", "ten") };
        override_u64(&mut val, "TEST_SYSEVENT_U64_BAD");
        assert_eq!(val, 10);
        unsafe { std::env::remove_var("TEST_SYSEVENT_U64_BAD") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_SYSEVENT_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = DaemonConfig::from_file("/nonexistent/path/sysevent.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyseventError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sysevent.toml");
        std::fs::write(
            &path,
            "[general]\nlog_format = \"pretty\"\n[sysevent]\nListen = [\"0.0.0.0\", \"514\"]\n",
        )
        .unwrap();

        let config = DaemonConfig::from_file(&path).await.unwrap();
        assert_eq!(config.general.log_format, "pretty");
        assert!(config.sysevent.contains_key("Listen"));
    }
}
