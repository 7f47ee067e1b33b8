//! sysevent 공통 크레이트
//!
//! 수집 코어(`sysevent-ingest`)와 데몬(`sysevent-daemon`)이 함께 사용하는
//! 에러 타입, 설정 구조체, 메트릭 이름, 플러그인 생명주기 trait을 정의합니다.
//!
//! # 모듈 구성
//!
//! - [`error`]: 최상위 에러 타입
//! - [`config`]: `sysevent.toml` 파싱 및 환경변수 오버라이드
//! - [`metrics`]: Prometheus 메트릭 이름 상수
//! - [`pipeline`]: 헬스 상태 타입
//! - [`plugin`]: init/read/shutdown 생명주기 trait

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod plugin;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, PipelineError, PluginError, SyseventError};

// 설정
pub use config::{DaemonConfig, GeneralConfig, MetricsConfig};

// 헬스 상태 / 플러그인
pub use pipeline::HealthStatus;
pub use plugin::{Plugin, PluginInfo, PluginState};
