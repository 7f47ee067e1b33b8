//! 에러 타입 -- 도메인별 에러 정의

/// sysevent 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum SyseventError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 플러그인 생명주기 에러
    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 읽기 주기 실패 (다음 주기에 재시도)
    #[error("read cycle failed: {0}")]
    ReadFailed(String),

    /// 종료 처리 실패
    #[error("shutdown failed: {0}")]
    ShutdownFailed(String),
}

/// 플러그인 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// 이미 초기화됨
    #[error("plugin '{name}' is already initialized")]
    AlreadyInitialized { name: String },

    /// 초기화되지 않음
    #[error("plugin '{name}' is not initialized")]
    NotInitialized { name: String },
}
