//! 수집 코어 에러 타입
//!
//! [`IngestError`]는 수신, 버퍼링, 파싱, 이벤트 생성, 설정 적용 중 발생하는
//! 모든 에러를 표현합니다. `From<IngestError> for SyseventError` 변환이
//! 구현되어 있어 데몬에서 `?` 연산자로 전파할 수 있습니다.
//!
//! 정상 운영 경로(수신/파싱/필터/생성/전달)의 에러는 모두 로그로 남기고
//! 해당 메시지만 버립니다. 호출자에게 실패로 보고되는 것은 초기화 시점의
//! 소켓 에러, 리스너 재시작이 필요한 읽기 주기, 종료 실패뿐입니다.

use sysevent_core::error::{ConfigError, PipelineError, SyseventError};

/// 수집 코어 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// 주소 해석/소켓 열기/바인드 실패 (초기화 시 치명적)
    #[error("socket error: {addr}: {reason}")]
    Socket {
        /// 대상 주소 (ip:port)
        addr: String,
        /// 실패 사유
        reason: String,
    },

    /// 수신 실패 (리스너 종료, 다음 읽기 주기에서 재시작)
    #[error("receive error: {0}")]
    Receive(String),

    /// 데이터그램이 버퍼 폭 이상
    #[error("datagram too large: {size} bytes (buffer width: {width})")]
    OversizedDatagram {
        /// 수신 크기
        size: usize,
        /// 슬롯 폭
        width: usize,
    },

    /// 링 버퍼에 빈 슬롯 없음
    #[error("ring buffer full: capacity {capacity}")]
    RingFull {
        /// 논리 슬롯 수
        capacity: usize,
    },

    /// 구조화 페이로드 파싱 실패 (원문 처리로 대체)
    #[error("parse error at offset {offset}: {reason}")]
    Parse {
        /// 실패 위치 (컬럼)
        offset: usize,
        /// 실패 사유
        reason: String,
    },

    /// 알림 페이로드 생성 실패
    #[error("event build error: {0}")]
    Build(String),

    /// 알림 전달 실패 (싱크 닫힘)
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// 설정 옵션 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 옵션 이름
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 리스너가 에러 상태여서 재시작함 (해당 읽기 주기 실패)
    #[error("listener restarted after error")]
    ListenerRestarted,

    /// 종료 처리 실패
    #[error("shutdown error: {0}")]
    Shutdown(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<IngestError> for SyseventError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Config { field, reason } => {
                SyseventError::Config(ConfigError::InvalidValue { field, reason })
            }
            IngestError::Socket { .. } => {
                SyseventError::Pipeline(PipelineError::InitFailed(err.to_string()))
            }
            IngestError::Shutdown(reason) => {
                SyseventError::Pipeline(PipelineError::ShutdownFailed(reason))
            }
            IngestError::Io(e) => SyseventError::Io(e),
            other => SyseventError::Pipeline(PipelineError::ReadFailed(other.to_string())),
        }
    }
}
