//! # sysevent-ingest
//!
//! syslog 데이터그램을 UDP 소켓으로 수신하여 링 버퍼에 보관하고,
//! 주기적인 읽기 주기마다 구조화 알림 이벤트로 변환하여 전달합니다.
//!
//! # 모듈 구성
//!
//! - [`ring`]: 고정 용량 원형 큐 (단일 생산자/단일 소비자, 슬롯 아레나)
//! - [`listener`]: UDP 수신 루프 태스크 (취소 가능한 수신 대기)
//! - [`parser`]: JSON 구조화 페이로드 파서
//! - [`filter`]: 화이트리스트 방식 메시지 필터
//! - [`event`]: 알림 이벤트 모델 및 빌더
//! - [`reader`]: 드레인 -> 파싱 -> 필터 -> 생성 -> 전달
//! - [`session`]: 생명주기 관리 ([`Plugin`](sysevent_core::Plugin) 구현)
//! - [`config`]: 옵션 단위 설정 적용
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! UdpSocket -> Listener -> RingBuffer -> Reader -> {parse -> filter -> build} -> mpsc sink
//!                 |            |            |
//!            recv task    Mutex guard   read() 주기마다 드레인
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod filter;
pub mod listener;
pub mod parser;
pub mod reader;
pub mod ring;
pub mod session;

// 주요 타입 re-export
pub use config::{ConfigOption, OptionValue, SyseventConfig, SyseventConfigBuilder};
pub use error::IngestError;
pub use event::{EventBuilder, NotificationEvent, NotificationSeverity, Priority};
pub use filter::{FilterDecision, MessageFilter};
pub use listener::{Listener, ListenerState};
pub use parser::ParsedEvent;
pub use reader::{CycleSummary, Reader};
pub use ring::{RawEvent, RingBuffer};
pub use session::{IngestSession, IngestSessionBuilder};
