//! 플러그인 생명주기 -- 읽기(read) 플러그인 trait
//!
//! 수집 플러그인은 외부 스케줄러가 고정 주기로 `read()`를 호출하는 모델을 따릅니다.
//! 데몬은 [`Plugin`]을 구현한 타입을 `init()` 후 주기적으로 `read()`하고,
//! 종료 시 `shutdown()`을 호출합니다.
//!
//! # 생명주기
//! ```text
//! Created → init() → Running → read()* → shutdown() → Stopped
//!                      └── init 실패 → Failed
//! ```

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::SyseventError;
use crate::pipeline::HealthStatus;

// ─── PluginInfo ──────────────────────────────────────────────────────

/// 플러그인 메타데이터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    /// 플러그인 고유 이름 (예: `"sysevent"`)
    pub name: String,
    /// 플러그인 버전 (semver)
    pub version: String,
    /// 플러그인 설명
    pub description: String,
}

// ─── PluginState ─────────────────────────────────────────────────────

/// 플러그인 생명주기 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginState {
    /// 생성됨 (init 전)
    Created,
    /// 초기화 완료, read 가능
    Running,
    /// 종료됨
    Stopped,
    /// 초기화 실패
    Failed,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ─── Plugin Trait ────────────────────────────────────────────────────

/// 주기적으로 읽히는 플러그인 trait
///
/// # 구현 예시
/// ```ignore
/// impl Plugin for MyPlugin {
///     fn info(&self) -> &PluginInfo { &self.info }
///     fn state(&self) -> PluginState { self.state }
///
///     async fn init(&mut self) -> Result<(), SyseventError> { Ok(()) }
///     async fn read(&mut self) -> Result<(), SyseventError> { Ok(()) }
///     async fn shutdown(&mut self) -> Result<(), SyseventError> { Ok(()) }
///     async fn health_check(&self) -> HealthStatus { HealthStatus::Healthy }
/// }
/// ```
pub trait Plugin: Send + Sync {
    /// 플러그인 메타데이터를 반환합니다.
    fn info(&self) -> &PluginInfo;

    /// 현재 플러그인 상태를 반환합니다.
    fn state(&self) -> PluginState;

    /// 리소스를 할당하고 수집을 시작합니다.
    ///
    /// `Created` 상태에서만 호출 가능합니다.
    fn init(&mut self) -> impl Future<Output = Result<(), SyseventError>> + Send;

    /// 한 번의 읽기 주기를 수행합니다.
    ///
    /// 실패는 해당 주기에만 영향을 주며, 다음 주기는 정상적으로 호출됩니다.
    fn read(&mut self) -> impl Future<Output = Result<(), SyseventError>> + Send;

    /// 수집을 중단하고 리소스를 해제합니다.
    fn shutdown(&mut self) -> impl Future<Output = Result<(), SyseventError>> + Send;

    /// 플러그인의 건강 상태를 확인합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}
