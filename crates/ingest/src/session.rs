//! 수집 세션 -- 생명주기 관리 및 [`Plugin`] 구현
//!
//! [`IngestSession`]은 소켓, 링 버퍼, 리스너 태스크, 리더를 하나로 소유합니다.
//! 전역 상태 없이 데몬이 세션 인스턴스를 보유하고 주기적으로 `read()`를 호출합니다.
//!
//! # 사용 예시
//! ```ignore
//! use sysevent_core::Plugin;
//! use sysevent_ingest::{IngestSessionBuilder, SyseventConfigBuilder};
//!
//! let config = SyseventConfigBuilder::new().listen("0.0.0.0", "6666").build()?;
//! let (mut session, notification_rx) = IngestSessionBuilder::new()
//!     .config(config)
//!     .hostname("collector-01")
//!     .build()?;
//!
//! session.init().await?;
//! session.read().await?;
//! session.shutdown().await?;
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use sysevent_core::error::{PluginError, SyseventError};
use sysevent_core::metrics as m;
use sysevent_core::pipeline::HealthStatus;
use sysevent_core::plugin::{Plugin, PluginInfo, PluginState};

use crate::config::SyseventConfig;
use crate::error::IngestError;
use crate::event::{EventBuilder, NotificationEvent};
use crate::filter::MessageFilter;
use crate::listener::{Listener, ListenerState};
use crate::reader::{CycleSummary, Reader};
use crate::ring::{RingBuffer, SharedRing, SharedState};

/// 플러그인 이름
pub const PLUGIN_NAME: &str = "sysevent";

/// 알림 채널 기본 용량
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 1024;

/// 기본 로컬 호스트 이름
pub const DEFAULT_HOSTNAME: &str = "localhost";

/// 느린 드레인 기록 임계값
const SLOW_DRAIN_THRESHOLD: Duration = Duration::from_millis(1);

/// syslog 수집 세션
pub struct IngestSession {
    info: PluginInfo,
    state: PluginState,
    config: SyseventConfig,
    socket: Option<Arc<UdpSocket>>,
    local_addr: Option<SocketAddr>,
    shared: SharedRing,
    listener: Option<Listener>,
    reader: Reader,
    restarts: u64,
    last_summary: CycleSummary,
}

impl IngestSession {
    /// 설정을 반환합니다.
    pub fn config(&self) -> &SyseventConfig {
        &self.config
    }

    /// 바인드된 로컬 주소를 반환합니다 (init 전에는 `None`).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// 리스너 재시작 횟수를 반환합니다.
    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    /// 마지막 읽기 주기 요약을 반환합니다.
    pub fn last_summary(&self) -> CycleSummary {
        self.last_summary
    }

    /// 마지막으로 발급한 이벤트 ID를 반환합니다.
    pub fn last_event_id(&self) -> u64 {
        self.reader.last_event_id()
    }

    /// 현재 리스너 상태를 반환합니다.
    pub fn listener_state(&self) -> ListenerState {
        self.listener
            .as_ref()
            .map_or(ListenerState::Stopped, Listener::state)
    }

    /// 링 버퍼에 대기 중인 엔트리 수를 반환합니다.
    pub fn pending(&self) -> usize {
        self.shared.lock().ring.as_ref().map_or(0, RingBuffer::len)
    }

    /// 리스너 에러 플래그가 서 있는지 확인합니다.
    pub fn listener_failed(&self) -> bool {
        self.shared.lock().listener_error
    }

    /// 주소를 해석하고 소켓을 바인드합니다.
    async fn bind(&self) -> Result<UdpSocket, IngestError> {
        let (ip, port) = self.config.listen().ok_or_else(|| IngestError::Config {
            field: "Listen".to_owned(),
            reason: "listen ip and port are required".to_owned(),
        })?;
        let display = format!("{ip}:{port}");

        let port: u16 = port.parse().map_err(|_| IngestError::Socket {
            addr: display.clone(),
            reason: format!(
                "invalid port '{port}': must be numeric, service names are not resolved"
            ),
        })?;

        let candidates: Vec<SocketAddr> = tokio::net::lookup_host((ip, port))
            .await
            .map_err(|e| IngestError::Socket {
                addr: display.clone(),
                reason: format!("failed to resolve address: {e}"),
            })?
            .collect();

        let mut last_error = None;
        for addr in candidates {
            match UdpSocket::bind(addr).await {
                Ok(socket) => return Ok(socket),
                Err(e) => {
                    debug!(addr = %addr, error = %e, "bind attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(IngestError::Socket {
            addr: display,
            reason: last_error.map_or_else(
                || "address resolved to no candidates".to_owned(),
                |e| format!("failed to bind: {e}"),
            ),
        })
    }

    /// 한 번의 읽기 주기를 수행하고 요약을 반환합니다.
    ///
    /// 리스너가 에러 상태이면 드레인 없이 리스너를 재시작하고
    /// [`IngestError::ListenerRestarted`]를 반환합니다.
    ///
    /// 알림 채널이 가득 차면 수신측이 비울 때까지 기다리므로,
    /// 수신측은 읽기 주기와 동시에 소비되어야 합니다.
    pub async fn read_cycle(&mut self) -> Result<CycleSummary, IngestError> {
        if self.listener_failed() {
            self.restart_listener().await?;
            return Err(IngestError::ListenerRestarted);
        }

        let started = Instant::now();
        let events = {
            let mut guard = self.shared.lock();
            guard
                .ring
                .as_mut()
                .map(RingBuffer::drain_all)
                .unwrap_or_default()
        };
        let elapsed = started.elapsed();
        if elapsed > SLOW_DRAIN_THRESHOLD {
            debug!(
                elapsed_us = elapsed.as_micros() as u64,
                entries = events.len(),
                "slow ring drain"
            );
        }
        metrics::gauge!(m::RING_PENDING).set(0.0);

        let summary = self.reader.process(events).await;
        self.last_summary = summary;
        Ok(summary)
    }

    /// 종료된 리스너를 정리하고 새 리스너를 시작합니다.
    async fn restart_listener(&mut self) -> Result<(), IngestError> {
        if let Some(listener) = self.listener.take() {
            if let Err(e) = listener.stop().await {
                warn!(error = %e, "failed to stop listener cleanly");
            }
        }

        let socket = self.socket.clone().ok_or_else(|| {
            IngestError::Receive("socket closed, cannot restart listener".to_owned())
        })?;

        self.shared.lock().listener_error = false;
        self.listener = Some(Listener::spawn(
            socket,
            Arc::clone(&self.shared),
            self.config.buffer_size,
        ));

        self.restarts += 1;
        metrics::counter!(m::LISTENER_RESTARTS_TOTAL).increment(1);
        warn!(restarts = self.restarts, "listener restarted after receive error");
        Ok(())
    }

    async fn init_inner(&mut self) -> Result<(), IngestError> {
        self.config.validate()?;

        let socket = self.bind().await?;
        self.local_addr = socket.local_addr().ok();
        let socket = Arc::new(socket);

        {
            let mut shared = self.shared.lock();
            shared.ring = Some(RingBuffer::new(
                self.config.buffer_length,
                self.config.buffer_size,
            ));
            shared.listener_error = false;
        }

        self.listener = Some(Listener::spawn(
            Arc::clone(&socket),
            Arc::clone(&self.shared),
            self.config.buffer_size,
        ));
        self.socket = Some(socket);
        Ok(())
    }

    fn not_initialized(&self) -> SyseventError {
        PluginError::NotInitialized {
            name: self.info.name.clone(),
        }
        .into()
    }
}

impl Plugin for IngestSession {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn state(&self) -> PluginState {
        self.state
    }

    async fn init(&mut self) -> Result<(), SyseventError> {
        if self.state != PluginState::Created {
            return Err(PluginError::AlreadyInitialized {
                name: self.info.name.clone(),
            }
            .into());
        }

        match self.init_inner().await {
            Ok(()) => {
                self.state = PluginState::Running;
                info!(
                    addr = ?self.local_addr,
                    buffer_size = self.config.buffer_size,
                    buffer_length = self.config.buffer_length,
                    filters = self.reader.filter().len(),
                    "sysevent session initialized"
                );
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "sysevent session init failed");
                self.state = PluginState::Failed;
                self.shared.lock().ring = None;
                Err(e.into())
            }
        }
    }

    async fn read(&mut self) -> Result<(), SyseventError> {
        if self.state != PluginState::Running {
            return Err(self.not_initialized());
        }

        self.read_cycle().await.map(|_| ()).map_err(SyseventError::from)
    }

    async fn shutdown(&mut self) -> Result<(), SyseventError> {
        info!("shutting down sysevent session");

        let result = match self.listener.take() {
            Some(listener) => listener.abort().await,
            None => Ok(()),
        };

        self.socket = None;
        {
            let mut shared = self.shared.lock();
            shared.ring = None;
            shared.listener_error = false;
        }
        self.state = PluginState::Stopped;

        if let Err(e) = &result {
            error!(error = %e, "sysevent session shutdown failed");
        }
        result.map_err(SyseventError::from)
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PluginState::Running if self.listener_failed() => HealthStatus::Degraded(
                "listener stopped after receive error, restart pending".to_owned(),
            ),
            PluginState::Running => HealthStatus::Healthy,
            other => HealthStatus::Unhealthy(other.to_string()),
        }
    }
}

impl Drop for IngestSession {
    fn drop(&mut self) {
        if let Some(listener) = &self.listener {
            listener.cancel();
        }
    }
}

/// 수집 세션 빌더
///
/// 알림 싱크를 지정하지 않으면 새 채널을 생성하고 수신측을 함께 반환합니다.
pub struct IngestSessionBuilder {
    config: SyseventConfig,
    hostname: String,
    notification_tx: Option<mpsc::Sender<NotificationEvent>>,
    notification_capacity: usize,
}

impl IngestSessionBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: SyseventConfig::default(),
            hostname: DEFAULT_HOSTNAME.to_owned(),
            notification_tx: None,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }

    /// 수집 설정을 지정합니다.
    pub fn config(mut self, config: SyseventConfig) -> Self {
        self.config = config;
        self
    }

    /// 로컬 호스트 이름을 지정합니다.
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// 외부 알림 전송 채널을 설정합니다.
    pub fn notification_sender(mut self, tx: mpsc::Sender<NotificationEvent>) -> Self {
        self.notification_tx = Some(tx);
        self
    }

    /// 알림 채널 용량을 설정합니다 (외부 채널 미사용 시).
    pub fn notification_capacity(mut self, capacity: usize) -> Self {
        self.notification_capacity = capacity;
        self
    }

    /// 세션을 빌드합니다.
    ///
    /// # Returns
    /// - `IngestSession`: 세션 인스턴스 (`Created` 상태)
    /// - `Option<mpsc::Receiver<NotificationEvent>>`: 알림 수신 채널
    ///   (외부 notification_sender를 설정한 경우 None)
    pub fn build(
        self,
    ) -> Result<(IngestSession, Option<mpsc::Receiver<NotificationEvent>>), IngestError> {
        self.config.validate()?;

        if self.hostname.trim().is_empty() {
            return Err(IngestError::Config {
                field: "hostname".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        let filter = MessageFilter::from_patterns(&self.config.regex_filters)?;

        let (notification_tx, notification_rx) = match self.notification_tx {
            Some(tx) => (tx, None),
            None => {
                let (tx, rx) = mpsc::channel(self.notification_capacity.max(1));
                (tx, Some(rx))
            }
        };

        let builder = EventBuilder::new(self.hostname, self.config.buffer_size);

        let session = IngestSession {
            info: PluginInfo {
                name: PLUGIN_NAME.to_owned(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                description: "syslog datagram ingestion to structured notifications".to_owned(),
            },
            state: PluginState::Created,
            config: self.config,
            socket: None,
            local_addr: None,
            shared: Arc::new(parking_lot::Mutex::new(SharedState::default())),
            listener: None,
            reader: Reader::new(filter, builder, notification_tx),
            restarts: 0,
            last_summary: CycleSummary::default(),
        };

        Ok((session, notification_rx))
    }
}

impl Default for IngestSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
