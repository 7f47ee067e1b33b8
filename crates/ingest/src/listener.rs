//! UDP 리스너 -- 데이터그램 수신 루프
//!
//! 바인드된 소켓에서 데이터그램을 하나씩 받아 링 버퍼에 넣습니다.
//!
//! - 수신 에러: 공유 에러 플래그를 세우고 루프 종료 (재시작은 리더 담당)
//! - 버퍼 폭 이상 데이터그램: 경고 후 폐기
//! - 링 가득 참: 경고 후 폐기
//! - 매 반복 후 1ms 휴지
//!
//! # 상태 전이
//! ```text
//! Stopped -> Running -> (Error | StopRequested) -> Exiting -> Stopped
//! ```
//!
//! 수신 대기는 `CancellationToken`과 `tokio::select!`로 경합하므로
//! 협조적 정지도 데이터그램 도착을 기다리지 않고 완료됩니다.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use sysevent_core::metrics as m;

use crate::error::IngestError;
use crate::ring::SharedRing;

/// 반복 사이 휴지 시간
const LOOP_PAUSE: Duration = Duration::from_millis(1);

/// 느린 잠금 획득 기록 임계값
const SLOW_LOCK_THRESHOLD: Duration = Duration::from_millis(1);

/// 리스너 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// 정지됨
    Stopped,
    /// 수신 중
    Running,
    /// 수신 에러로 루프 종료
    Error,
    /// 정지 요청됨
    StopRequested,
    /// 종료 처리 중
    Exiting,
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Running => write!(f, "running"),
            Self::Error => write!(f, "error"),
            Self::StopRequested => write!(f, "stop_requested"),
            Self::Exiting => write!(f, "exiting"),
        }
    }
}

/// Unix epoch 기준 현재 시각 (마이크로초)
pub fn epoch_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// 실행 중인 리스너 태스크 핸들
pub struct Listener {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    state: Arc<Mutex<ListenerState>>,
}

impl Listener {
    /// 수신 루프를 새 태스크로 시작합니다.
    ///
    /// `buffer_size`는 수신 버퍼 크기이자 허용 데이터그램 크기 상한(미만)입니다.
    pub fn spawn(socket: Arc<UdpSocket>, shared: SharedRing, buffer_size: usize) -> Self {
        let cancel = CancellationToken::new();
        let state = Arc::new(Mutex::new(ListenerState::Running));

        let handle = tokio::spawn(receive_loop(
            socket,
            shared,
            buffer_size,
            cancel.clone(),
            Arc::clone(&state),
        ));

        Self {
            cancel,
            handle,
            state,
        }
    }

    /// 현재 상태를 반환합니다.
    pub fn state(&self) -> ListenerState {
        *self.state.lock()
    }

    /// 태스크가 종료되었는지 확인합니다.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// 협조적 정지: 루프에 정지를 요청하고 종료를 기다립니다.
    ///
    /// 수신 대기 중이어도 즉시 깨어나므로 지연은 한 번의 반복으로 제한됩니다.
    pub async fn stop(self) -> Result<(), IngestError> {
        {
            let mut state = self.state.lock();
            if *state == ListenerState::Running {
                *state = ListenerState::StopRequested;
            }
        }
        self.cancel.cancel();

        let result = self.handle.await;
        *self.state.lock() = ListenerState::Stopped;

        result.map_err(|e| IngestError::Shutdown(format!("listener task failed: {e}")))
    }

    /// 종료를 기다리지 않고 태스크를 취소합니다.
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.handle.abort();
    }

    /// 강제 정지: 태스크를 즉시 취소합니다 (진행 중인 수신도 중단).
    pub async fn abort(self) -> Result<(), IngestError> {
        self.cancel.cancel();
        self.handle.abort();

        let result = self.handle.await;
        *self.state.lock() = ListenerState::Stopped;

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(IngestError::Shutdown(format!(
                "listener task failed: {e}"
            ))),
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("state", &self.state())
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// 리스너 루프 본체
async fn receive_loop(
    socket: Arc<UdpSocket>,
    shared: SharedRing,
    buffer_size: usize,
    cancel: CancellationToken,
    state: Arc<Mutex<ListenerState>>,
) {
    let mut buf = vec![0u8; buffer_size];

    match socket.local_addr() {
        Ok(addr) => info!(addr = %addr, buffer_size, "sysevent listener started"),
        Err(_) => info!(buffer_size, "sysevent listener started"),
    }

    loop {
        let received = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                set_state(&state, ListenerState::StopRequested);
                break;
            }
            result = socket.recv_from(&mut buf) => result,
        };

        match received {
            Err(e) => {
                error!(error = %e, "failed to receive datagram, listener exiting");
                shared.lock().listener_error = true;
                set_state(&state, ListenerState::Error);
                break;
            }
            Ok((count, peer)) => {
                metrics::counter!(m::DATAGRAMS_RECEIVED_TOTAL).increment(1);
                trace!(bytes = count, peer = %peer, "datagram received");

                if count >= buffer_size {
                    warn!(
                        size = count,
                        max = buffer_size,
                        "datagram too large for buffer, discarded"
                    );
                    metrics::counter!(m::DATAGRAMS_DROPPED_TOTAL, m::LABEL_REASON => m::REASON_OVERSIZED)
                        .increment(1);
                } else {
                    store(&shared, &buf[..count]);
                }
            }
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                set_state(&state, ListenerState::StopRequested);
                break;
            }
            () = tokio::time::sleep(LOOP_PAUSE) => {}
        }
    }

    set_state(&state, ListenerState::Exiting);
    debug!("sysevent listener exiting");
}

/// 링에 페이로드를 넣습니다. 잠금은 이 함수 안에서만 유지됩니다.
fn store(shared: &SharedRing, payload: &[u8]) {
    let timestamp = epoch_micros();
    let started = Instant::now();

    let (outcome, pending) = {
        let mut guard = shared.lock();
        let waited = started.elapsed();
        if waited > SLOW_LOCK_THRESHOLD {
            debug!(waited_us = waited.as_micros() as u64, "slow ring lock acquisition");
        }
        match guard.ring.as_mut() {
            Some(ring) => {
                let outcome = ring.enqueue(payload, timestamp);
                (outcome, ring.len())
            }
            None => (
                Err(IngestError::Receive("ring buffer not allocated".to_owned())),
                0,
            ),
        }
    };

    match outcome {
        Ok(()) => {
            metrics::gauge!(m::RING_PENDING).set(pending as f64);
        }
        Err(IngestError::RingFull { capacity }) => {
            warn!(capacity, "ring buffer full, datagram dropped");
            metrics::counter!(m::DATAGRAMS_DROPPED_TOTAL, m::LABEL_REASON => m::REASON_RING_FULL)
                .increment(1);
        }
        Err(e) => {
            warn!(error = %e, "datagram dropped");
        }
    }
}

fn set_state(state: &Mutex<ListenerState>, next: ListenerState) {
    *state.lock() = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::shared_ring;

    async fn bound_socket() -> Arc<UdpSocket> {
        Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap())
    }

    async fn wait_for_pending(shared: &SharedRing, expected: usize) {
        for _ in 0..200 {
            let pending = shared.lock().ring.as_ref().map_or(0, |r| r.len());
            if pending >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {expected} pending entries");
    }

    #[test]
    fn state_display() {
        assert_eq!(ListenerState::Running.to_string(), "running");
        assert_eq!(ListenerState::StopRequested.to_string(), "stop_requested");
    }

    #[test]
    fn epoch_micros_is_recent() {
        // 2020-01-01 이후
        assert!(epoch_micros() > 1_577_836_800_000_000);
    }

    #[tokio::test]
    async fn receives_into_ring() {
        let socket = bound_socket().await;
        let addr = socket.local_addr().unwrap();
        let shared = shared_ring(10, 1024);
        let listener = Listener::spawn(socket, Arc::clone(&shared), 1024);
        assert_eq!(listener.state(), ListenerState::Running);

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"hello", addr).await.unwrap();
        wait_for_pending(&shared, 1).await;

        let events = shared.lock().ring.as_mut().unwrap().drain_all();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload.as_ref(), b"hello");
        assert!(events[0].timestamp_us > 0);

        listener.stop().await.unwrap();
    }

    #[tokio::test]
    async fn cooperative_stop_without_traffic() {
        let socket = bound_socket().await;
        let listener = Listener::spawn(socket, shared_ring(3, 1024), 1024);

        tokio::time::timeout(Duration::from_secs(2), listener.stop())
            .await
            .expect("cooperative stop must not wait for a datagram")
            .unwrap();
    }

    #[tokio::test]
    async fn abort_while_blocked() {
        let socket = bound_socket().await;
        let listener = Listener::spawn(socket, shared_ring(3, 1024), 1024);
        tokio::time::sleep(Duration::from_millis(10)).await;

        tokio::time::timeout(Duration::from_secs(2), listener.abort())
            .await
            .expect("abort must terminate a blocked receive")
            .unwrap();
    }

    #[tokio::test]
    async fn oversized_datagram_is_discarded() {
        let socket = bound_socket().await;
        let addr = socket.local_addr().unwrap();
        let shared = shared_ring(10, 1024);
        let listener = Listener::spawn(socket, Arc::clone(&shared), 1024);

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(&vec![b'x'; 1024], addr).await.unwrap();
        sender.send_to(&vec![b'y'; 2000], addr).await.unwrap();
        sender.send_to(b"small", addr).await.unwrap();
        wait_for_pending(&shared, 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let events = shared.lock().ring.as_mut().unwrap().drain_all();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload.as_ref(), b"small");

        listener.stop().await.unwrap();
    }
}
