//! 링 버퍼 -- 고정 용량 원형 큐 (단일 생산자/단일 소비자)
//!
//! [`RingBuffer`]는 초기화 시 N개의 고정 폭 슬롯을 미리 할당하고,
//! 이후에는 슬롯을 제자리에서 재사용합니다.
//!
//! # 인덱스 규칙
//! - `head == tail`: 비어 있음
//! - `(head + 1) % N == tail`: 가득 참 (슬롯 하나는 항상 비워 둠)
//! - 생산자는 `head`만, 소비자는 `tail`만 전진시킵니다.
//!
//! 가득 찬 상태에서 들어온 데이터는 버려지며, 읽지 않은 슬롯은 절대 덮어쓰지 않습니다.
//!
//! 리스너 태스크와 리더는 [`SharedState`]를 `parking_lot::Mutex`로 공유합니다.
//! 잠금은 O(1) 삽입 한 번, 또는 대기 엔트리 복사 동안만 유지됩니다.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::IngestError;

/// 링에서 꺼낸 원시 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// 수신 페이로드 (슬롯 폭 미만)
    pub payload: Bytes,
    /// 수신 시각 (Unix epoch 기준 마이크로초)
    pub timestamp_us: u64,
}

impl RawEvent {
    /// 페이로드를 UTF-8 텍스트로 반환합니다 (잘못된 바이트는 치환).
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// 고정 용량 원형 큐
pub struct RingBuffer {
    /// 슬롯 아레나 (각 슬롯은 `width` 바이트)
    slots: Vec<Box<[u8]>>,
    /// 슬롯별 유효 길이
    lengths: Vec<usize>,
    /// 슬롯별 수신 시각
    timestamps: Vec<u64>,
    /// 슬롯 폭
    width: usize,
    /// 다음 쓰기 위치 (생산자)
    head: usize,
    /// 다음 읽기 위치 (소비자)
    tail: usize,
}

impl RingBuffer {
    /// `capacity`개의 논리 슬롯과 `width` 바이트 슬롯 폭으로 링을 할당합니다.
    ///
    /// 동시에 대기할 수 있는 엔트리는 `capacity - 1`개입니다.
    pub fn new(capacity: usize, width: usize) -> Self {
        // 빈 슬롯 하나를 위해 최소 2개
        let capacity = capacity.max(2);
        Self {
            slots: (0..capacity)
                .map(|_| vec![0u8; width].into_boxed_slice())
                .collect(),
            lengths: vec![0; capacity],
            timestamps: vec![0; capacity],
            width,
            head: 0,
            tail: 0,
        }
    }

    /// 페이로드를 head 슬롯에 복사하고 head를 전진시킵니다.
    ///
    /// # Errors
    /// - 페이로드가 슬롯 폭 이상이면 [`IngestError::OversizedDatagram`]
    /// - 빈 슬롯이 없으면 [`IngestError::RingFull`] (기존 엔트리는 그대로 유지)
    pub fn enqueue(&mut self, payload: &[u8], timestamp_us: u64) -> Result<(), IngestError> {
        if payload.len() >= self.width {
            return Err(IngestError::OversizedDatagram {
                size: payload.len(),
                width: self.width,
            });
        }

        if self.is_full() {
            return Err(IngestError::RingFull {
                capacity: self.capacity(),
            });
        }

        let slot = &mut self.slots[self.head];
        slot[..payload.len()].copy_from_slice(payload);
        self.lengths[self.head] = payload.len();
        self.timestamps[self.head] = timestamp_us;
        self.head = (self.head + 1) % self.slots.len();
        Ok(())
    }

    /// 대기 중인 모든 엔트리를 FIFO 순서로 꺼냅니다.
    pub fn drain_all(&mut self) -> Vec<RawEvent> {
        let mut events = Vec::with_capacity(self.len());
        while self.tail != self.head {
            let len = self.lengths[self.tail];
            events.push(RawEvent {
                payload: Bytes::copy_from_slice(&self.slots[self.tail][..len]),
                timestamp_us: self.timestamps[self.tail],
            });
            self.tail = (self.tail + 1) % self.slots.len();
        }
        events
    }

    /// 대기 중인 엔트리 수를 반환합니다.
    pub fn len(&self) -> usize {
        (self.head + self.slots.len() - self.tail) % self.slots.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// 가득 찼는지 확인합니다.
    pub fn is_full(&self) -> bool {
        (self.head + 1) % self.slots.len() == self.tail
    }

    /// 논리 슬롯 수(N)를 반환합니다.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 슬롯 폭을 반환합니다.
    pub fn width(&self) -> usize {
        self.width
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("width", &self.width)
            .field("head", &self.head)
            .field("tail", &self.tail)
            .finish()
    }
}

/// 리스너와 리더가 공유하는 상태
///
/// 링 저장소와 리스너 에러 플래그를 하나의 잠금으로 보호합니다.
#[derive(Debug, Default)]
pub struct SharedState {
    /// 링 버퍼 (초기화 전/종료 후에는 `None`)
    pub ring: Option<RingBuffer>,
    /// 리스너가 수신 에러로 종료되었는지 여부
    pub listener_error: bool,
}

/// 공유 상태 핸들
pub type SharedRing = Arc<Mutex<SharedState>>;

/// 지정 크기의 링을 담은 공유 상태를 생성합니다.
pub fn shared_ring(capacity: usize, width: usize) -> SharedRing {
    Arc::new(Mutex::new(SharedState {
        ring: Some(RingBuffer::new(capacity, width)),
        listener_error: false,
    }))
}
