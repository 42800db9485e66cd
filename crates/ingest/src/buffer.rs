//! 알림 배치 버퍼
//!
//! [`AlertBuffer`]는 플러시 태스크가 단독으로 소유하는 유한 버퍼입니다.
//! 가득 차면 플러시해야 하며, 버퍼 자체는 아무것도 버리지 않습니다.
//! 버리지 않는 대신 리더가 채널에서 기다리게 됩니다 (배압).

use std::time::Instant;

use crate::alert::AlertEvent;

/// 알림 배치 버퍼
#[derive(Debug)]
pub struct AlertBuffer {
    batch: Vec<AlertEvent>,
    capacity: usize,
    last_flush: Instant,
    total_received: u64,
}

impl AlertBuffer {
    /// 새 버퍼를 생성합니다.
    pub fn new(capacity: usize) -> Self {
        Self {
            batch: Vec::with_capacity(capacity.min(10_000)),
            capacity,
            last_flush: Instant::now(),
            total_received: 0,
        }
    }

    /// 알림을 추가합니다. 추가 후 가득 찼으면 `true`를 반환합니다.
    pub fn push(&mut self, alert: AlertEvent) -> bool {
        self.total_received += 1;
        self.batch.push(alert);
        self.is_full()
    }

    /// 모든 알림을 꺼내고 플러시 시각을 갱신합니다.
    pub fn take_batch(&mut self) -> Vec<AlertEvent> {
        self.last_flush = Instant::now();
        std::mem::replace(&mut self.batch, Vec::with_capacity(self.capacity.min(10_000)))
    }

    /// 가득 찼는지
    pub fn is_full(&self) -> bool {
        self.batch.len() >= self.capacity
    }

    /// 현재 알림 수
    pub fn len(&self) -> usize {
        self.batch.len()
    }

    /// 비어 있는지
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// 최대 용량
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 총 유입 알림 수
    pub fn total_received(&self) -> u64 {
        self.total_received
    }

    /// 마지막 플러시 후 `idle`이 지났고 비어 있지 않은지
    pub fn idle_expired(&self, idle: std::time::Duration) -> bool {
        !self.batch.is_empty() && self.last_flush.elapsed() >= idle
    }

    /// 사용률 (0.0~1.0)
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        f64::from(u32::try_from(self.batch.len()).unwrap_or(u32::MAX))
            / f64::from(u32::try_from(self.capacity).unwrap_or(u32::MAX))
    }
}
