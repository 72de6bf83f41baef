//! 재전송 타이머와 시계
//!
//! GBN은 프레임별 타이머가 아니라 `base`에 걸린 단일 타이머를 쓴다.
//! 시간 소스는 [`Clock`]으로 주입한다. 실제 실행은 [`SystemClock`],
//! 결정적 시뮬레이션과 테스트는 [`ManualClock`]을 쓴다.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// 현재 시각 제공자
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// 실제 시계
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// 수동으로 전진시키는 시계
///
/// 복제본은 같은 시각을 공유한다.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// 시각 전진
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

/// 단일 재전송 타이머
///
/// 상태는 정지 또는 `started_at`부터 동작 중 두 가지뿐이다.
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    timeout: Duration,
    started_at: Option<Instant>,
}

impl RetransmitTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            started_at: None,
        }
    }

    /// 정지 상태일 때만 시작
    pub fn start(&mut self, now: Instant) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    /// 동작 여부와 관계없이 `now`부터 다시 시작
    pub fn restart(&mut self, now: Instant) {
        self.started_at = Some(now);
    }

    pub fn stop(&mut self) {
        self.started_at = None;
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// 만료 여부 (순수 조회)
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.started_at {
            Some(start) => now.saturating_duration_since(start) > self.timeout,
            None => false,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
