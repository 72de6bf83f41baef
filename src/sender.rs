//! 송신자 (GBN 송신측 상태 기계)
//!
//! - 슬라이딩 윈도우 진입 제어
//! - 재전송 버퍼 (확인될 때까지 보관)
//! - 누적 ACK 처리 (중복/오래된 ACK 거부)
//! - `base`에 걸린 단일 재전송 타이머
//!
//! ```text
//!   base            next_seq_num
//!    │                   │
//! ───┼───────────────────┼──────────────▶ seq (mod MAX_SEQ)
//!    │ <── in flight ──▶ │ <── 전송 가능 (윈도우 N까지)
//! ```
//!
//! 타이머 규약: [`Sender::is_timeout`]은 순수 조회이고, [`Sender::check_timeout`]은
//! 조회 후 타이머를 멈춘다. 한 번 발생한 타임아웃은 재시작 없이 다시 발생하지 않는다.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::channel::Medium;
use crate::config::ArqConfig;
use crate::frame::{Frame, FrameKind, SeqNum};
use crate::stats::SenderStats;
use crate::timer::{Clock, RetransmitTimer, SystemClock};
use crate::{Error, Result};

/// ACK 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// 윈도우가 n칸 전진
    Advanced(usize),

    /// 현재 base에 대한 중복 ACK
    Duplicate,

    /// 이전 순환의 오래된 ACK
    Stale,

    /// 아직 보내지 않은 번호까지 확인하는 ACK
    Unsent,

    /// CRC 실패
    Corrupt,

    /// DATA 등 ACK가 아닌 프레임
    Unexpected,

    /// 아무것도 도착하지 않음
    Lost,
}

impl AckOutcome {
    pub fn is_advanced(&self) -> bool {
        matches!(self, AckOutcome::Advanced(_))
    }
}

/// GBN 송신자
pub struct Sender {
    /// 윈도우 크기 N
    window_size: usize,

    /// 시퀀스 공간 크기
    max_seq: u16,

    /// 가장 오래된 미확인 번호
    base: SeqNum,

    /// 다음에 할당할 번호
    next_seq_num: SeqNum,

    /// 재전송 버퍼
    buffer: HashMap<SeqNum, Frame>,

    /// base 타이머
    timer: RetransmitTimer,

    /// 시간 소스
    clock: Arc<dyn Clock>,

    sender_id: u8,
    receiver_id: u8,

    stats: SenderStats,
}

impl Sender {
    /// 새 송신자 생성
    pub fn new(config: &ArqConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            window_size: config.window_size,
            max_seq: config.max_seq(),
            base: 0,
            next_seq_num: 0,
            buffer: HashMap::with_capacity(config.window_size),
            timer: RetransmitTimer::new(config.timeout),
            clock: Arc::new(SystemClock),
            sender_id: config.sender_id,
            receiver_id: config.receiver_id,
            stats: SenderStats::default(),
        })
    }

    /// 시간 소스 교체
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn distance(&self, from: SeqNum, to: SeqNum) -> u16 {
        (to as u16 + self.max_seq - from as u16) % self.max_seq
    }

    fn next(&self, seq: SeqNum) -> SeqNum {
        ((seq as u16 + 1) % self.max_seq) as SeqNum
    }

    /// `(seq - base) mod MAX_SEQ < N`
    pub fn is_in_window(&self, seq: SeqNum) -> bool {
        (self.distance(self.base, seq) as usize) < self.window_size
    }

    /// 새 프레임을 받을 수 있는지
    pub fn can_submit(&self) -> bool {
        self.is_in_window(self.next_seq_num)
    }

    /// 확인 대기 중인 프레임 수
    pub fn in_flight(&self) -> usize {
        self.distance(self.base, self.next_seq_num) as usize
    }

    pub fn base(&self) -> SeqNum {
        self.base
    }

    pub fn next_seq_num(&self) -> SeqNum {
        self.next_seq_num
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn max_seq(&self) -> u16 {
        self.max_seq
    }

    /// 재전송 버퍼 조회
    pub fn buffered(&self, seq: SeqNum) -> Option<&Frame> {
        self.buffer.get(&seq)
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }

    /// 페이로드를 윈도우에 넣고 DATA 프레임 생성
    ///
    /// 윈도우가 비어 있었다면 타이머를 시작한다.
    pub fn submit(&mut self, payload: impl Into<Bytes>) -> Result<Frame> {
        if !self.can_submit() {
            return Err(Error::WindowFull {
                base: self.base,
                next_seq_num: self.next_seq_num,
            });
        }

        let was_empty = self.base == self.next_seq_num;
        let frame = Frame::data(
            self.next_seq_num,
            payload.into(),
            self.sender_id,
            self.receiver_id,
        );

        self.buffer.insert(frame.seq_num, frame.clone());
        self.next_seq_num = self.next(self.next_seq_num);

        if was_empty {
            self.timer.start(self.clock.now());
            debug!("타이머 시작: base={}", self.base);
        }

        Ok(frame)
    }

    /// 프레임을 직렬화해 채널로 전송
    pub fn transmit(&mut self, frame: &Frame, medium: &mut dyn Medium) -> Option<Bytes> {
        debug!("송신: {}", frame);
        self.stats.transmissions += 1;
        medium.propagate(&frame.encode())
    }

    /// [`Sender::submit`] + [`Sender::transmit`]
    pub fn send(&mut self, payload: impl Into<Bytes>, medium: &mut dyn Medium) -> Result<Option<Bytes>> {
        let frame = self.submit(payload)?;
        Ok(self.transmit(&frame, medium))
    }

    /// 누적 ACK 처리
    pub fn on_ack(&mut self, ack_num: SeqNum) -> AckOutcome {
        let distance = self.distance(self.base, ack_num);

        if distance == 0 {
            debug!("중복 ACK 무시: SN={} (base={})", ack_num, self.base);
            self.stats.acks_duplicate += 1;
            return AckOutcome::Duplicate;
        }

        if distance > self.max_seq / 2 {
            debug!("오래된 ACK 거부: SN={} (base={})", ack_num, self.base);
            self.stats.acks_stale += 1;
            return AckOutcome::Stale;
        }

        if distance as usize > self.in_flight() {
            warn!(
                "보내지 않은 번호의 ACK 거부: SN={} (base={}, next={})",
                ack_num, self.base, self.next_seq_num
            );
            self.stats.acks_unsent += 1;
            return AckOutcome::Unsent;
        }

        let mut moved = 0usize;
        while self.base != ack_num {
            self.buffer.remove(&self.base);
            self.base = self.next(self.base);
            moved += 1;
        }
        debug!("ACK SN={}: base {}칸 전진 -> {}", ack_num, moved, self.base);

        if self.base == self.next_seq_num {
            self.timer.stop();
            debug!("윈도우 비어 있음: 타이머 정지");
        } else {
            self.timer.restart(self.clock.now());
        }

        self.stats.acks_advanced += 1;
        AckOutcome::Advanced(moved)
    }

    /// 채널을 통과한 ACK 바이트 처리
    pub fn on_ack_bytes(&mut self, data: Option<&[u8]>) -> AckOutcome {
        let data = match data {
            Some(data) if !data.is_empty() => data,
            _ => {
                self.stats.acks_lost += 1;
                return AckOutcome::Lost;
            }
        };

        let frame = Frame::decode(data);
        if frame.is_corrupt() {
            debug!("손상된 ACK 무시: SN={}", frame.seq_num);
            self.stats.acks_corrupt += 1;
            return AckOutcome::Corrupt;
        }
        if frame.kind != FrameKind::Ack {
            warn!("ACK 자리에 {} 수신", frame);
            return AckOutcome::Unexpected;
        }

        self.on_ack(frame.seq_num)
    }

    /// 타이머 만료 여부 (순수 조회)
    pub fn is_timeout(&self) -> bool {
        self.timer.is_expired(self.clock.now())
    }

    /// 만료되었다면 타이머를 멈추고 `true`
    pub fn check_timeout(&mut self) -> bool {
        if !self.is_timeout() {
            return false;
        }
        self.timer.stop();
        self.stats.timeouts += 1;
        warn!("타임아웃: base={}, in_flight={}", self.base, self.in_flight());
        true
    }

    pub fn timer_running(&self) -> bool {
        self.timer.is_running()
    }

    pub fn stop_timer(&mut self) {
        self.timer.stop();
    }

    /// 윈도우가 비어 있지 않으면 지금부터 다시 시작
    pub fn restart_timer(&mut self) {
        if self.base == self.next_seq_num {
            self.timer.stop();
        } else {
            self.timer.restart(self.clock.now());
        }
    }

    /// Go-Back-N 복구: base부터 next_seq_num 직전까지 전부 재전송
    ///
    /// 채널 출력은 전송 순서대로 돌려준다. 타이머는 마지막에 한 번 재시작한다.
    pub fn retransmit_window(&mut self, medium: &mut dyn Medium) -> Vec<Option<Bytes>> {
        let mut outputs = Vec::with_capacity(self.in_flight());
        let mut seq = self.base;

        while seq != self.next_seq_num {
            if let Some(encoded) = self.buffer.get(&seq).map(Frame::encode) {
                debug!("재전송: [DATA: SN={}]", seq);
                outputs.push(medium.propagate(&encoded));
                self.stats.transmissions += 1;
                self.stats.retransmissions += 1;
            }
            seq = self.next(seq);
        }

        self.restart_timer();
        outputs
    }
}
