//! 수신자 (GBN 수신측 상태 기계)
//!
//! - 수신 윈도우 크기 1: 기대 번호와 정확히 같은 프레임만 수락
//! - 손상/순서 위반 프레임은 버리고 기대 번호로 ACK를 다시 보냄 (암묵적 NACK)
//! - 수락한 페이로드는 추가 전용 로그에 순서대로 쌓임

use bytes::Bytes;
use tracing::{debug, warn};

use crate::channel::Medium;
use crate::config::ArqConfig;
use crate::frame::{Frame, FrameKind, SeqNum};
use crate::stats::ReceiverStats;
use crate::Result;

/// GBN 수신자
pub struct Receiver {
    /// 다음에 수락할 번호
    expected_seq_num: SeqNum,

    /// 시퀀스 공간 크기
    max_seq: u16,

    /// ACK 송신자 ID (이 수신자)
    sender_id: u8,

    /// ACK 수신자 ID (데이터 송신자)
    receiver_id: u8,

    /// 전달된 페이로드 로그
    delivered: Vec<Bytes>,

    stats: ReceiverStats,
}

impl Receiver {
    /// 새 수신자 생성
    pub fn new(config: &ArqConfig) -> Result<Self> {
        config.validate()?;

        // ACK 방향은 데이터 방향의 반대
        Ok(Self {
            expected_seq_num: 0,
            max_seq: config.max_seq(),
            sender_id: config.receiver_id,
            receiver_id: config.sender_id,
            delivered: Vec::new(),
            stats: ReceiverStats::default(),
        })
    }

    pub fn expected_seq_num(&self) -> SeqNum {
        self.expected_seq_num
    }

    /// 전달된 페이로드 (순서대로)
    pub fn delivered(&self) -> &[Bytes] {
        &self.delivered
    }

    /// 전달 로그 길이
    pub fn delivered_len(&self) -> usize {
        self.delivered.len()
    }

    pub fn into_delivered(self) -> Vec<Bytes> {
        self.delivered
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    fn ack_for_expected(&mut self) -> Frame {
        self.stats.acks_sent += 1;
        Frame::ack(self.expected_seq_num, self.sender_id, self.receiver_id)
    }

    /// 수신 바이트를 처리하고 채널을 타기 전의 ACK 프레임을 돌려준다
    pub fn accept(&mut self, data: &[u8]) -> Frame {
        let frame = Frame::decode(data);
        let sn = frame.seq_num;

        if frame.is_corrupt() {
            warn!(
                "손상된 프레임 폐기 (SN={}), ACK {} 재전송",
                sn, self.expected_seq_num
            );
            self.stats.corrupt += 1;
            return self.ack_for_expected();
        }

        if frame.kind == FrameKind::Data && sn == self.expected_seq_num {
            debug!("수락: {}", frame);
            self.delivered.push(frame.payload);
            self.expected_seq_num = ((sn as u16 + 1) % self.max_seq) as SeqNum;
            self.stats.accepted += 1;

            let ack = self.ack_for_expected();
            debug!("ACK 송신: SN={}", ack.seq_num);
            return ack;
        }

        debug!(
            "순서 위반 폐기: {} (기대 SN={}), ACK {} 재전송",
            frame, self.expected_seq_num, self.expected_seq_num
        );
        self.stats.out_of_order += 1;
        self.ack_for_expected()
    }

    /// 채널에서 온 바이트 처리
    ///
    /// 아무것도 도착하지 않았으면 ACK도 없다. 그 외에는 ACK를 채널에 정확히 한 번
    /// 통과시켜 돌려준다.
    pub fn on_frame(&mut self, data: Option<&[u8]>, medium: &mut dyn Medium) -> Option<Bytes> {
        let data = match data {
            Some(data) if !data.is_empty() => data,
            _ => return None,
        };

        let ack = self.accept(data);
        medium.propagate(&ack.encode())
    }
}
