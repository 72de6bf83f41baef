//! 전송 통계

use std::time::Duration;

use bytes::Bytes;

/// 채널 통계
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// 채널에 들어온 프레임 수 (손실 포함)
    pub frames: u64,

    /// 처리한 비트 수
    pub bits: u64,

    /// 반전된 비트 수
    pub bits_flipped: u64,

    /// 1비트 이상 손상된 프레임 수
    pub frames_corrupted: u64,

    /// 통째로 손실된 프레임 수
    pub frames_lost: u64,

    /// Bad 상태에서 처리된 비트 수
    pub bad_state_bits: u64,
}

impl ChannelStats {
    /// 프레임 한 개 처리 기록
    pub fn record(&mut self, len: usize, flipped: u64) {
        self.frames += 1;
        self.bits += len as u64 * 8;
        self.bits_flipped += flipped;
        if flipped > 0 {
            self.frames_corrupted += 1;
        }
    }

    /// 실측 비트 오류율
    pub fn bit_error_rate(&self) -> f64 {
        if self.bits == 0 {
            return 0.0;
        }
        self.bits_flipped as f64 / self.bits as f64
    }
}

/// 송신자 통계
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// 채널로 보낸 DATA 프레임 수 (재전송 포함)
    pub transmissions: u64,

    /// 재전송한 DATA 프레임 수
    pub retransmissions: u64,

    /// 타임아웃 발생 횟수
    pub timeouts: u64,

    /// 윈도우를 전진시킨 ACK 수
    pub acks_advanced: u64,

    /// 중복 ACK 수
    pub acks_duplicate: u64,

    /// 이전 순환의 오래된 ACK 수
    pub acks_stale: u64,

    /// 보내지 않은 번호를 확인한 ACK 수
    pub acks_unsent: u64,

    /// 손상된 ACK 수
    pub acks_corrupt: u64,

    /// 손실된 ACK 수
    pub acks_lost: u64,
}

/// 수신자 통계
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// 순서대로 수락한 프레임 수
    pub accepted: u64,

    /// CRC 실패로 버린 프레임 수
    pub corrupt: u64,

    /// 순서가 맞지 않아 버린 프레임 수
    pub out_of_order: u64,

    /// 생성한 ACK 수
    pub acks_sent: u64,
}

/// 시뮬레이션 한 번의 결과
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 전달할 페이로드 수
    pub target: usize,

    /// 수신자가 순서대로 전달한 페이로드
    pub delivered: Vec<Bytes>,

    /// 드라이버 반복 횟수
    pub iterations: u64,

    /// 실제 경과 시간
    pub elapsed: Duration,

    /// 송신자 통계
    pub sender: SenderStats,

    /// 수신자 통계
    pub receiver: ReceiverStats,

    /// 채널 통계 (양방향 합계)
    pub channel: ChannelStats,
}

impl TransferStats {
    /// DATA 전송 횟수
    pub fn transmissions(&self) -> u64 {
        self.sender.transmissions
    }

    /// 재전송 횟수
    pub fn retransmissions(&self) -> u64 {
        self.sender.retransmissions
    }

    /// 효율 (유효 페이로드 / 전체 DATA 전송)
    pub fn efficiency(&self) -> f64 {
        if self.sender.transmissions == 0 {
            return 0.0;
        }
        self.target as f64 / self.sender.transmissions as f64
    }

    /// 모든 페이로드 전달 여부
    pub fn is_complete(&self) -> bool {
        self.delivered.len() >= self.target
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Delivered: {}/{} | Transmissions: {} | Retransmissions: {} | Timeouts: {} | Efficiency: {:.2} | BER: {:.2e}",
            self.elapsed.as_secs_f64(),
            self.delivered.len(),
            self.target,
            self.sender.transmissions,
            self.sender.retransmissions,
            self.sender.timeouts,
            self.efficiency(),
            self.channel.bit_error_rate(),
        )
    }
}

/// 시뮬레이션 보고서
pub type SimulationReport = TransferStats;
