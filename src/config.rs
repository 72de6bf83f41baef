//! 시뮬레이션 설정
//!
//! 실행마다 값 객체로 생성해 송신자/수신자/채널 생성자로 넘긴다.
//! 실행 중에 전역 상수를 바꾸는 방식은 쓰지 않는다.

use std::time::Duration;

use crate::frame::{DEFAULT_RECEIVER_ID, DEFAULT_SENDER_ID};
use crate::{Error, Result, DEFAULT_CHUNK_SIZE, DEFAULT_SEQ_BITS, DEFAULT_WINDOW_SIZE};

/// Gilbert-Elliott 채널 파라미터 (모두 [0, 1] 확률)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GilbertParams {
    /// P: Good -> Bad 전이 확률 (버스트 진입)
    pub p: f64,

    /// R: Bad -> Good 전이 확률 (버스트 탈출)
    pub r: f64,

    /// K: Good 상태 비트 오류율 (배경 잡음)
    pub k: f64,

    /// H: Bad 상태 비트 오류율 (버스트 오류)
    pub h: f64,
}

impl Default for GilbertParams {
    fn default() -> Self {
        Self {
            p: 0.000_05,
            r: 0.1,
            k: 0.000_005,
            h: 0.005,
        }
    }
}

impl GilbertParams {
    /// 오류 없는 채널
    pub fn noiseless() -> Self {
        Self {
            p: 0.0,
            r: 1.0,
            k: 0.0,
            h: 0.0,
        }
    }
}

/// 비트 단위 채널 모델 선택
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelModel {
    /// 2상태 마르코프 버스트 채널
    GilbertElliott,

    /// 고정 확률 이진 대칭 채널
    Bsc(f64),

    /// 무손실 통과
    Ideal,
}

/// 시간 진행 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    /// 반복마다 수동 시계를 `tick`만큼 전진 (결정적)
    Virtual,

    /// 실제 시계 + 반복마다 `tick`만큼 sleep
    Wall,
}

/// GBN 시뮬레이션 설정
#[derive(Debug, Clone)]
pub struct ArqConfig {
    /// 송신 윈도우 크기 N (1 <= N < MAX_SEQ)
    pub window_size: usize,

    /// 시퀀스 번호 비트 수 (MAX_SEQ = 2^seq_bits, 1..=8)
    pub seq_bits: u8,

    /// 재전송 타임아웃
    pub timeout: Duration,

    /// Gilbert-Elliott 파라미터
    pub gilbert: GilbertParams,

    /// 비트 단위 채널 모델
    pub channel_model: ChannelModel,

    /// 프레임 단위 손실 확률 (0이면 손실 데코레이터 없음)
    pub loss_probability: f64,

    /// 난수 시드 (None이면 엔트로피 시드)
    pub seed: Option<u64>,

    /// 드라이버 반복당 시간 간격 (전파 지연)
    pub tick: Duration,

    /// 시간 진행 방식
    pub clock_mode: ClockMode,

    /// 드라이버 반복 상한 (None이면 무제한)
    pub max_iterations: Option<u64>,

    /// 데이터 분할 크기 (바이트)
    pub chunk_size: usize,

    /// 데이터 송신자 ID (ASCII)
    pub sender_id: u8,

    /// 데이터 수신자 ID (ASCII)
    pub receiver_id: u8,
}

impl Default for ArqConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            seq_bits: DEFAULT_SEQ_BITS,
            timeout: Duration::from_millis(400),  // 400ms
            gilbert: GilbertParams::default(),
            channel_model: ChannelModel::GilbertElliott,
            loss_probability: 0.0,
            seed: None,
            tick: Duration::from_millis(10),      // 10ms
            clock_mode: ClockMode::Virtual,
            max_iterations: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            sender_id: DEFAULT_SENDER_ID,
            receiver_id: DEFAULT_RECEIVER_ID,
        }
    }
}

impl ArqConfig {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 시퀀스 공간 크기
    pub fn max_seq(&self) -> u16 {
        1u16 << self.seq_bits.min(8)
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if !(1..=8).contains(&self.seq_bits) {
            return Err(Error::InvalidConfig(format!(
                "seq_bits={} (1..=8 필요)",
                self.seq_bits
            )));
        }

        let max_seq = self.max_seq() as usize;
        if self.window_size == 0 || self.window_size >= max_seq {
            return Err(Error::InvalidConfig(format!(
                "window_size={} (1 <= N < MAX_SEQ={} 필요)",
                self.window_size, max_seq
            )));
        }

        let mut probabilities = vec![
            ("P", self.gilbert.p),
            ("R", self.gilbert.r),
            ("K", self.gilbert.k),
            ("H", self.gilbert.h),
            ("loss_probability", self.loss_probability),
        ];
        if let ChannelModel::Bsc(p) = self.channel_model {
            probabilities.push(("bsc", p));
        }
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "{}={} ([0, 1] 범위 필요)",
                    name, value
                )));
            }
        }

        if !self.sender_id.is_ascii() || !self.receiver_id.is_ascii() {
            return Err(Error::InvalidConfig("엔드포인트 ID는 ASCII여야 함".into()));
        }

        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size=0".into()));
        }

        Ok(())
    }

    /// 맑은 하늘: 오류 없는 이상적 채널
    pub fn clear_sky() -> Self {
        Self {
            gilbert: GilbertParams::noiseless(),
            ..Self::default()
        }
    }

    /// 가벼운 비: 현실적인 간헐 버스트
    pub fn light_rain() -> Self {
        Self {
            gilbert: GilbertParams {
                p: 0.0003,
                r: 0.05,
                ..GilbertParams::default()
            },
            ..Self::default()
        }
    }

    /// 폭풍: 잦고 긴 버스트
    pub fn heavy_storm() -> Self {
        Self {
            gilbert: GilbertParams {
                p: 0.001,
                r: 0.02,
                ..GilbertParams::default()
            },
            ..Self::default()
        }
    }

    /// 이름으로 시나리오 프리셋 찾기
    pub fn scenario(name: &str) -> Option<Self> {
        match name {
            "clear" | "clear-sky" => Some(Self::clear_sky()),
            "rain" | "light-rain" => Some(Self::light_rain()),
            "storm" | "heavy-storm" => Some(Self::heavy_storm()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ArqConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_seq(), 8);
    }

    #[test]
    fn test_window_must_be_smaller_than_seq_space() {
        let config = ArqConfig {
            window_size: 8,
            seq_bits: 3,
            ..ArqConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = ArqConfig {
            window_size: 0,
            ..ArqConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_seq_bits_range() {
        let config = ArqConfig {
            seq_bits: 9,
            ..ArqConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ArqConfig {
            seq_bits: 8,
            window_size: 255,
            ..ArqConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.max_seq(), 256);
    }

    #[test]
    fn test_probability_range() {
        let mut config = ArqConfig::default();
        config.gilbert.h = 1.5;
        assert!(config.validate().is_err());

        let config = ArqConfig {
            channel_model: ChannelModel::Bsc(-0.1),
            ..ArqConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scenarios() {
        assert_eq!(ArqConfig::clear_sky().gilbert.k, 0.0);
        assert_eq!(ArqConfig::scenario("storm").map(|c| c.gilbert.r), Some(0.02));
        assert!(ArqConfig::scenario("hail").is_none());
    }
}
