//! 전송 매체 시뮬레이션
//!
//! 모든 채널은 [`Medium`] 하나의 능력만 노출한다. 송신자와 수신자는 어떤 전략이
//! 활성인지 모른다.
//!
//! - [`GilbertElliott`]: 2상태 마르코프 체인으로 버스트 비트 오류 생성
//! - [`Bsc`]: 고정 확률의 무기억 비트 반전
//! - [`Ideal`]: 그대로 통과
//! - [`Lossy`]: 프레임 단위 손실을 앞단에 덧붙이는 데코레이터
//!
//! 입력 버퍼는 절대 변경하지 않는다. 송신자는 재전송을 위해 원본을 보관한다.

use bytes::{Bytes, BytesMut};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::config::{ArqConfig, ChannelModel, GilbertParams};
use crate::frame::bits_to_string;
use crate::stats::ChannelStats;

/// 전송 매체
pub trait Medium: Send {
    /// 바이트열을 매체에 통과시킨다. `None`은 "아무것도 도착하지 않음".
    fn propagate(&mut self, data: &[u8]) -> Option<Bytes>;

    /// 누적 통계
    fn stats(&self) -> ChannelStats;
}

impl<M: Medium + ?Sized> Medium for Box<M> {
    fn propagate(&mut self, data: &[u8]) -> Option<Bytes> {
        (**self).propagate(data)
    }

    fn stats(&self) -> ChannelStats {
        (**self).stats()
    }
}

/// 확률을 [0, 1]로 제한 (NaN은 0)
fn probability(p: f64) -> f64 {
    if p.is_nan() {
        return 0.0;
    }
    p.clamp(0.0, 1.0)
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// 바이트 단위로 앞에서부터, 바이트 안에서는 MSB부터 `flip`을 물어 반전
fn flip_bits(data: &[u8], mut flip: impl FnMut() -> bool) -> (Bytes, u64) {
    let mut out = BytesMut::from(data);
    let mut flipped = 0u64;

    for byte in out.iter_mut() {
        for bit in (0..8).rev() {
            if flip() {
                *byte ^= 1 << bit;
                flipped += 1;
            }
        }
    }

    (out.freeze(), flipped)
}

fn log_corruption(model: &str, input: &[u8], output: &[u8], flipped: u64) {
    if flipped == 0 {
        return;
    }
    debug!("{} 채널: {} 비트 변경", model, flipped);
    trace!("  입력: {}", bits_to_string(input));
    trace!("  출력: {}", bits_to_string(output));
}

/// Gilbert-Elliott 채널 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Good,
    Bad,
}

/// Gilbert-Elliott 버스트 채널
///
/// 상태는 비트마다 한 번 갱신되고 호출 사이에 유지된다. 실행당 인스턴스 하나를
/// 만들어 소유자가 참조로 넘긴다.
#[derive(Debug)]
pub struct GilbertElliott {
    params: GilbertParams,
    state: ChannelState,
    rng: StdRng,
    stats: ChannelStats,
}

impl GilbertElliott {
    /// Good 상태에서 시작
    ///
    /// 범위를 벗어난 파라미터는 [0, 1]로 제한한다.
    pub fn new(params: GilbertParams, seed: Option<u64>) -> Self {
        let params = GilbertParams {
            p: probability(params.p),
            r: probability(params.r),
            k: probability(params.k),
            h: probability(params.h),
        };
        Self {
            params,
            state: ChannelState::Good,
            rng: make_rng(seed),
            stats: ChannelStats::default(),
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn params(&self) -> GilbertParams {
        self.params
    }

    /// 비트 하나: 상태 전이 후 전이된 상태로 오류 여부 결정
    fn step(&mut self) -> bool {
        self.state = match self.state {
            ChannelState::Good if self.rng.gen_bool(self.params.p) => ChannelState::Bad,
            ChannelState::Bad if self.rng.gen_bool(self.params.r) => ChannelState::Good,
            state => state,
        };

        let error_prob = match self.state {
            ChannelState::Good => self.params.k,
            ChannelState::Bad => {
                self.stats.bad_state_bits += 1;
                self.params.h
            }
        };
        self.rng.gen_bool(error_prob)
    }

    /// 무기억 BSC 모드 (마르코프 상태는 건드리지 않음)
    pub fn propagate_bsc(&mut self, data: &[u8], p: f64) -> Option<Bytes> {
        if data.is_empty() {
            return None;
        }
        let p = probability(p);
        let rng = &mut self.rng;
        let (out, flipped) = flip_bits(data, || rng.gen_bool(p));

        self.stats.record(data.len(), flipped);
        log_corruption("BSC", data, &out, flipped);
        Some(out)
    }
}

impl Medium for GilbertElliott {
    fn propagate(&mut self, data: &[u8]) -> Option<Bytes> {
        if data.is_empty() {
            return None;
        }
        let (out, flipped) = flip_bits(data, || self.step());

        self.stats.record(data.len(), flipped);
        log_corruption("Gilbert-Elliott", data, &out, flipped);
        Some(out)
    }

    fn stats(&self) -> ChannelStats {
        self.stats.clone()
    }
}

/// 이진 대칭 채널
#[derive(Debug)]
pub struct Bsc {
    p: f64,
    rng: StdRng,
    stats: ChannelStats,
}

impl Bsc {
    pub fn new(p: f64, seed: Option<u64>) -> Self {
        Self {
            p: probability(p),
            rng: make_rng(seed),
            stats: ChannelStats::default(),
        }
    }
}

impl Medium for Bsc {
    fn propagate(&mut self, data: &[u8]) -> Option<Bytes> {
        if data.is_empty() {
            return None;
        }
        let (p, rng) = (self.p, &mut self.rng);
        let (out, flipped) = flip_bits(data, || rng.gen_bool(p));

        self.stats.record(data.len(), flipped);
        log_corruption("BSC", data, &out, flipped);
        Some(out)
    }

    fn stats(&self) -> ChannelStats {
        self.stats.clone()
    }
}

/// 무손실 채널
#[derive(Debug, Default)]
pub struct Ideal {
    stats: ChannelStats,
}

impl Medium for Ideal {
    fn propagate(&mut self, data: &[u8]) -> Option<Bytes> {
        if data.is_empty() {
            return None;
        }
        self.stats.record(data.len(), 0);
        Some(Bytes::copy_from_slice(data))
    }

    fn stats(&self) -> ChannelStats {
        self.stats.clone()
    }
}

/// 프레임 단위 손실 데코레이터
///
/// 손실되지 않은 프레임만 내부 비트 모델로 넘긴다.
#[derive(Debug)]
pub struct Lossy<M> {
    inner: M,
    loss_probability: f64,
    rng: StdRng,
    lost: u64,
}

impl<M: Medium> Lossy<M> {
    pub fn new(inner: M, loss_probability: f64, seed: Option<u64>) -> Self {
        Self {
            inner,
            loss_probability: probability(loss_probability),
            rng: make_rng(seed),
            lost: 0,
        }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }
}

impl<M: Medium> Medium for Lossy<M> {
    fn propagate(&mut self, data: &[u8]) -> Option<Bytes> {
        if data.is_empty() {
            return None;
        }
        if self.rng.gen_bool(self.loss_probability) {
            self.lost += 1;
            debug!("채널: 프레임 손실 ({} bytes)", data.len());
            return None;
        }
        self.inner.propagate(data)
    }

    fn stats(&self) -> ChannelStats {
        let mut stats = self.inner.stats();
        stats.frames += self.lost;
        stats.frames_lost += self.lost;
        stats
    }
}

/// 설정으로 채널 전략 조립
pub fn build_medium(config: &ArqConfig) -> Box<dyn Medium> {
    let bit_level: Box<dyn Medium> = match config.channel_model {
        ChannelModel::GilbertElliott => Box::new(GilbertElliott::new(config.gilbert, config.seed)),
        ChannelModel::Bsc(p) => Box::new(Bsc::new(p, config.seed)),
        ChannelModel::Ideal => Box::new(Ideal::default()),
    };

    if config.loss_probability > 0.0 {
        // 손실 판정은 비트 모델과 다른 난수열을 쓴다
        let seed = config.seed.map(|s| s.wrapping_add(0x9E37_79B9));
        Box::new(Lossy::new(bit_level, config.loss_probability, seed))
    } else {
        bit_level
    }
}
