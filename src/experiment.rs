//! 실험 도구
//!
//! - CRC-32 검출률 측정 (BSC / Gilbert-Elliott 채널 통과)
//! - 무작위 바이트 변조에 대한 CRC 충돌 탐색
//! - 청크 크기 x 채널 설정 격자 스윕 (rayon 병렬), CSV 출력

use std::fmt;
use std::io::Write;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::channel::{GilbertElliott, Medium};
use crate::config::{ArqConfig, GilbertParams};
use crate::frame::{Frame, DEFAULT_RECEIVER_ID, DEFAULT_SENDER_ID};
use crate::simulation::{chunk_payloads, Simulation};
use crate::{Error, Result};

/// 검출률 측정 기본 잡음 수준
pub const DETECTION_LEVELS: [f64; 13] = [
    0.000_01, 0.000_03, 0.000_1, 0.000_3, 0.001, 0.003, 0.005, 0.007, 0.01, 0.02, 0.03, 0.25, 0.5,
];

/// 스윕 기본 청크 크기
pub const SWEEP_CHUNK_SIZES: [usize; 5] = [256, 512, 1024, 2048, 4096];

/// 스윕 기본 채널 설정
pub const SWEEP_CHANNELS: [SweepChannel; 5] = [
    SweepChannel { h: 0.01, r: 0.35 },
    SweepChannel { h: 0.03, r: 0.30 },
    SweepChannel { h: 0.05, r: 0.20 },
    SweepChannel { h: 0.08, r: 0.18 },
    SweepChannel { h: 0.12, r: 0.15 },
];

const COLLISION_PAYLOAD: &[u8] = b"HELLO_WORLD_TEST";

/// 검출 실험 채널
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMode {
    /// 고정 확률 비트 반전
    Bsc,

    /// P=0.05, R=0.1 버스트 채널, H = 주어진 확률
    GilbertElliott,

    /// 채널 없이 1~3 바이트 무작위 XOR
    Collision,
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionMode::Bsc => write!(f, "BSC"),
            DetectionMode::GilbertElliott => write!(f, "GILBERT"),
            DetectionMode::Collision => write!(f, "CRC_COLLISION_HUNT"),
        }
    }
}

/// 검출 실험 결과
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionReport {
    pub mode: DetectionMode,
    pub probability: f64,

    /// 시도한 프레임 수
    pub frames: u64,

    /// 바이트가 실제로 바뀐 프레임 수
    pub corrupted: u64,

    /// CRC가 잡아낸 수
    pub detected: u64,

    /// 바뀌었지만 CRC를 통과한 수
    pub undetected: u64,
}

impl DetectionReport {
    fn new(mode: DetectionMode, probability: f64) -> Self {
        Self {
            mode,
            probability,
            frames: 0,
            corrupted: 0,
            detected: 0,
            undetected: 0,
        }
    }

    /// 검출률 (손상이 한 번도 없었으면 None)
    pub fn detection_rate(&self) -> Option<f64> {
        if self.corrupted == 0 {
            return None;
        }
        Some(self.detected as f64 / self.corrupted as f64)
    }
}

impl fmt::Display for DetectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- {} (p={:.6}) | frames: {} ---", self.mode, self.probability, self.frames)?;
        writeln!(f, "corrupted:   {}", self.corrupted)?;
        writeln!(f, "  detected:  {}", self.detected)?;
        writeln!(f, "  undetected: {}", self.undetected)?;
        match self.detection_rate() {
            Some(rate) => write!(f, "detection:   {:.4}%", rate * 100.0),
            None => write!(f, "detection:   no corruption"),
        }
    }
}

/// 고정 프레임을 채널에 반복 통과시켜 CRC 검출률 측정
///
/// 채널 인스턴스는 실험 전체에서 하나를 쓰므로 Gilbert-Elliott 상태가 프레임 사이에
/// 이어진다.
pub fn detection_trial(
    mode: DetectionMode,
    iterations: u64,
    probability: f64,
    seed: Option<u64>,
) -> Result<DetectionReport> {
    if !(0.0..=1.0).contains(&probability) {
        return Err(Error::InvalidArgument(format!("probability={}", probability)));
    }
    if mode == DetectionMode::Collision {
        return Ok(collision_hunt(iterations, seed));
    }

    let payload = Bytes::from("TestData_1234567890".repeat(5));
    let sent = Frame::data(1, payload, DEFAULT_SENDER_ID, DEFAULT_RECEIVER_ID).encode();

    let params = GilbertParams {
        p: 0.05,
        r: 0.1,
        h: probability,
        ..GilbertParams::default()
    };
    let mut channel = GilbertElliott::new(params, seed);
    let mut report = DetectionReport::new(mode, probability);

    for _ in 0..iterations {
        report.frames += 1;

        let received = match mode {
            DetectionMode::Bsc => channel.propagate_bsc(&sent, probability),
            _ => channel.propagate(&sent),
        };
        let Some(received) = received else {
            continue;
        };
        if received == sent {
            continue;
        }

        report.corrupted += 1;
        if Frame::decode(&received).is_corrupt() {
            report.detected += 1;
        } else {
            report.undetected += 1;
            debug!("CRC 미검출: {:?}", received);
        }
    }

    info!(
        "{} p={}: corrupted={}, detected={}, undetected={}",
        mode, probability, report.corrupted, report.detected, report.undetected
    );
    Ok(report)
}

/// 짧은 페이로드에 1~3개의 무작위 바이트 XOR을 가해 CRC-32 충돌 탐색
pub fn collision_hunt(iterations: u64, seed: Option<u64>) -> DetectionReport {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let reference = crc32fast::hash(COLLISION_PAYLOAD);
    let mut report = DetectionReport::new(DetectionMode::Collision, 0.0);

    for _ in 0..iterations {
        report.frames += 1;

        let mut corrupted = COLLISION_PAYLOAD.to_vec();
        for _ in 0..rng.gen_range(1..=3) {
            let idx = rng.gen_range(0..corrupted.len());
            corrupted[idx] ^= rng.gen_range(1..=255u8);
        }

        // 같은 위치를 두 번 건드리면 원래대로 돌아올 수 있다
        if corrupted == COLLISION_PAYLOAD {
            continue;
        }

        report.corrupted += 1;
        if crc32fast::hash(&corrupted) != reference {
            report.detected += 1;
        } else {
            report.undetected += 1;
        }
    }

    report
}

/// 스윕 채널 설정 (Bad 상태 오류율 H, 탈출 확률 R)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepChannel {
    pub h: f64,
    pub r: f64,
}

/// 스윕 한 점의 결과
#[derive(Debug, Clone, PartialEq)]
pub struct SweepRecord {
    pub chunk_size: usize,
    pub h: f64,
    pub r: f64,

    /// 시뮬레이션 시간 (반복 수 x tick)
    pub time_s: f64,

    pub retransmissions: u64,
    pub efficiency: f64,
}

/// 청크 크기 x 채널 설정 격자 스윕
///
/// 격자의 각 점은 설정 복사본과 채널을 따로 가진 독립 시뮬레이션이다.
/// 시드가 있으면 점마다 `seed + index`를 쓴다. 결과는 격자 순서(청크 크기 우선)로 돌려준다.
pub fn sweep(
    base: &ArqConfig,
    chunk_sizes: &[usize],
    channels: &[SweepChannel],
    data: &[u8],
) -> Result<Vec<SweepRecord>> {
    base.validate()?;

    let grid: Vec<(usize, SweepChannel)> = chunk_sizes
        .iter()
        .flat_map(|&chunk_size| channels.iter().map(move |&channel| (chunk_size, channel)))
        .collect();

    info!("스윕 시작: {}개 설정, 데이터 {} bytes", grid.len(), data.len());

    grid.into_par_iter()
        .enumerate()
        .map(|(index, (chunk_size, channel))| -> Result<SweepRecord> {
            let mut config = base.clone();
            config.chunk_size = chunk_size;
            config.gilbert.h = channel.h;
            config.gilbert.r = channel.r;
            config.seed = base.seed.map(|seed| seed.wrapping_add(index as u64));

            let tick = config.tick;
            let payloads = chunk_payloads(data, chunk_size)?;
            let report = Simulation::new(config)?.run(payloads)?;

            debug!(
                "스윕 [{}] chunk={}, H={}, R={}: {}",
                index,
                chunk_size,
                channel.h,
                channel.r,
                report.summary()
            );

            Ok(SweepRecord {
                chunk_size,
                h: channel.h,
                r: channel.r,
                time_s: report.iterations as f64 * tick.as_secs_f64(),
                retransmissions: report.retransmissions(),
                efficiency: report.efficiency(),
            })
        })
        .collect()
}

/// 스윕 결과를 CSV로 기록
pub fn write_csv<W: Write>(records: &[SweepRecord], mut writer: W) -> Result<()> {
    writeln!(writer, "chunk_size,H,R,time_s,retransmissions,efficiency")?;
    for record in records {
        writeln!(
            writer,
            "{},{},{},{:.3},{},{:.4}",
            record.chunk_size,
            record.h,
            record.r,
            record.time_s,
            record.retransmissions,
            record.efficiency
        )?;
    }
    writer.flush()?;
    Ok(())
}
