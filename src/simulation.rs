//! 동기 시뮬레이션 드라이버
//!
//! 한 반복(iteration)은 다음 순서로 진행된다.
//!
//! 1. 윈도우에 여유가 있고 남은 페이로드가 있으면 한 프레임 전송, 수신, ACK 처리
//! 2. 타임아웃이면 윈도우 전체 재전송, 재전송 프레임마다 수신과 ACK 처리
//! 3. 시계를 `tick`만큼 전진 (가상 시계) 또는 `tick`만큼 sleep (실제 시계)
//!
//! 수신자의 전달 로그 길이가 페이로드 수에 도달하면 종료한다.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, info};

use crate::channel::{build_medium, Medium};
use crate::config::{ArqConfig, ClockMode};
use crate::receiver::Receiver;
use crate::sender::Sender;
use crate::stats::SimulationReport;
use crate::timer::{ManualClock, SystemClock};
use crate::{Error, Result};

/// 송신자, 수신자, 채널 한 벌
pub struct Simulation {
    config: ArqConfig,
    sender: Sender,
    receiver: Receiver,

    /// 양방향이 공유하는 채널 (실행마다 새로 생성)
    medium: Box<dyn Medium>,

    /// 가상 시계 모드일 때만 존재
    clock: Option<ManualClock>,
}

impl Simulation {
    /// 설정으로 시뮬레이션 구성
    pub fn new(config: ArqConfig) -> Result<Self> {
        config.validate()?;

        let (sender, clock) = match config.clock_mode {
            ClockMode::Virtual => {
                let clock = ManualClock::new();
                let sender = Sender::new(&config)?.with_clock(Arc::new(clock.clone()));
                (sender, Some(clock))
            }
            ClockMode::Wall => (Sender::new(&config)?.with_clock(Arc::new(SystemClock)), None),
        };

        let receiver = Receiver::new(&config)?;
        let medium = build_medium(&config);

        Ok(Self {
            config,
            sender,
            receiver,
            medium,
            clock,
        })
    }

    /// 채널 교체 (테스트, 실험용)
    pub fn with_medium(mut self, medium: Box<dyn Medium>) -> Self {
        self.medium = medium;
        self
    }

    pub fn config(&self) -> &ArqConfig {
        &self.config
    }

    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    pub fn receiver(&self) -> &Receiver {
        &self.receiver
    }

    /// 모든 페이로드가 전달될 때까지 실행
    pub fn run(self, payloads: Vec<Bytes>) -> Result<SimulationReport> {
        self.run_observed(payloads, |_, _| {})
    }

    /// [`Simulation::run`]과 같지만 새로 전달된 페이로드마다 `observer(index, payload)` 호출
    pub fn run_observed<F>(mut self, payloads: Vec<Bytes>, mut observer: F) -> Result<SimulationReport>
    where
        F: FnMut(usize, &Bytes),
    {
        let target = payloads.len();
        let mut pending: VecDeque<Bytes> = payloads.into();
        let mut iterations = 0u64;
        let mut observed = 0usize;
        let started = Instant::now();

        info!(
            "GBN 시뮬레이션 시작: payloads={}, N={}, MAX_SEQ={}, timeout={:?}",
            target,
            self.config.window_size,
            self.config.max_seq(),
            self.config.timeout
        );

        while self.receiver.delivered_len() < target {
            if let Some(limit) = self.config.max_iterations {
                if iterations >= limit {
                    return Err(Error::RetryBudgetExhausted {
                        delivered: self.receiver.delivered_len(),
                        target,
                        iterations,
                    });
                }
            }
            iterations += 1;

            self.step(&mut pending)?;

            let delivered = self.receiver.delivered();
            while observed < delivered.len() {
                observer(observed, &delivered[observed]);
                observed += 1;
            }

            self.advance_clock();
        }

        let elapsed = started.elapsed();
        let channel = self.medium.stats();
        let sender = self.sender.stats().clone();
        let receiver = self.receiver.stats().clone();

        let report = SimulationReport {
            target,
            delivered: self.receiver.into_delivered(),
            iterations,
            elapsed,
            sender,
            receiver,
            channel,
        };
        info!("GBN 시뮬레이션 완료: {}", report.summary());

        Ok(report)
    }

    /// 한 반복
    fn step(&mut self, pending: &mut VecDeque<Bytes>) -> Result<()> {
        if self.sender.can_submit() {
            if let Some(payload) = pending.pop_front() {
                let frame = self.sender.submit(payload)?;
                let data = self.sender.transmit(&frame, self.medium.as_mut());
                self.exchange(data);
            }
        }

        if self.sender.check_timeout() {
            let resent = self.sender.retransmit_window(self.medium.as_mut());
            debug!("재전송 {}개 프레임", resent.len());
            for data in resent {
                self.exchange(data);
            }
        }

        Ok(())
    }

    /// 채널을 통과한 DATA를 수신자에 넘기고 ACK를 송신자에 돌려준다
    fn exchange(&mut self, data: Option<Bytes>) {
        let ack = self.receiver.on_frame(data.as_deref(), self.medium.as_mut());
        self.sender.on_ack_bytes(ack.as_deref());
    }

    fn advance_clock(&self) {
        match &self.clock {
            Some(clock) => clock.advance(self.config.tick),
            None => std::thread::sleep(self.config.tick),
        }
    }
}

/// `Packet_1` .. `Packet_n` 텍스트 페이로드
pub fn text_payloads(n: usize) -> Vec<Bytes> {
    (1..=n)
        .map(|i| Bytes::from(format!("Packet_{}", i)))
        .collect()
}

/// 바이트 버퍼를 `chunk_size` 단위로 분할
pub fn chunk_payloads(data: &[u8], chunk_size: usize) -> Result<Vec<Bytes>> {
    if chunk_size == 0 {
        return Err(Error::InvalidArgument("chunk_size=0".into()));
    }

    let data = Bytes::copy_from_slice(data);
    Ok((0..data.len())
        .step_by(chunk_size)
        .map(|start| data.slice(start..(start + chunk_size).min(data.len())))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelModel, GilbertParams};
    use std::time::Duration;

    fn ideal() -> ArqConfig {
        ArqConfig {
            channel_model: ChannelModel::Ideal,
            seed: Some(7),
            max_iterations: Some(1_000),
            ..ArqConfig::default()
        }
    }

    #[test]
    fn test_ideal_channel_delivers_in_order() {
        let payloads = text_payloads(15);
        let report = Simulation::new(ideal()).unwrap().run(payloads.clone()).unwrap();

        assert!(report.is_complete());
        assert_eq!(report.delivered, payloads);
        assert_eq!(report.transmissions(), 15);
        assert_eq!(report.retransmissions(), 0);
        assert_eq!(report.sender.timeouts, 0);
        assert!((report.efficiency() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_observer_sees_each_payload_once() {
        let payloads = text_payloads(10);
        let mut seen = Vec::new();

        Simulation::new(ideal())
            .unwrap()
            .run_observed(payloads.clone(), |index, payload| {
                seen.push((index, payload.clone()));
            })
            .unwrap();

        assert_eq!(seen.len(), 10);
        for (i, (index, payload)) in seen.iter().enumerate() {
            assert_eq!(*index, i);
            assert_eq!(payload, &payloads[i]);
        }
    }

    #[test]
    fn test_noisy_channel_still_delivers() {
        let config = ArqConfig {
            gilbert: GilbertParams {
                p: 0.005,
                r: 0.1,
                k: 0.000_5,
                h: 0.1,
            },
            loss_probability: 0.2,
            seed: Some(42),
            max_iterations: Some(200_000),
            ..ArqConfig::default()
        };

        let payloads = text_payloads(30);
        let report = Simulation::new(config).unwrap().run(payloads.clone()).unwrap();

        assert_eq!(report.delivered, payloads);
        assert!(report.channel.bits_flipped > 0);
        assert!(report.channel.frames_lost > 0);
        assert!(report.receiver.corrupt + report.receiver.out_of_order > 0);
        assert!(report.sender.timeouts > 0);
        assert!(report.retransmissions() > 0);
        assert!(report.transmissions() > 30);
        assert!(report.efficiency() < 1.0);
    }

    #[test]
    fn test_total_loss_exhausts_budget() {
        let config = ArqConfig {
            loss_probability: 1.0,
            max_iterations: Some(500),
            ..ideal()
        };

        let err = Simulation::new(config)
            .unwrap()
            .run(text_payloads(3))
            .unwrap_err();

        match err {
            Error::RetryBudgetExhausted {
                delivered,
                target,
                iterations,
            } => {
                assert_eq!(delivered, 0);
                assert_eq!(target, 3);
                assert_eq!(iterations, 500);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_timeout_drives_retransmission() {
        // 손실 뒤 복구: tick 100ms, timeout 400ms
        let config = ArqConfig {
            loss_probability: 0.3,
            tick: Duration::from_millis(100),
            max_iterations: Some(50_000),
            ..ideal()
        };

        let report = Simulation::new(config).unwrap().run(text_payloads(20)).unwrap();
        assert!(report.is_complete());
        assert!(report.sender.timeouts > 0);
        assert!(report.channel.frames_lost > 0);
    }

    #[test]
    fn test_empty_payloads_finish_immediately() {
        let report = Simulation::new(ideal()).unwrap().run(Vec::new()).unwrap();
        assert_eq!(report.iterations, 0);
        assert_eq!(report.transmissions(), 0);
        assert_eq!(report.efficiency(), 0.0);
    }

    #[test]
    fn test_chunk_payloads() {
        let data: Vec<u8> = (0..10).collect();
        let chunks = chunk_payloads(&data, 4).unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(&chunks[2][..], &[8, 9]);
        assert_eq!(chunks.concat(), data);
        assert!(chunk_payloads(&data, 0).is_err());
    }

    #[test]
    fn test_text_payloads() {
        let payloads = text_payloads(3);
        assert_eq!(payloads[0], Bytes::from_static(b"Packet_1"));
        assert_eq!(payloads[2], Bytes::from_static(b"Packet_3"));
    }
}
