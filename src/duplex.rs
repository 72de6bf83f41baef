//! 동시 실행 드라이버
//!
//! 송신 태스크와 수신 태스크를 방향별 FIFO 큐 두 개로 연결한다.
//! 채널은 두 태스크가 `parking_lot::Mutex`로 공유하고, 송신자 상태는 송신 태스크만
//! 소유한다. ACK 처리와 타이머 검사는 한 태스크의 `select!` 안에서만 일어나므로
//! 서로 겹치지 않는다.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::channel::{build_medium, Medium};
use crate::config::{ArqConfig, ClockMode};
use crate::receiver::Receiver;
use crate::sender::Sender;
use crate::stats::SimulationReport;
use crate::timer::{ManualClock, SystemClock};
use crate::{Error, Result};

type SharedMedium = Arc<Mutex<Box<dyn Medium>>>;

/// 송신/수신 태스크로 페이로드 전송
pub async fn run_duplex(config: ArqConfig, payloads: Vec<Bytes>) -> Result<SimulationReport> {
    config.validate()?;

    let target = payloads.len();
    let started = Instant::now();

    let (sender, clock) = match config.clock_mode {
        ClockMode::Virtual => {
            let clock = ManualClock::new();
            let sender = Sender::new(&config)?.with_clock(Arc::new(clock.clone()));
            (sender, Some(clock))
        }
        ClockMode::Wall => (Sender::new(&config)?.with_clock(Arc::new(SystemClock)), None),
    };
    let receiver = Receiver::new(&config)?;
    let medium: SharedMedium = Arc::new(Mutex::new(build_medium(&config)));

    // 큐: 송신 -> 수신 (DATA), 수신 -> 송신 (ACK)
    let (data_tx, data_rx) = mpsc::unbounded_channel::<Bytes>();
    let (ack_tx, ack_rx) = mpsc::unbounded_channel::<Bytes>();
    let delivered = Arc::new(AtomicUsize::new(0));

    info!(
        "GBN 동시 실행 시작: payloads={}, N={}, MAX_SEQ={}",
        target,
        config.window_size,
        config.max_seq()
    );

    let receiver_task = tokio::spawn(receiver_loop(
        receiver,
        data_rx,
        ack_tx,
        medium.clone(),
        delivered.clone(),
    ));

    let sender_task = tokio::spawn(sender_loop(
        sender,
        payloads,
        data_tx,
        ack_rx,
        medium.clone(),
        config.clone(),
        clock,
    ));

    // 송신 태스크가 끝나면 DATA 큐가 닫히고 수신 태스크도 끝난다
    let sent = sender_task
        .await
        .map_err(|e| Error::Task(e.to_string()))?;
    let receiver = receiver_task
        .await
        .map_err(|e| Error::Task(e.to_string()))?;

    let (sender, iterations) = match sent {
        Ok(sent) => sent,
        Err(Error::RetryBudgetExhausted { iterations, .. }) => {
            return Err(Error::RetryBudgetExhausted {
                delivered: delivered.load(Ordering::Relaxed),
                target,
                iterations,
            });
        }
        Err(e) => return Err(e),
    };

    let channel = medium.lock().stats();
    let report = SimulationReport {
        target,
        iterations,
        elapsed: started.elapsed(),
        sender: sender.stats().clone(),
        receiver: receiver.stats().clone(),
        delivered: receiver.into_delivered(),
        channel,
    };
    info!("GBN 동시 실행 완료: {}", report.summary());

    Ok(report)
}

/// 송신 태스크
///
/// 윈도우를 채운 뒤 ACK 수신과 tick 중 먼저 오는 쪽을 처리한다.
/// 모든 프레임이 확인되면 송신자와 tick 횟수를 돌려준다.
async fn sender_loop(
    mut sender: Sender,
    payloads: Vec<Bytes>,
    data_tx: mpsc::UnboundedSender<Bytes>,
    mut ack_rx: mpsc::UnboundedReceiver<Bytes>,
    medium: SharedMedium,
    config: ArqConfig,
    clock: Option<ManualClock>,
) -> Result<(Sender, u64)> {
    let target = payloads.len();
    let mut pending: VecDeque<Bytes> = payloads.into();
    let mut ticker = tokio::time::interval(config.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut iterations = 0u64;

    loop {
        while sender.can_submit() {
            let Some(payload) = pending.pop_front() else {
                break;
            };
            let frame = sender.submit(payload)?;
            let out = {
                let mut medium = medium.lock();
                sender.transmit(&frame, &mut **medium)
            };
            if let Some(bytes) = out {
                data_tx.send(bytes).map_err(|_| Error::ChannelClosed)?;
            }
        }

        if pending.is_empty() && sender.in_flight() == 0 {
            debug!("모든 프레임 확인됨");
            break;
        }

        tokio::select! {
            Some(ack) = ack_rx.recv() => {
                sender.on_ack_bytes(Some(&ack[..]));
            }
            _ = ticker.tick() => {
                if let Some(limit) = config.max_iterations {
                    if iterations >= limit {
                        return Err(Error::RetryBudgetExhausted {
                            delivered: 0,
                            target,
                            iterations,
                        });
                    }
                }
                iterations += 1;

                if let Some(clock) = &clock {
                    clock.advance(config.tick);
                }

                if sender.check_timeout() {
                    let resent = {
                        let mut medium = medium.lock();
                        sender.retransmit_window(&mut **medium)
                    };
                    for bytes in resent.into_iter().flatten() {
                        data_tx.send(bytes).map_err(|_| Error::ChannelClosed)?;
                    }
                }
            }
        }
    }

    Ok((sender, iterations))
}

/// 수신 태스크
///
/// 도착한 DATA마다 ACK를 정확히 하나 만든다. DATA 큐가 닫히면 수신자를 돌려준다.
async fn receiver_loop(
    mut receiver: Receiver,
    mut data_rx: mpsc::UnboundedReceiver<Bytes>,
    ack_tx: mpsc::UnboundedSender<Bytes>,
    medium: SharedMedium,
    delivered: Arc<AtomicUsize>,
) -> Receiver {
    while let Some(data) = data_rx.recv().await {
        let ack = {
            let mut medium = medium.lock();
            receiver.on_frame(Some(&data[..]), &mut **medium)
        };
        delivered.store(receiver.delivered_len(), Ordering::Relaxed);

        if let Some(ack) = ack {
            if ack_tx.send(ack).is_err() {
                debug!("송신 태스크 종료됨, ACK 폐기");
            }
        }
    }

    receiver
}
