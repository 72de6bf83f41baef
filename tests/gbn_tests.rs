//! 송신자, 수신자, 채널을 묶은 통합 테스트
//!
//! 드라이버 없이 직접 조립한 경우와 `Simulation` / `run_duplex`를 통한 경우를 모두 본다.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use gbn::{
    run_duplex, text_payloads, AckOutcome, ArqConfig, ChannelModel, ChannelStats, Frame,
    FrameKind, GilbertElliott, GilbertParams, Ideal, ManualClock, Medium, Receiver, Sender,
    Simulation,
};

/// 지정한 순번의 전송만 한 비트 뒤집는 채널
struct FlipNth {
    inner: Ideal,
    count: usize,
    targets: Vec<usize>,
}

impl FlipNth {
    fn new(targets: &[usize]) -> Self {
        Self {
            inner: Ideal::default(),
            count: 0,
            targets: targets.to_vec(),
        }
    }
}

impl Medium for FlipNth {
    fn propagate(&mut self, data: &[u8]) -> Option<Bytes> {
        let n = self.count;
        self.count += 1;
        let out = self.inner.propagate(data)?;
        if !self.targets.contains(&n) {
            return Some(out);
        }
        let mut damaged = out.to_vec();
        let last = damaged.len() - 1;
        damaged[last] ^= 0x01;
        Some(Bytes::from(damaged))
    }

    fn stats(&self) -> ChannelStats {
        self.inner.stats()
    }
}

fn config() -> ArqConfig {
    ArqConfig {
        window_size: 4,
        seq_bits: 3,
        timeout: Duration::from_millis(400),
        ..ArqConfig::default()
    }
}

fn pair() -> (Sender, Receiver, ManualClock) {
    let clock = ManualClock::new();
    let sender = Sender::new(&config())
        .unwrap()
        .with_clock(Arc::new(clock.clone()));
    let receiver = Receiver::new(&config()).unwrap();
    (sender, receiver, clock)
}

// ---------------------------------------------------------------------------
// 무손실 채널에서 순서대로 전달
// ---------------------------------------------------------------------------

#[test]
fn test_ideal_transfer_preserves_order() {
    let config = ArqConfig {
        channel_model: ChannelModel::Ideal,
        max_iterations: Some(1_000),
        ..config()
    };
    let payloads = text_payloads(15);

    let report = Simulation::new(config).unwrap().run(payloads.clone()).unwrap();

    assert_eq!(report.delivered, payloads);
    assert_eq!(report.retransmissions(), 0);
    // DATA 15개 + ACK 15개
    assert_eq!(report.channel.frames, 30);
    assert_eq!(report.channel.bits_flipped, 0);
}

// ---------------------------------------------------------------------------
// 손상 프레임 -> 중복 ACK -> 타임아웃 -> 윈도우 재전송
// ---------------------------------------------------------------------------

#[test]
fn test_corrupt_frame_recovered_by_go_back_n() {
    let (mut sender, mut receiver, clock) = pair();
    // 세 번째 전송(순번 2, SN=1 DATA) 손상. 각 DATA 뒤에 ACK가 채널을 타므로 DATA 순번은 0, 2, 4, ...
    let mut medium = FlipNth::new(&[2]);

    let mut acks = Vec::new();
    for i in 0..4u8 {
        let data = sender.send(vec![i], &mut medium).unwrap();
        let ack = receiver.on_frame(data.as_deref(), &mut medium);
        acks.push(sender.on_ack_bytes(ack.as_deref()));
    }

    // SN=0만 수락, 나머지는 ACK 1 반복
    assert_eq!(acks[0], AckOutcome::Advanced(1));
    assert_eq!(&acks[1..], &[AckOutcome::Duplicate; 3]);
    assert_eq!(receiver.delivered_len(), 1);
    assert_eq!(sender.base(), 1);
    assert_eq!(sender.in_flight(), 3);

    // 중복 ACK는 타이머를 재시작하지 않는다
    assert!(sender.timer_running());
    clock.advance(Duration::from_millis(401));
    assert!(sender.check_timeout());
    assert!(!sender.check_timeout());

    let resent = sender.retransmit_window(&mut medium);
    assert_eq!(resent.len(), 3);
    for data in resent {
        let ack = receiver.on_frame(data.as_deref(), &mut medium);
        sender.on_ack_bytes(ack.as_deref());
    }

    assert_eq!(
        receiver.delivered(),
        &[
            Bytes::from_static(&[0]),
            Bytes::from_static(&[1]),
            Bytes::from_static(&[2]),
            Bytes::from_static(&[3]),
        ]
    );
    assert_eq!(sender.in_flight(), 0);
    assert!(!sender.timer_running());
    assert_eq!(sender.stats().retransmissions, 3);
}

// ---------------------------------------------------------------------------
// 손상된 ACK는 무시되고 다음 누적 ACK가 대신 확인한다
// ---------------------------------------------------------------------------

#[test]
fn test_corrupt_ack_covered_by_later_ack() {
    let (mut sender, mut receiver, _clock) = pair();
    // 두 번째 전송 = SN=0의 ACK
    let mut medium = FlipNth::new(&[1]);

    let data = sender.send(&b"a"[..], &mut medium).unwrap();
    let ack = receiver.on_frame(data.as_deref(), &mut medium);
    assert_eq!(sender.on_ack_bytes(ack.as_deref()), AckOutcome::Corrupt);
    assert_eq!(sender.base(), 0);

    let data = sender.send(&b"b"[..], &mut medium).unwrap();
    let ack = receiver.on_frame(data.as_deref(), &mut medium);
    assert_eq!(sender.on_ack_bytes(ack.as_deref()), AckOutcome::Advanced(2));
    assert_eq!(sender.in_flight(), 0);
    assert_eq!(receiver.delivered_len(), 2);
}

// ---------------------------------------------------------------------------
// 잡음 채널: 윈도우 불변식과 순서 보장
// ---------------------------------------------------------------------------

#[test]
fn test_window_bound_holds_under_noise() {
    let (mut sender, mut receiver, clock) = pair();
    let params = GilbertParams {
        p: 0.002,
        r: 0.1,
        k: 0.000_1,
        h: 0.05,
    };
    let mut medium = GilbertElliott::new(params, Some(2024));
    let payloads = text_payloads(40);
    let mut next = 0;
    let mut iterations = 0;

    while receiver.delivered_len() < payloads.len() {
        iterations += 1;
        assert!(iterations < 200_000, "no progress");

        if sender.can_submit() && next < payloads.len() {
            let data = sender.send(payloads[next].clone(), &mut medium).unwrap();
            next += 1;
            let ack = receiver.on_frame(data.as_deref(), &mut medium);
            sender.on_ack_bytes(ack.as_deref());
        }
        if sender.check_timeout() {
            for data in sender.retransmit_window(&mut medium) {
                let ack = receiver.on_frame(data.as_deref(), &mut medium);
                sender.on_ack_bytes(ack.as_deref());
            }
        }

        assert!(sender.in_flight() <= sender.window_size());
        assert!(receiver.delivered_len() <= next);
        clock.advance(Duration::from_millis(10));
    }

    assert_eq!(receiver.delivered(), &payloads[..]);
    assert!(medium.stats().bits_flipped > 0);
}

// ---------------------------------------------------------------------------
// 같은 시드는 같은 결과
// ---------------------------------------------------------------------------

#[test]
fn test_seeded_runs_are_reproducible() {
    let config = ArqConfig {
        gilbert: GilbertParams {
            p: 0.001,
            r: 0.1,
            k: 0.000_01,
            h: 0.02,
        },
        loss_probability: 0.05,
        seed: Some(77),
        max_iterations: Some(200_000),
        ..config()
    };

    let a = Simulation::new(config.clone()).unwrap().run(text_payloads(30)).unwrap();
    let b = Simulation::new(config).unwrap().run(text_payloads(30)).unwrap();

    assert_eq!(a.delivered, b.delivered);
    assert_eq!(a.iterations, b.iterations);
    assert_eq!(a.sender, b.sender);
    assert_eq!(a.receiver, b.receiver);
    assert_eq!(a.channel, b.channel);
}

// ---------------------------------------------------------------------------
// 수신 프레임의 방향 ID
// ---------------------------------------------------------------------------

#[test]
fn test_ack_direction_ids() {
    let (mut sender, mut receiver, _clock) = pair();
    let mut medium = Ideal::default();

    let data = sender.send(&b"id"[..], &mut medium).unwrap().unwrap();
    let frame = Frame::decode(&data);
    assert_eq!((frame.sender_id, frame.receiver_id), (b'A', b'B'));

    let ack = receiver.on_frame(Some(&data[..]), &mut medium).unwrap();
    let ack = Frame::decode(&ack);
    assert_eq!(ack.kind, FrameKind::Ack);
    assert_eq!((ack.sender_id, ack.receiver_id), (b'B', b'A'));
}

// ---------------------------------------------------------------------------
// 동시 실행 드라이버 + 버스트 잡음
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_duplex_over_bursty_channel() {
    let config = ArqConfig {
        gilbert: GilbertParams {
            p: 0.001,
            r: 0.1,
            k: 0.000_01,
            h: 0.02,
        },
        seed: Some(5),
        tick: Duration::from_millis(1),
        timeout: Duration::from_millis(20),
        max_iterations: Some(200_000),
        ..config()
    };
    let payloads = text_payloads(30);

    let report = run_duplex(config, payloads.clone()).await.unwrap();

    assert_eq!(report.delivered, payloads);
    assert!(report.transmissions() >= 30);
}
