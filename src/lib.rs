//! # GBN (Go-Back-N ARQ 시뮬레이터)
//!
//! 버스트 오류가 있는 잡음 채널 위에서 신뢰성 있는 순서 보장 전달을 시뮬레이션
//!
//! ## 핵심 특징
//! - **CRC-32 프레임**: 손상 프레임은 실패 대신 손상 표시로 디코딩
//! - **Gilbert-Elliott 채널**: Good/Bad 2상태 마르코프 버스트 오류, BSC/무손실/손실 전략
//! - **슬라이딩 윈도우**: 누적 ACK, `base`에 걸린 단일 재전송 타이머
//! - **Go-Back-N 복구**: 타임아웃 시 미확인 프레임 전부 재전송
//! - **암묵적 NACK**: 수신자는 손상/순서 위반 프레임에 기대 번호 ACK를 반복
//! - **결정적 실행**: 시드 고정 난수 + 가상 시계
//! - **동시 실행 드라이버**: tokio 태스크 두 개를 FIFO 큐로 연결

pub mod channel;
pub mod config;
pub mod duplex;
pub mod error;
pub mod experiment;
pub mod frame;
pub mod receiver;
pub mod sender;
pub mod simulation;
pub mod stats;
pub mod timer;

pub use channel::{build_medium, Bsc, ChannelState, GilbertElliott, Ideal, Lossy, Medium};
pub use config::{ArqConfig, ChannelModel, ClockMode, GilbertParams};
pub use duplex::run_duplex;
pub use error::{Error, Result};
pub use frame::{Frame, FrameKind, SeqNum};
pub use receiver::Receiver;
pub use sender::{AckOutcome, Sender};
pub use simulation::{chunk_payloads, text_payloads, Simulation};
pub use stats::{ChannelStats, SimulationReport, TransferStats};
pub use timer::{Clock, ManualClock, SystemClock};

/// 기본 송신 윈도우 크기
pub const DEFAULT_WINDOW_SIZE: usize = 4;

/// 기본 시퀀스 번호 비트 수 (MAX_SEQ = 8)
pub const DEFAULT_SEQ_BITS: u8 = 3;

/// 기본 청크 크기 (바이트)
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// 텍스트 시뮬레이션 기본 패킷 수
pub const DEFAULT_TARGET_PACKETS: usize = 30;
