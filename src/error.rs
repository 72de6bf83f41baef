//! 에러 타입 정의
//!
//! 프로토콜 코어(코덱, 채널, 송수신자)는 실패하지 않는다. 손상/손실/순서 위반은
//! 모두 프로토콜 이벤트로 처리되고, 여기의 에러는 설정 검증과 드라이버 계층에서만 나온다.

use thiserror::Error;

use crate::frame::SeqNum;

/// GBN 시뮬레이터 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("유효하지 않은 설정: {0}")]
    InvalidConfig(String),

    #[error("윈도우 가득 참: base={base}, next_seq_num={next_seq_num}")]
    WindowFull { base: SeqNum, next_seq_num: SeqNum },

    #[error("재시도 예산 소진: {delivered}/{target} 전달, {iterations} 반복")]
    RetryBudgetExhausted {
        delivered: usize,
        target: usize,
        iterations: u64,
    },

    #[error("유효하지 않은 인자: {0}")]
    InvalidArgument(String),

    #[error("채널 종료")]
    ChannelClosed,

    #[error("태스크 실패: {0}")]
    Task(String),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
