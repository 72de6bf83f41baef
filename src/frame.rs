//! 프레임 정의와 와이어 코덱
//!
//! 와이어 포맷 (모든 정수는 big-endian):
//!
//! ```text
//! +----------------+-----+------+--------+----------+-------------+
//! | CRC-32 (4B)    | seq | kind | sender | receiver | payload ... |
//! +----------------+-----+------+--------+----------+-------------+
//! ```
//!
//! CRC는 체크섬 필드 뒤의 모든 바이트(헤더 + 페이로드)에 대해 계산된다.
//! 체크섬이 맨 앞에 있으므로 잘린 입력은 헤더 해석 전에 걸러진다.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

/// 시퀀스 번호 (와이어상 1바이트)
pub type SeqNum = u8;

/// 체크섬 필드 길이
pub const CHECKSUM_LEN: usize = 4;

/// 헤더 필드 길이 (seq + kind + sender + receiver)
pub const HEADER_LEN: usize = 4;

/// 체크섬 재계산에 필요한 최소 길이 (체크섬 4B + 헤더 최소 2B)
pub const MIN_FRAME_LEN: usize = CHECKSUM_LEN + 2;

/// 기본 데이터 송신자 ID
pub const DEFAULT_SENDER_ID: u8 = b'A';

/// 기본 데이터 수신자 ID
pub const DEFAULT_RECEIVER_ID: u8 = b'B';

/// 프레임 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// 데이터 프레임
    Data = 0,

    /// 누적 확인 응답
    Ack = 1,
}

impl FrameKind {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Data),
            1 => Some(Self::Ack),
            _ => None,
        }
    }
}

/// 송수신 단위 프레임
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 프레임 종류
    pub kind: FrameKind,

    /// DATA: 자기 번호, ACK: 다음 기대 번호
    pub seq_num: SeqNum,

    /// 페이로드 (ACK는 비어 있음)
    pub payload: Bytes,

    /// 송신 엔드포인트 태그 (ASCII 1바이트)
    pub sender_id: u8,

    /// 수신 엔드포인트 태그 (ASCII 1바이트)
    pub receiver_id: u8,

    /// 디코딩 시 CRC 검증 실패 여부
    corrupt: bool,
}

impl Frame {
    /// 데이터 프레임 생성
    pub fn data(seq_num: SeqNum, payload: Bytes, sender_id: u8, receiver_id: u8) -> Self {
        Self {
            kind: FrameKind::Data,
            seq_num,
            payload,
            sender_id,
            receiver_id,
            corrupt: false,
        }
    }

    /// ACK 프레임 생성
    pub fn ack(seq_num: SeqNum, sender_id: u8, receiver_id: u8) -> Self {
        Self {
            kind: FrameKind::Ack,
            seq_num,
            payload: Bytes::new(),
            sender_id,
            receiver_id,
            corrupt: false,
        }
    }

    /// 손상 프레임 (seq_num은 로그용으로만 의미가 있음)
    fn corrupted(seq_num: SeqNum) -> Self {
        Self {
            kind: FrameKind::Data,
            seq_num,
            payload: Bytes::new(),
            sender_id: DEFAULT_SENDER_ID,
            receiver_id: DEFAULT_RECEIVER_ID,
            corrupt: true,
        }
    }

    /// 프레임을 와이어 바이트로 직렬화
    pub fn encode(&self) -> Bytes {
        let mut content = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        content.put_u8(self.seq_num);
        content.put_u8(self.kind as u8);
        content.put_u8(self.sender_id);
        content.put_u8(self.receiver_id);
        content.put_slice(&self.payload);

        let crc = crc32fast::hash(&content);

        let mut buf = BytesMut::with_capacity(CHECKSUM_LEN + content.len());
        buf.put_u32(crc);
        buf.put_slice(&content);
        buf.freeze()
    }

    /// 와이어 바이트에서 프레임 역직렬화
    ///
    /// 실패하지 않는다. 구조가 깨졌거나 CRC가 맞지 않으면 손상 플래그가 선 프레임을
    /// 돌려주며, 이때 `seq_num` 외의 필드는 신뢰하면 안 된다.
    pub fn decode(data: &[u8]) -> Self {
        if data.len() < MIN_FRAME_LEN {
            return Self::corrupted(0);
        }

        let received_crc = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let content = &data[CHECKSUM_LEN..];

        if crc32fast::hash(content) != received_crc {
            // 로그용 SN 추출 (쓰레기일 수 있음)
            return Self::corrupted(content[0]);
        }

        if content.len() < HEADER_LEN {
            return Self::corrupted(0);
        }

        let kind = match FrameKind::from_code(content[1]) {
            Some(kind) => kind,
            None => return Self::corrupted(content[0]),
        };

        Self {
            kind,
            seq_num: content[0],
            payload: Bytes::copy_from_slice(&content[HEADER_LEN..]),
            sender_id: content[2],
            receiver_id: content[3],
            corrupt: false,
        }
    }

    /// CRC 검증 실패 여부
    pub fn is_corrupt(&self) -> bool {
        self.corrupt
    }

    /// 와이어상 길이
    pub fn wire_len(&self) -> usize {
        CHECKSUM_LEN + HEADER_LEN + self.payload.len()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.corrupt {
            return write!(f, "[CORRUPT: SN={}]", self.seq_num);
        }
        match self.kind {
            FrameKind::Data => write!(f, "[DATA: SN={}, {}B]", self.seq_num, self.payload.len()),
            FrameKind::Ack => write!(f, "[ACK: SN={}]", self.seq_num),
        }
    }
}

/// [`Frame::encode`]
pub fn encode(frame: &Frame) -> Bytes {
    frame.encode()
}

/// [`Frame::decode`]
pub fn decode(data: &[u8]) -> Frame {
    Frame::decode(data)
}

/// 바이트를 비트 문자열로 표시 (예: `01001000 11100101`)
///
/// 바이트 내 비트는 MSB부터 표시하며, 채널의 비트 처리 순서와 같다.
pub fn bits_to_string(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:08b}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Frame {
        Frame::data(5, Bytes::from_static(b"TestPayload"), b'A', b'B')
    }

    #[test]
    fn test_frame_roundtrip() {
        let frame = sample();
        let decoded = Frame::decode(&frame.encode());

        assert!(!decoded.is_corrupt());
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_ack_roundtrip() {
        let ack = Frame::ack(7, b'B', b'A');
        let decoded = decode(&encode(&ack));

        assert!(!decoded.is_corrupt());
        assert_eq!(decoded.kind, FrameKind::Ack);
        assert_eq!(decoded.seq_num, 7);
        assert!(decoded.payload.is_empty());
        assert_eq!(decoded.sender_id, b'B');
        assert_eq!(decoded.receiver_id, b'A');
    }

    #[test]
    fn test_wire_layout() {
        let bytes = sample().encode();

        assert_eq!(bytes.len(), sample().wire_len());
        assert_eq!(&bytes[4..8], &[5, 0, b'A', b'B']);
        assert_eq!(&bytes[8..], b"TestPayload");

        let crc = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(crc, crc32fast::hash(&bytes[4..]));
    }

    #[test]
    fn test_every_single_bit_flip_detected() {
        let bytes = sample().encode();

        for bit in 0..bytes.len() * 8 {
            let mut damaged = bytes.to_vec();
            damaged[bit / 8] ^= 0x80 >> (bit % 8);
            assert!(Frame::decode(&damaged).is_corrupt(), "bit {} not detected", bit);
        }
    }

    #[test]
    fn test_last_byte_corruption() {
        let mut bytes = Frame::data(1, Bytes::from_static(b"WazneDane"), b'A', b'B')
            .encode()
            .to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;

        let frame = Frame::decode(&bytes);
        assert!(frame.is_corrupt());
        // 헤더는 멀쩡하므로 로그용 SN은 유지됨
        assert_eq!(frame.seq_num, 1);
    }

    #[test]
    fn test_truncated_input() {
        for len in 0..MIN_FRAME_LEN {
            let frame = Frame::decode(&vec![0xAB; len]);
            assert!(frame.is_corrupt());
            assert_eq!(frame.seq_num, 0);
        }
    }

    #[test]
    fn test_short_header_with_valid_crc() {
        // CRC는 맞지만 헤더가 2바이트뿐
        let content = [3u8, 0];
        let mut bytes = crc32fast::hash(&content).to_be_bytes().to_vec();
        bytes.extend_from_slice(&content);

        let frame = Frame::decode(&bytes);
        assert!(frame.is_corrupt());
        assert_eq!(frame.seq_num, 0);
    }

    #[test]
    fn test_unknown_kind_is_corrupt() {
        let content = [2u8, 9, b'A', b'B'];
        let mut bytes = crc32fast::hash(&content).to_be_bytes().to_vec();
        bytes.extend_from_slice(&content);

        assert!(Frame::decode(&bytes).is_corrupt());
    }

    #[test]
    fn test_display_and_bits() {
        assert_eq!(Frame::ack(4, b'B', b'A').to_string(), "[ACK: SN=4]");
        assert_eq!(bits_to_string(&[0x48, 0xE5]), "01001000 11100101");
    }
}
