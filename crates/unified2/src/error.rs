//! unified2 에러 타입

/// 레코드 본문 디코딩 에러
///
/// 필드 하나를 읽을 때마다 남은 길이를 확인하므로, 짧은 입력은
/// 패닉 없이 이 에러로 보고됩니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// 필드를 읽기 전에 버퍼가 끝남
    #[error(
        "{record} record truncated at field '{field}' (offset {offset}): need {needed} bytes, have {available}"
    )]
    Truncated {
        /// 레코드 종류
        record: &'static str,
        /// 읽으려던 필드
        field: &'static str,
        /// 본문 내 필드 시작 위치
        offset: usize,
        /// 필드 폭
        needed: usize,
        /// 남은 바이트 수
        available: usize,
    },
}

impl DecodeError {
    /// 이벤트 레코드 디코딩 중 난 에러인지
    pub fn is_event(&self) -> bool {
        match self {
            Self::Truncated { record, .. } => *record == "event",
        }
    }
}

/// 레코드 인코딩 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// 주소 체계가 이벤트 형식과 맞지 않음
    #[error("{field} address family does not match event kind {kind}")]
    AddressFamily {
        /// 이벤트 형식 이름
        kind: String,
        /// 문제 필드 (src_ip, dst_ip)
        field: &'static str,
    },

    /// 본문이 u32 길이 필드에 들어가지 않음
    #[error("record body too large to frame: {len} bytes")]
    TooLarge {
        /// 본문 길이
        len: usize,
    },
}

/// unified2 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum Unified2Error {
    /// 본문 디코딩 실패
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// 인코딩 실패
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// 헤더에 선언된 길이가 허용 상한을 넘음
    #[error("record at offset {offset} declares {length} bytes (max {max})")]
    RecordTooLarge {
        /// 레코드 시작 오프셋
        offset: u64,
        /// 선언된 본문 길이
        length: u32,
        /// 허용 상한
        max: u32,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Unified2Error {
    /// 레코드 하나만 버리고 계속 읽을 수 있는 에러인지
    pub fn is_record_local(&self) -> bool {
        matches!(self, Self::Decode(_))
    }

    /// 이벤트 레코드를 디코딩하지 못했는지
    pub fn is_event_decode(&self) -> bool {
        matches!(self, Self::Decode(e) if e.is_event())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_display_names_field() {
        let err = DecodeError::Truncated {
            record: "packet",
            field: "linktype",
            offset: 20,
            needed: 4,
            available: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("packet"));
        assert!(msg.contains("linktype"));
        assert!(msg.contains("offset 20"));
    }

    #[test]
    fn only_decode_errors_are_record_local() {
        let decode: Unified2Error = DecodeError::Truncated {
            record: "event",
            field: "sensor_id",
            offset: 0,
            needed: 4,
            available: 0,
        }
        .into();
        assert!(decode.is_record_local());
        assert!(decode.is_event_decode());

        let framing = Unified2Error::RecordTooLarge {
            offset: 0,
            length: u32::MAX,
            max: 1024,
        };
        assert!(!framing.is_record_local());
        assert!(!framing.is_event_decode());
    }

    #[test]
    fn packet_decode_error_is_not_event_decode() {
        let err = DecodeError::Truncated {
            record: "packet",
            field: "linktype",
            offset: 20,
            needed: 4,
            available: 2,
        };
        assert!(!err.is_event());
        assert!(!Unified2Error::from(err).is_event_decode());
    }
}
