#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use u2post_unified2::{decode, encode_record};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    tag: FuzzTag,
    body: Vec<u8>,
}

#[derive(Arbitrary, Debug)]
enum FuzzTag {
    Event,
    EventIp6,
    EventV2,
    EventIp6V2,
    Packet,
    ExtraData,
    Other(u32),
}

impl FuzzTag {
    fn value(&self) -> u32 {
        match self {
            FuzzTag::Event => 7,
            FuzzTag::EventIp6 => 72,
            FuzzTag::EventV2 => 104,
            FuzzTag::EventIp6V2 => 105,
            FuzzTag::Packet => 2,
            FuzzTag::ExtraData => 110,
            FuzzTag::Other(tag) => *tag,
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    // 크래시나 패닉 없이 Ok 또는 Err을 반환해야 한다
    let Ok(Some(record)) = decode(input.tag.value(), Bytes::from(input.body)) else {
        return;
    };

    // 디코딩된 레코드는 다시 인코딩해도 같은 레코드로 읽힌다
    let raw = encode_record(&record).expect("decoded record must re-encode");
    let again = raw
        .decode()
        .expect("re-encoded record must decode")
        .expect("re-encoded record has a known tag");
    assert_eq!(again, record);
});
