//! 스풀 수집 모듈 -- unified2 스풀 디렉토리에서 레코드를 읽습니다.
//!
//! - [`SpoolReader`]: 접두어가 같은 파일을 이름순으로 tail하며 파일 경계를 넘는 리더
//! - [`Archiver`]: 다 읽은 파일을 보관 이름으로 바꾸는 소비자
//!
//! # 아키텍처
//! 리더는 파일을 넘어갈 때 [`ClosedFile`]을 `mpsc::UnboundedSender`로 보냅니다.
//! 파이프라인은 이 알림을 플러시 태스크를 거쳐 보관기로 전달하므로,
//! 파일은 그 안의 알림이 발행되고 체크포인트가 넘어간 뒤에만 보관됩니다.

pub mod archive;
pub mod spool;

pub use archive::Archiver;
pub use spool::{ClosedFile, SpoolReader};
