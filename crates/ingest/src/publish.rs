//! 다운스트림 발행
//!
//! [`Publisher`]는 알림 배치를 받아 성공/실패를 돌려주는 싱크 인터페이스입니다.
//! 성공을 돌려받은 뒤에만 체크포인트가 전진하므로, 구현체는 배치 전체를
//! 실제로 기록했을 때만 `Ok`를 반환해야 합니다.
//!
//! - [`JsonLinesPublisher`]: 알림 하나를 JSON 한 줄로 stdout 또는 파일에 씁니다
//! - [`ChannelPublisher`]: tokio mpsc 채널로 넘깁니다 (임베딩, 테스트)

use std::path::Path;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc};
use u2post_core::BoxFuture;
use u2post_core::error::PublishError;

use crate::alert::AlertEvent;

/// 알림 배치 싱크
///
/// trait 객체(`Arc<dyn Publisher>`)로 쓰기 위해 boxed future를 반환합니다.
pub trait Publisher: Send + Sync {
    /// 싱크 이름 (로그용)
    fn name(&self) -> &str;

    /// 배치를 발행합니다.
    fn publish<'a>(&'a self, batch: &'a [AlertEvent]) -> BoxFuture<'a, Result<(), PublishError>>;
}

/// JSON Lines 발행기
pub struct JsonLinesPublisher {
    name: String,
    writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
}

impl JsonLinesPublisher {
    /// 표준 출력으로 씁니다.
    pub fn stdout() -> Self {
        Self::from_writer("stdout", tokio::io::stdout())
    }

    /// 파일 끝에 덧붙입니다. 파일이 없으면 만듭니다.
    pub async fn file(path: impl AsRef<Path>) -> Result<Self, PublishError> {
        let path = path.as_ref();
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| PublishError::Sink(format!("{}: {e}", path.display())))?;
        Ok(Self::from_writer(format!("file:{}", path.display()), file))
    }

    /// 임의의 writer로 씁니다.
    pub fn from_writer(
        name: impl Into<String>,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            writer: Mutex::new(Box::new(writer)),
        }
    }
}

impl Publisher for JsonLinesPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish<'a>(&'a self, batch: &'a [AlertEvent]) -> BoxFuture<'a, Result<(), PublishError>> {
        Box::pin(async move {
            let mut buf = Vec::with_capacity(batch.len() * 512);
            for event in batch {
                serde_json::to_writer(&mut buf, &event.alert)
                    .map_err(|e| PublishError::Serialize(e.to_string()))?;
                buf.push(b'\n');
            }

            let mut writer = self.writer.lock().await;
            writer
                .write_all(&buf)
                .await
                .map_err(|e| PublishError::Sink(e.to_string()))?;
            writer
                .flush()
                .await
                .map_err(|e| PublishError::Sink(e.to_string()))
        })
    }
}

/// mpsc 채널 발행기
#[derive(Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<AlertEvent>,
}

impl ChannelPublisher {
    /// 발행기와 수신 채널을 생성합니다.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AlertEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// 기존 송신측으로 발행기를 만듭니다.
    pub fn from_sender(tx: mpsc::Sender<AlertEvent>) -> Self {
        Self { tx }
    }
}

impl Publisher for ChannelPublisher {
    fn name(&self) -> &str {
        "channel"
    }

    fn publish<'a>(&'a self, batch: &'a [AlertEvent]) -> BoxFuture<'a, Result<(), PublishError>> {
        Box::pin(async move {
            for event in batch {
                self.tx
                    .send(event.clone())
                    .await
                    .map_err(|_| PublishError::Closed)?;
            }
            Ok(())
        })
    }
}
