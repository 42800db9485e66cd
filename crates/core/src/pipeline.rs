//! 파이프라인 trait -- 컴포넌트 생명주기 정의
//!
//! [`Pipeline`]은 데몬이 관리하는 장기 실행 컴포넌트의 공통 인터페이스입니다.
//! `async fn`을 쓰는 trait은 dyn-compatible하지 않으므로, trait 객체가 필요한
//! 곳에서는 [`DynPipeline`]을 사용합니다. 모든 `Pipeline` 구현체는
//! blanket impl로 `DynPipeline`이 됩니다.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::U2PostError;

/// `Send` 가능한 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 컴포넌트 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 문제가 있음
    Degraded(String),
    /// 동작하지 않음
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 장기 실행 컴포넌트의 생명주기 trait
///
/// `start`는 백그라운드 태스크를 띄운 뒤 즉시 반환하고,
/// `stop`은 진행 중인 작업을 마무리한 뒤 반환해야 합니다.
pub trait Pipeline: Send + Sync {
    /// 컴포넌트를 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), U2PostError>> + Send;

    /// 컴포넌트를 정지합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), U2PostError>> + Send;

    /// 현재 상태를 보고합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// trait 객체로 사용할 수 있는 [`Pipeline`]
pub trait DynPipeline: Send + Sync {
    /// 컴포넌트를 시작합니다.
    fn start(&mut self) -> BoxFuture<'_, Result<(), U2PostError>>;

    /// 컴포넌트를 정지합니다.
    fn stop(&mut self) -> BoxFuture<'_, Result<(), U2PostError>>;

    /// 현재 상태를 보고합니다.
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

impl<T: Pipeline> DynPipeline for T {
    fn start(&mut self) -> BoxFuture<'_, Result<(), U2PostError>> {
        Box::pin(Pipeline::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), U2PostError>> {
        Box::pin(Pipeline::stop(self))
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Pipeline::health_check(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        running: bool,
        starts: u32,
    }

    impl Pipeline for Counter {
        async fn start(&mut self) -> Result<(), U2PostError> {
            self.running = true;
            self.starts += 1;
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), U2PostError> {
            self.running = false;
            Ok(())
        }

        async fn health_check(&self) -> HealthStatus {
            if self.running {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy("stopped".to_owned())
            }
        }
    }

    #[tokio::test]
    async fn dyn_pipeline_delegates_to_pipeline() {
        let mut boxed: Box<dyn DynPipeline> = Box::new(Counter {
            running: false,
            starts: 0,
        });
        assert!(boxed.health_check().await.is_unhealthy());
        boxed.start().await.unwrap();
        assert!(boxed.health_check().await.is_healthy());
        boxed.stop().await.unwrap();
        assert!(boxed.health_check().await.is_unhealthy());
    }

    #[test]
    fn health_status_display() {
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
        assert_eq!(
            HealthStatus::Degraded("publish failing".to_owned()).to_string(),
            "degraded: publish failing"
        );
    }
}
