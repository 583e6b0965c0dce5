//! 外部服务调用的重试策略

use hairsim_core::{HairSimError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};

/// 重试策略，统一应用于分类和生成调用
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 最大尝试次数（含首次）
    pub max_attempts: u32,
    /// 首次重试前的等待时间
    pub initial_backoff: Duration,
    /// 等待时间上限
    pub max_backoff: Duration,
    /// 退避倍数
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// 不重试
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// 第 `attempt` 次失败之后的等待时间
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_backoff.as_secs_f64()))
    }

    /// 按策略执行操作
    pub async fn run<T, F, Fut>(&self, operation: &str, f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute(operation, f).await.0
    }

    /// 按策略执行操作，同时返回实际尝试次数
    ///
    /// 不可重试的错误立即原样返回；可重试的错误用尽次数后
    /// 包装为 `RetriesExhausted`。
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut f: F) -> (Result<T>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match f().await {
                Ok(value) => return (Ok(value), attempt),
                Err(e) if !e.is_retryable() => return (Err(e), attempt),
                Err(e) if attempt >= max_attempts => {
                    error!("{} failed after {} attempts: {}", operation, attempt, e);
                    return (
                        Err(HairSimError::RetriesExhausted {
                            attempts: attempt,
                            last_error: e.to_string(),
                        }),
                        attempt,
                    );
                }
                Err(e) => {
                    let backoff = self.backoff_after(attempt);
                    warn!("{} failed (attempt {}): {}", operation, attempt, e);
                    debug!("Retrying {} after {:?}", operation, backoff);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}
