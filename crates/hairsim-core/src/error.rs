//! 错误定义模块

use thiserror::Error;

/// 植发模拟系统统一错误类型
#[derive(Error, Debug)]
pub enum HairSimError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("验证错误: {0}")]
    Validation(String),

    /// 生成参数无法构造，属于调用方或配置错误
    #[error("生成参数错误: {0}")]
    GenerationParameter(String),

    #[error("分类结果无效: {0}")]
    Classification(String),

    #[error("第 {month} 个月影像生成失败: {message}")]
    Generation { month: u32, message: String },

    #[error("AI网关错误 (HTTP {status}): {message}")]
    Gateway { status: u16, message: String },

    #[error("AI网关限流")]
    RateLimited,

    #[error("网络错误: {0}")]
    Transport(String),

    #[error("重试 {attempts} 次后仍失败: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("无效状态转换: 从 {from} 到 {event}")]
    InvalidStateTransition { from: String, event: String },

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

impl HairSimError {
    /// 是否值得按重试策略再次尝试
    pub fn is_retryable(&self) -> bool {
        match self {
            HairSimError::RateLimited => true,
            HairSimError::Transport(_) => true,
            HairSimError::Gateway { status, .. } => *status >= 500,
            HairSimError::Generation { .. } => true,
            _ => false,
        }
    }
}

/// 植发模拟系统统一结果类型
pub type Result<T> = std::result::Result<T, HairSimError>;
