//! # HairSim 工作流模块
//!
//! 管理一次患者模拟的完整流程，包括：
//! - 步骤状态机：信息录入 → 照片上传 → 结果展示
//! - 会话状态：不可变的状态值，通过纯函数转换
//! - 影像集合：按检查点缓存生成结果，可单独重新生成
//! - 重试策略：统一应用于所有外部服务调用
//! - 时间线编排：先生成最终效果，再并发生成中间检查点

pub mod engine;
pub mod images;
pub mod retry;
pub mod services;
pub mod session;
pub mod state_machine;

// 重新导出主要类型
pub use engine::{
    CheckpointOutcome, OutcomeStatus, TimelineOrchestrator, TimelinePlan, TimelineReport,
};
pub use images::{CheckpointSlot, GeneratedImageSet};
pub use retry::RetryPolicy;
pub use services::{Classification, ImageGenerator, VisionClassifier};
pub use session::{
    AnalysisResult, PhotoLimits, PhotoView, SessionFlow, UploadedPhoto, WorkflowState,
};
pub use state_machine::{WorkflowEvent, WorkflowStateMachine, WorkflowStep};
