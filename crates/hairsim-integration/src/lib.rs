//! # HairSim 集成模块
//!
//! 提供与外部系统的集成能力，包括：
//! - AI网关连接器：视觉分类和影像生成
//! - 分类结果解析：从模型输出中提取结构化结果
//! - RESTful API：分析、生成和时间线查询接口

pub mod api;
pub mod classification;
pub mod gateway;

// 重新导出主要类型
pub use api::{create_router, ApiError, ApiServer, ApiState};
pub use classification::{parse_classification, CLASSIFICATION_PROMPT};
pub use gateway::{AiGatewayConnector, AuthenticationConfig, GatewayConfig};
