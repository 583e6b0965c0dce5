//! 外部服务接口
//!
//! 视觉分类和影像生成都由外部 AI 服务提供，这里只定义边界。

use async_trait::async_trait;
use hairsim_core::{HairCharacteristics, ImageHandle, Result, StageInput};
use serde::{Deserialize, Serialize};

/// 视觉分类结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub stage: StageInput,
    /// 0.0 - 1.0
    pub confidence: f32,
    pub characteristics: HairCharacteristics,
    /// 解析过程中被替换为默认值的字段
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// 视觉分类服务
#[async_trait]
pub trait VisionClassifier: Send + Sync {
    /// 正面照必需，头顶照可选
    async fn classify(
        &self,
        front: &ImageHandle,
        top: Option<&ImageHandle>,
    ) -> Result<Classification>;
}

/// 影像生成服务
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// 按参照影像和文字指令生成新影像
    async fn generate(&self, prompt: &str, references: &[ImageHandle]) -> Result<ImageHandle>;
}
