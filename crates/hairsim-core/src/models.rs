//! 核心数据模型定义

use crate::error::{HairSimError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Norwood-Hamilton 脱发分级
///
/// 声明顺序即严重程度顺序，`A` 型变体紧跟在其基础分级之后。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BaldingStage {
    #[serde(rename = "I")]
    I,
    #[serde(rename = "II")]
    II,
    #[serde(rename = "IIa")]
    IIa,
    #[serde(rename = "III")]
    III,
    #[serde(rename = "IIIa")]
    IIIa,
    #[serde(rename = "III Vertex")]
    IIIVertex,
    #[serde(rename = "IV")]
    IV,
    #[serde(rename = "IVa")]
    IVa,
    #[serde(rename = "V")]
    V,
    #[serde(rename = "Va")]
    Va,
    #[serde(rename = "VI")]
    VI,
    #[serde(rename = "VII")]
    VII,
}

impl BaldingStage {
    /// 全部分级，按严重程度排列
    pub const ALL: [BaldingStage; 12] = [
        BaldingStage::I,
        BaldingStage::II,
        BaldingStage::IIa,
        BaldingStage::III,
        BaldingStage::IIIa,
        BaldingStage::IIIVertex,
        BaldingStage::IV,
        BaldingStage::IVa,
        BaldingStage::V,
        BaldingStage::Va,
        BaldingStage::VI,
        BaldingStage::VII,
    ];

    /// 基础阶梯（不含变体）
    pub const BASE_LADDER: [BaldingStage; 7] = [
        BaldingStage::I,
        BaldingStage::II,
        BaldingStage::III,
        BaldingStage::IV,
        BaldingStage::V,
        BaldingStage::VI,
        BaldingStage::VII,
    ];

    /// 罗马数字标签
    pub fn label(&self) -> &'static str {
        match self {
            BaldingStage::I => "I",
            BaldingStage::II => "II",
            BaldingStage::IIa => "IIa",
            BaldingStage::III => "III",
            BaldingStage::IIIa => "IIIa",
            BaldingStage::IIIVertex => "III Vertex",
            BaldingStage::IV => "IV",
            BaldingStage::IVa => "IVa",
            BaldingStage::V => "V",
            BaldingStage::Va => "Va",
            BaldingStage::VI => "VI",
            BaldingStage::VII => "VII",
        }
    }

    /// 数字编码（旧版分类器使用）
    pub fn norwood_code(&self) -> &'static str {
        match self {
            BaldingStage::I => "1",
            BaldingStage::II => "2",
            BaldingStage::IIa => "2A",
            BaldingStage::III => "3",
            BaldingStage::IIIa => "3A",
            BaldingStage::IIIVertex => "3V",
            BaldingStage::IV => "4",
            BaldingStage::IVa => "4A",
            BaldingStage::V => "5",
            BaldingStage::Va => "5A",
            BaldingStage::VI => "6",
            BaldingStage::VII => "7",
        }
    }

    /// 解析分类器输出，同时接受罗马数字标签和数字编码
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();

        let normalized = ["NORWOODSTAGE", "NORWOOD", "STAGE"]
            .iter()
            .find_map(|prefix| normalized.strip_prefix(*prefix))
            .unwrap_or(normalized.as_str());

        if normalized.is_empty() {
            return None;
        }

        Self::ALL.into_iter().find(|stage| {
            let label = stage.label().replace(' ', "").to_ascii_uppercase();
            normalized == label
                || normalized == stage.norwood_code()
                || (*stage == BaldingStage::IIIVertex && normalized == "IIIV")
        })
    }

    /// 变体所属的基础分级
    pub fn base_stage(&self) -> BaldingStage {
        match self {
            BaldingStage::IIa => BaldingStage::II,
            BaldingStage::IIIa | BaldingStage::IIIVertex => BaldingStage::III,
            BaldingStage::IVa => BaldingStage::IV,
            BaldingStage::Va => BaldingStage::V,
            other => *other,
        }
    }

    /// 是否为变体分级
    pub fn is_variant(&self) -> bool {
        self.base_stage() != *self
    }

    /// 是否累及头顶
    pub fn involves_vertex(&self) -> bool {
        *self >= BaldingStage::IIIVertex
    }
}

impl fmt::Display for BaldingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BaldingStage {
    type Err = HairSimError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
            .ok_or_else(|| HairSimError::Validation(format!("Unknown balding stage: {}", s)))
    }
}

/// 分类器给出的分级，可能无法识别
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StageInput {
    Known(BaldingStage),
    Unrecognized(String),
}

impl StageInput {
    /// 无法识别时替代的中等严重度分级
    pub const DEFAULT_STAGE: BaldingStage = BaldingStage::IIIVertex;

    pub fn parse(raw: &str) -> Self {
        match BaldingStage::parse(raw) {
            Some(stage) => StageInput::Known(stage),
            None => StageInput::Unrecognized(raw.trim().to_string()),
        }
    }

    /// 实际参与计算的分级
    pub fn effective_stage(&self) -> BaldingStage {
        match self {
            StageInput::Known(stage) => *stage,
            StageInput::Unrecognized(_) => Self::DEFAULT_STAGE,
        }
    }

    pub fn is_recognized(&self) -> bool {
        matches!(self, StageInput::Known(_))
    }

    /// 未识别时的替代记录，`baseline_grafts` 为替代分级的基础毛囊数
    pub fn fallback(&self, baseline_grafts: u32) -> Option<StageFallback> {
        match self {
            StageInput::Known(_) => None,
            StageInput::Unrecognized(raw) => Some(StageFallback {
                raw: raw.clone(),
                substituted: Self::DEFAULT_STAGE,
                baseline_grafts,
            }),
        }
    }

    /// 原始标签
    pub fn raw_label(&self) -> String {
        match self {
            StageInput::Known(stage) => stage.label().to_string(),
            StageInput::Unrecognized(raw) => raw.clone(),
        }
    }
}

impl From<BaldingStage> for StageInput {
    fn from(stage: BaldingStage) -> Self {
        StageInput::Known(stage)
    }
}

/// 发丝粗细
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HairThickness {
    Fine,
    #[default]
    Medium,
    Coarse,
}

impl HairThickness {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fine" | "thin" => Some(HairThickness::Fine),
            "medium" | "normal" => Some(HairThickness::Medium),
            "coarse" | "thick" => Some(HairThickness::Coarse),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HairThickness::Fine => "fine",
            HairThickness::Medium => "medium",
            HairThickness::Coarse => "coarse",
        }
    }
}

/// 发质纹理
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HairTexture {
    #[default]
    Straight,
    Wavy,
    Curly,
}

impl HairTexture {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "straight" => Some(HairTexture::Straight),
            "wavy" => Some(HairTexture::Wavy),
            "curly" | "coily" => Some(HairTexture::Curly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HairTexture::Straight => "straight",
            HairTexture::Wavy => "wavy",
            HairTexture::Curly => "curly",
        }
    }
}

/// 发色与头皮的对比度
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HairContrast {
    Low,
    #[default]
    Medium,
    High,
}

impl HairContrast {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(HairContrast::Low),
            "medium" | "moderate" => Some(HairContrast::Medium),
            "high" => Some(HairContrast::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HairContrast::Low => "low",
            HairContrast::Medium => "medium",
            HairContrast::High => "high",
        }
    }
}

/// 头发特征
///
/// `color` 和 `scalp_tone` 只用于生成描述，不参与毛囊数计算。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HairCharacteristics {
    pub thickness: HairThickness,
    pub texture: HairTexture,
    pub contrast: HairContrast,
    #[serde(default)]
    pub color: String,
    #[serde(default, alias = "scalpColor")]
    pub scalp_tone: String,
}

impl HairCharacteristics {
    pub fn new(thickness: HairThickness, texture: HairTexture, contrast: HairContrast) -> Self {
        Self {
            thickness,
            texture,
            contrast,
            color: String::new(),
            scalp_tone: String::new(),
        }
    }
}

/// 各解剖区域的毛囊分配
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GraftBreakdown {
    pub hairline: u32,
    pub mid_scalp: u32,
    pub crown: u32,
    pub temples: u32,
}

impl GraftBreakdown {
    pub fn sum(&self) -> u32 {
        self.hairline + self.mid_scalp + self.crown + self.temples
    }

    /// 与总数之间的舍入偏差
    pub fn deviation_from(&self, total: u32) -> u32 {
        self.sum().abs_diff(total)
    }
}

/// 未识别分级时的替代记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StageFallback {
    /// 分类器原始输出
    pub raw: String,
    pub substituted: BaldingStage,
    pub baseline_grafts: u32,
}

/// 毛囊数估算结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GraftEstimate {
    pub stage: BaldingStage,
    pub base_grafts: u32,
    /// 取整到100
    pub total: u32,
    pub breakdown: GraftBreakdown,
    pub fallback: Option<StageFallback>,
}

impl GraftEstimate {
    pub fn fallback_used(&self) -> bool {
        self.fallback.is_some()
    }
}

/// 术后生长阶段
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GrowthPhase {
    PostOperative,
    ShockLoss,
    EarlyGrowth,
    ActiveGrowth,
    Maturation,
    NearFinal,
    Complete,
}

impl GrowthPhase {
    pub fn description(&self) -> &'static str {
        match self {
            GrowthPhase::PostOperative => "Immediately post-surgery",
            GrowthPhase::ShockLoss => "Healing phase (shock loss)",
            GrowthPhase::EarlyGrowth => "Early growth phase",
            GrowthPhase::ActiveGrowth => "Active growth phase",
            GrowthPhase::Maturation => "Maturation phase",
            GrowthPhase::NearFinal => "Near-final results",
            GrowthPhase::Complete => "Complete transformation",
        }
    }
}

/// 头发长度描述
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HairLength {
    pub min_cm: u8,
    pub max_cm: u8,
    pub descriptor: String,
}

impl HairLength {
    pub fn new(min_cm: u8, max_cm: u8, descriptor: impl Into<String>) -> Self {
        Self {
            min_cm,
            max_cm,
            descriptor: descriptor.into(),
        }
    }

    /// 如 "4-6cm"
    pub fn range_label(&self) -> String {
        format!("{}-{}cm", self.min_cm, self.max_cm)
    }
}

/// 某个检查点月份的密度预测
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DensityProfile {
    pub month: u32,
    /// 调用方传入的月份，截断前
    pub requested_month: i32,
    pub density_percent: u8,
    pub active_grafts: u32,
    pub total_grafts: u32,
    pub phase: GrowthPhase,
    pub stage_label: String,
    pub hair_length: HairLength,
}

impl DensityProfile {
    pub fn was_clamped(&self) -> bool {
        self.requested_month != self.month as i32
    }
}

/// 影像引用（URL 或 data URL），内容对系统不透明
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ImageHandle(String);

impl ImageHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for ImageHandle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ImageHandle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // data URL 可能有几 MB
        if self.0.chars().count() > 64 {
            let prefix: String = self.0.chars().take(64).collect();
            write!(f, "{}...", prefix)
        } else {
            f.write_str(&self.0)
        }
    }
}

/// 患者基本信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PatientInfo {
    pub name: String,
    pub age: u8,
    pub procedure_id: String,
}
