//! 影像生成参数
//!
//! 每个检查点的影像都是独立生成的。为了让整组影像读起来像同一个连续的生长过程，
//! 中间检查点必须同时参照术前影像和最终效果影像，并给出明确的数值目标。

use hairsim_core::{
    BaldingStage, HairCharacteristics, HairLength, HairSimError, HairTexture, Result,
};
use serde::{Deserialize, Serialize};

use crate::timeline::{clamp_to_checkpoint, TimelineEngine, SHOCK_LOSS_MONTH, TERMINAL_MONTH};

/// 最终效果的密度区间
const FINAL_DENSITY_MIN: u8 = 90;
const FINAL_DENSITY_MAX: u8 = 95;

/// 发送给生成服务的参照影像
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceImage {
    /// 术前原始照片
    Before,
    /// 第12个月的最终效果
    After,
}

/// 检查点类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    ShockLoss,
    Interpolated,
    Final,
    Refinement,
}

/// 密度目标
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum DensityTarget {
    /// 不高于术前（休克性脱发）
    AtMostBaseline,
    /// 最终效果影像中可见头发的百分比
    RelativeToFinal { percent: u8 },
    /// 移植毛囊中长出终毛的比例区间
    Band { min_percent: u8, max_percent: u8 },
    /// 不低于最终效果
    AtLeastFinal { percent: u8 },
}

impl DensityTarget {
    /// 目标中出现的最大百分比
    pub fn upper_percent(&self) -> Option<u8> {
        match self {
            DensityTarget::AtMostBaseline => None,
            DensityTarget::RelativeToFinal { percent } => Some(*percent),
            DensityTarget::Band { max_percent, .. } => Some(*max_percent),
            DensityTarget::AtLeastFinal { percent } => Some(*percent),
        }
    }
}

/// 发际线设计指导，分级越严重越保守
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HairlineGuidance {
    Youthful,
    Mature,
    Conservative,
    ExtensiveConservative,
}

impl HairlineGuidance {
    pub fn for_stage(stage: BaldingStage) -> Self {
        match stage {
            BaldingStage::I | BaldingStage::II | BaldingStage::IIa => HairlineGuidance::Youthful,
            BaldingStage::III | BaldingStage::IIIa | BaldingStage::IIIVertex => {
                HairlineGuidance::Mature
            }
            BaldingStage::IV | BaldingStage::IVa | BaldingStage::V => {
                HairlineGuidance::Conservative
            }
            BaldingStage::Va | BaldingStage::VI | BaldingStage::VII => {
                HairlineGuidance::ExtensiveConservative
            }
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            HairlineGuidance::Youthful => "Restore to a youthful, natural hairline position",
            HairlineGuidance::Mature => {
                "Create an age-appropriate mature hairline (not a teenage hairline)"
            }
            HairlineGuidance::Conservative => {
                "Conservative, mature hairline suitable for age 35-45"
            }
            HairlineGuidance::ExtensiveConservative => {
                "Age-appropriate conservative hairline for extensive restoration (age 40-55)"
            }
        }
    }
}

/// 需要在生成结果中保持的外观
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HairAppearance {
    pub color: String,
    pub texture: HairTexture,
}

impl From<&HairCharacteristics> for HairAppearance {
    fn from(characteristics: &HairCharacteristics) -> Self {
        Self {
            color: characteristics.color.clone(),
            texture: characteristics.texture,
        }
    }
}

/// 某个检查点的生成参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSpec {
    pub kind: CheckpointKind,
    pub stage: BaldingStage,
    pub month: u32,
    pub total_grafts: u32,
    pub active_grafts: u32,
    pub density: DensityTarget,
    pub hair_length: HairLength,
    pub hairline: Option<HairlineGuidance>,
    pub crown_restoration: bool,
    pub references: Vec<ReferenceImage>,
    pub appearance: Option<HairAppearance>,
}

impl GenerationSpec {
    pub fn with_appearance(mut self, appearance: HairAppearance) -> Self {
        self.appearance = Some(appearance);
        self
    }

    /// 是否需要最终效果影像作为参照
    pub fn requires_final_reference(&self) -> bool {
        self.references.contains(&ReferenceImage::After)
    }
}

/// 中间检查点相对最终效果的密度与发长
fn interpolation_target(month: u32) -> (u8, HairLength) {
    match month {
        3 => (20, HairLength::new(1, 2, "very short, fine baby hairs, too short to style")),
        6 => (50, HairLength::new(4, 6, "medium length, can be lightly styled")),
        _ => (80, HairLength::new(7, 9, "long, mature and fully styleable")),
    }
}

/// 推导某个检查点的生成参数
///
/// 月份按检查点规则截断。第0个月即原始照片，没有可生成的内容；
/// 毛囊总数为0说明上游估算出了问题，两者都作为参数错误返回。
pub fn derive_generation_parameters(
    stage: BaldingStage,
    month: i32,
    total_grafts: u32,
) -> Result<GenerationSpec> {
    if total_grafts == 0 {
        return Err(HairSimError::GenerationParameter(format!(
            "Total grafts must be positive (stage {}, month {})",
            stage, month
        )));
    }

    let profile = TimelineEngine::with_total(total_grafts).density_at(stage, month);
    let checkpoint = clamp_to_checkpoint(month);

    let spec = match checkpoint {
        0 => {
            return Err(HairSimError::GenerationParameter(
                "Month 0 is the original photo and is never generated".to_string(),
            ))
        }
        SHOCK_LOSS_MONTH => GenerationSpec {
            kind: CheckpointKind::ShockLoss,
            stage,
            month: checkpoint,
            total_grafts,
            active_grafts: profile.active_grafts,
            density: DensityTarget::AtMostBaseline,
            hair_length: profile.hair_length,
            hairline: None,
            crown_restoration: false,
            references: vec![ReferenceImage::Before],
            appearance: None,
        },
        TERMINAL_MONTH => GenerationSpec {
            kind: CheckpointKind::Final,
            stage,
            month: checkpoint,
            total_grafts,
            active_grafts: profile.active_grafts,
            density: DensityTarget::Band {
                min_percent: FINAL_DENSITY_MIN,
                max_percent: FINAL_DENSITY_MAX,
            },
            hair_length: HairLength::new(8, 12, "naturally styled"),
            hairline: Some(HairlineGuidance::for_stage(stage)),
            crown_restoration: stage.involves_vertex(),
            references: vec![ReferenceImage::Before],
            appearance: None,
        },
        m if m < TERMINAL_MONTH => {
            let (percent, hair_length) = interpolation_target(m);
            GenerationSpec {
                kind: CheckpointKind::Interpolated,
                stage,
                month: checkpoint,
                total_grafts,
                active_grafts: profile.active_grafts,
                density: DensityTarget::RelativeToFinal { percent },
                hair_length,
                hairline: None,
                crown_restoration: stage.involves_vertex(),
                references: vec![ReferenceImage::Before, ReferenceImage::After],
                appearance: None,
            }
        }
        _ => GenerationSpec {
            kind: CheckpointKind::Refinement,
            stage,
            month: checkpoint,
            total_grafts,
            active_grafts: profile.active_grafts,
            density: DensityTarget::AtLeastFinal {
                percent: profile.density_percent,
            },
            hair_length: profile.hair_length,
            hairline: None,
            crown_restoration: stage.involves_vertex(),
            references: vec![ReferenceImage::Before, ReferenceImage::After],
            appearance: None,
        },
    };

    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{INTERMEDIATE_MONTHS, REFINEMENT_MONTHS};

    #[test]
    fn test_final_never_claims_full_density() {
        for stage in BaldingStage::ALL {
            let spec = derive_generation_parameters(stage, TERMINAL_MONTH as i32, 3000).unwrap();
            assert_eq!(spec.kind, CheckpointKind::Final);
            assert!(spec.density.upper_percent().unwrap() < 100);
            assert_eq!(spec.density, DensityTarget::Band { min_percent: 90, max_percent: 95 });
            assert_eq!((spec.hair_length.min_cm, spec.hair_length.max_cm), (8, 12));
            assert_eq!(spec.references, vec![ReferenceImage::Before]);
        }
    }

    #[test]
    fn test_intermediate_targets_strictly_increase() {
        let targets: Vec<u8> = INTERMEDIATE_MONTHS
            .iter()
            .map(|m| {
                let spec = derive_generation_parameters(BaldingStage::IV, *m as i32, 3600).unwrap();
                assert_eq!(spec.kind, CheckpointKind::Interpolated);
                assert!(spec.requires_final_reference());
                assert!(spec.references.contains(&ReferenceImage::Before));
                match spec.density {
                    DensityTarget::RelativeToFinal { percent } => percent,
                    other => panic!("unexpected target {:?}", other),
                }
            })
            .collect();

        assert_eq!(targets, vec![20, 50, 80]);
    }

    #[test]
    fn test_intermediate_lengths_grow() {
        let lengths: Vec<u8> = INTERMEDIATE_MONTHS
            .iter()
            .map(|m| {
                derive_generation_parameters(BaldingStage::III, *m as i32, 2000)
                    .unwrap()
                    .hair_length
                    .max_cm
            })
            .collect();
        assert!(lengths.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_shock_loss_stays_at_or_below_baseline() {
        let spec = derive_generation_parameters(BaldingStage::V, 1, 4000).unwrap();
        assert_eq!(spec.kind, CheckpointKind::ShockLoss);
        assert_eq!(spec.density, DensityTarget::AtMostBaseline);
        assert_eq!(spec.active_grafts, 0);
        assert!(!spec.requires_final_reference());
    }

    #[test]
    fn test_refinement_checkpoints() {
        for month in REFINEMENT_MONTHS {
            let spec = derive_generation_parameters(BaldingStage::VI, month as i32, 5000).unwrap();
            assert_eq!(spec.kind, CheckpointKind::Refinement);
            assert!(spec.density.upper_percent().unwrap() < 100);
            assert!(spec.requires_final_reference());
        }
    }

    #[test]
    fn test_hairline_guidance_by_severity() {
        assert_eq!(HairlineGuidance::for_stage(BaldingStage::IIa), HairlineGuidance::Youthful);
        assert_eq!(HairlineGuidance::for_stage(BaldingStage::IIIVertex), HairlineGuidance::Mature);
        assert_eq!(HairlineGuidance::for_stage(BaldingStage::V), HairlineGuidance::Conservative);
        assert_eq!(
            HairlineGuidance::for_stage(BaldingStage::VII),
            HairlineGuidance::ExtensiveConservative
        );

        let spec = derive_generation_parameters(BaldingStage::III, 12, 2000).unwrap();
        assert!(!spec.crown_restoration);
        let spec = derive_generation_parameters(BaldingStage::IV, 12, 3300).unwrap();
        assert!(spec.crown_restoration);
    }

    #[test]
    fn test_invalid_inputs_fail_loudly() {
        assert!(matches!(
            derive_generation_parameters(BaldingStage::IV, 6, 0),
            Err(HairSimError::GenerationParameter(_))
        ));
        assert!(matches!(
            derive_generation_parameters(BaldingStage::IV, 0, 3000),
            Err(HairSimError::GenerationParameter(_))
        ));
    }

    #[test]
    fn test_slider_months_are_clamped() {
        let spec = derive_generation_parameters(BaldingStage::IV, 7, 3000).unwrap();
        assert_eq!(spec.month, 6);
        assert_eq!(spec.density, DensityTarget::RelativeToFinal { percent: 50 });
        assert_eq!(spec.active_grafts, 1500);
    }

    #[test]
    fn test_serializes_camel_case() {
        let spec = derive_generation_parameters(BaldingStage::IV, 12, 3600).unwrap();
        let value = serde_json::to_value(&spec).unwrap();

        assert_eq!(value["totalGrafts"], 3600);
        assert_eq!(value["crownRestoration"], true);
        assert_eq!(value["density"]["kind"], "band");
        assert_eq!(value["density"]["minPercent"], 90);
        assert_eq!(value["hairLength"]["maxCm"], 12);
        assert!(value.get("total_grafts").is_none());
    }
}
