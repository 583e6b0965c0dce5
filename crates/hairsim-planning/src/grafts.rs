//! 毛囊数估算
//!
//! 基础毛囊数来自分级对照表，再乘以粗细、对比度、纹理三个调整系数，
//! 结果按临床习惯取整到100。区域分配按固定比例各自取整，不强制与总数相等。

use hairsim_core::utils::{percent_of, round_to_step};
use hairsim_core::{
    BaldingStage, GraftBreakdown, GraftEstimate, HairCharacteristics, HairContrast, HairTexture,
    HairThickness, StageInput,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// 调整系数的定点精度（千分比）
const FACTOR_SCALE: u64 = 1000;

/// 总数取整粒度
const GRAFT_ROUNDING_STEP: u64 = 100;

/// 分级→基础毛囊数对照表
///
/// 两张表在相近严重度下并不一致（如 IV 为 3300 对 3000），
/// 哪一张代表预期的临床标定尚无定论，因此都以命名预设的形式保留。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GraftTable {
    /// 罗马数字分级表，估算器默认使用
    #[default]
    Clinical,
    /// 数字编码分级表，密度时间线默认使用
    Legacy,
}

impl GraftTable {
    /// 查询基础毛囊数
    pub fn base_grafts(&self, stage: BaldingStage) -> u32 {
        match self {
            GraftTable::Clinical => match stage {
                BaldingStage::I => 0,
                BaldingStage::II => 1200,
                BaldingStage::IIa => 1500,
                BaldingStage::III => 2000,
                BaldingStage::IIIa => 2300,
                BaldingStage::IIIVertex => 2500,
                BaldingStage::IV => 3300,
                BaldingStage::IVa => 3600,
                BaldingStage::V => 4000,
                BaldingStage::Va => 4400,
                BaldingStage::VI => 5000,
                BaldingStage::VII => 6000,
            },
            GraftTable::Legacy => match stage {
                BaldingStage::I => 0,
                BaldingStage::II => 1500,
                BaldingStage::IIa => 1800,
                BaldingStage::III => 2000,
                BaldingStage::IIIa => 2300,
                BaldingStage::IIIVertex => 2500,
                BaldingStage::IV => 3000,
                BaldingStage::IVa => 3500,
                BaldingStage::V => 3500,
                BaldingStage::Va => 4000,
                BaldingStage::VI => 4500,
                BaldingStage::VII => 5500,
            },
        }
    }

    /// 分级无法识别时使用的基础毛囊数
    pub fn fallback_grafts(&self) -> u32 {
        self.base_grafts(StageInput::DEFAULT_STAGE)
    }

    pub fn name(&self) -> &'static str {
        match self {
            GraftTable::Clinical => "clinical",
            GraftTable::Legacy => "legacy",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "clinical" => Some(GraftTable::Clinical),
            "legacy" => Some(GraftTable::Legacy),
            _ => None,
        }
    }
}

/// 调整系数（千分比，1000 = 1.0）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdjustmentFactors {
    pub thickness: u32,
    pub contrast: u32,
    pub texture: u32,
}

impl AdjustmentFactors {
    pub fn for_characteristics(characteristics: &HairCharacteristics) -> Self {
        Self {
            thickness: Self::thickness_factor(characteristics.thickness),
            contrast: Self::contrast_factor(characteristics.contrast),
            texture: Self::texture_factor(characteristics.texture),
        }
    }

    /// 细发覆盖力弱，需要更多毛囊
    pub fn thickness_factor(thickness: HairThickness) -> u32 {
        match thickness {
            HairThickness::Fine => 1150,
            HairThickness::Medium => 1000,
            HairThickness::Coarse => 900,
        }
    }

    /// 发色与头皮对比越强，稀疏越显眼
    pub fn contrast_factor(contrast: HairContrast) -> u32 {
        match contrast {
            HairContrast::Low => 950,
            HairContrast::Medium => 1000,
            HairContrast::High => 1100,
        }
    }

    pub fn texture_factor(texture: HairTexture) -> u32 {
        match texture {
            HairTexture::Straight => 1000,
            HairTexture::Wavy => 950,
            HairTexture::Curly => 900,
        }
    }

    /// 三个系数之积（浮点，仅用于展示）
    pub fn combined(&self) -> f64 {
        (self.thickness as f64 / 1000.0)
            * (self.contrast as f64 / 1000.0)
            * (self.texture as f64 / 1000.0)
    }

    fn apply(&self, base_grafts: u32) -> u64 {
        base_grafts as u64 * self.thickness as u64 * self.contrast as u64 * self.texture as u64
    }
}

/// 各区域占比（百分比）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ZoneShares {
    pub hairline: u32,
    pub mid_scalp: u32,
    pub crown: u32,
    pub temples: u32,
}

impl ZoneShares {
    pub fn total(&self) -> u32 {
        self.hairline + self.mid_scalp + self.crown + self.temples
    }

    /// 各区域独立取整
    pub fn split(&self, total: u32) -> GraftBreakdown {
        GraftBreakdown {
            hairline: percent_of(total, self.hairline),
            mid_scalp: percent_of(total, self.mid_scalp),
            crown: percent_of(total, self.crown),
            temples: percent_of(total, self.temples),
        }
    }
}

pub const ZONE_SHARES: ZoneShares = ZoneShares {
    hairline: 35,
    mid_scalp: 25,
    crown: 25,
    temples: 15,
};

/// 毛囊数估算器
#[derive(Debug, Clone, Copy, Default)]
pub struct GraftEstimator {
    table: GraftTable,
}

impl GraftEstimator {
    pub fn new(table: GraftTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> GraftTable {
        self.table
    }

    /// 估算毛囊数
    ///
    /// 无法识别的分级不会报错：使用默认分级的基础毛囊数继续计算，
    /// 并在结果的 `fallback` 字段中记录替代情况。
    pub fn estimate(
        &self,
        stage: &StageInput,
        characteristics: &HairCharacteristics,
    ) -> GraftEstimate {
        let effective = stage.effective_stage();
        let base_grafts = self.table.base_grafts(effective);

        let fallback = stage.fallback(base_grafts);
        if let Some(fallback) = &fallback {
            warn!(
                "Unrecognized balding stage '{}', substituting {} ({} grafts)",
                fallback.raw, effective, base_grafts
            );
        }

        let factors = AdjustmentFactors::for_characteristics(characteristics);
        let scale = FACTOR_SCALE * FACTOR_SCALE * FACTOR_SCALE;
        let total = round_to_step(factors.apply(base_grafts), scale, GRAFT_ROUNDING_STEP) as u32;
        let breakdown = ZONE_SHARES.split(total);

        debug!(
            "Graft estimate for {} ({} table): base {} x {:.4} -> {}",
            effective,
            self.table.name(),
            base_grafts,
            factors.combined(),
            total
        );

        GraftEstimate {
            stage: effective,
            base_grafts,
            total,
            breakdown,
            fallback,
        }
    }

    /// 已知分级的便捷入口
    pub fn estimate_stage(
        &self,
        stage: BaldingStage,
        characteristics: &HairCharacteristics,
    ) -> GraftEstimate {
        self.estimate(&StageInput::Known(stage), characteristics)
    }

    /// 直接使用分类器输出的标签
    pub fn estimate_label(
        &self,
        raw_stage: &str,
        characteristics: &HairCharacteristics,
    ) -> GraftEstimate {
        self.estimate(&StageInput::parse(raw_stage), characteristics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_characteristics() -> Vec<HairCharacteristics> {
        let mut out = Vec::new();
        for thickness in [HairThickness::Fine, HairThickness::Medium, HairThickness::Coarse] {
            for texture in [HairTexture::Straight, HairTexture::Wavy, HairTexture::Curly] {
                for contrast in [HairContrast::Low, HairContrast::Medium, HairContrast::High] {
                    out.push(HairCharacteristics::new(thickness, texture, contrast));
                }
            }
        }
        out
    }

    fn straight(thickness: HairThickness, contrast: HairContrast) -> HairCharacteristics {
        HairCharacteristics::new(thickness, HairTexture::Straight, contrast)
    }

    #[test]
    fn test_stage_iv_high_contrast() {
        let estimator = GraftEstimator::default();
        let characteristics = straight(HairThickness::Medium, HairContrast::High);

        let estimate = estimator.estimate_stage(BaldingStage::IV, &characteristics);

        assert_eq!(estimate.base_grafts, 3300);
        assert_eq!(estimate.total, 3600);
        assert_eq!(
            estimate.breakdown,
            GraftBreakdown { hairline: 1260, mid_scalp: 900, crown: 900, temples: 540 }
        );
        assert!(!estimate.fallback_used());
    }

    #[test]
    fn test_totals_are_multiples_of_100() {
        for table in [GraftTable::Clinical, GraftTable::Legacy] {
            let estimator = GraftEstimator::new(table);
            for stage in BaldingStage::ALL {
                for characteristics in all_characteristics() {
                    let estimate = estimator.estimate_stage(stage, &characteristics);
                    assert_eq!(estimate.total % 100, 0, "{} {:?}", stage, characteristics);
                }
            }
        }
    }

    #[test]
    fn test_breakdown_within_rounding_tolerance() {
        assert_eq!(ZONE_SHARES.total(), 100);

        let estimator = GraftEstimator::default();
        for stage in BaldingStage::ALL {
            for characteristics in all_characteristics() {
                let estimate = estimator.estimate_stage(stage, &characteristics);
                assert!(estimate.breakdown.deviation_from(estimate.total) <= 4);
            }
        }
    }

    #[test]
    fn test_base_ladder_is_monotonic() {
        for table in [GraftTable::Clinical, GraftTable::Legacy] {
            let ladder: Vec<u32> = BaldingStage::BASE_LADDER
                .iter()
                .map(|stage| table.base_grafts(*stage))
                .collect();
            assert!(ladder.windows(2).all(|w| w[0] <= w[1]), "{:?}: {:?}", table, ladder);
        }
    }

    #[test]
    fn test_presets_diverge_for_comparable_severity() {
        assert_eq!(GraftTable::Clinical.base_grafts(BaldingStage::IV), 3300);
        assert_eq!(GraftTable::Legacy.base_grafts(BaldingStage::IV), 3000);
        assert_eq!(GraftTable::Clinical.fallback_grafts(), 2500);
        assert_eq!(GraftTable::Legacy.fallback_grafts(), 2500);
    }

    #[test]
    fn test_unrecognized_stage_falls_back() {
        let estimator = GraftEstimator::default();
        let estimate = estimator.estimate_label("XII", &HairCharacteristics::default());

        assert!(estimate.fallback_used());
        let fallback = estimate.fallback.as_ref().unwrap();
        assert_eq!(fallback.raw, "XII");
        assert_eq!(fallback.substituted, StageInput::DEFAULT_STAGE);
        assert_eq!(fallback.baseline_grafts, 2500);
        assert_eq!(estimate.total, 2500);
    }

    #[test]
    fn test_rounds_to_nearest_hundred() {
        let estimator = GraftEstimator::default();

        // 2300 x 1.15 x 0.95 = 2512.75
        let fine_low = straight(HairThickness::Fine, HairContrast::Low);
        assert_eq!(estimator.estimate_stage(BaldingStage::IIIa, &fine_low).total, 2500);

        // 1500 x 0.9 x 1.1 = 1485
        let coarse_high = straight(HairThickness::Coarse, HairContrast::High);
        assert_eq!(estimator.estimate_stage(BaldingStage::IIa, &coarse_high).total, 1500);

        // 1500 x 0.95 = 1425
        let medium_low = straight(HairThickness::Medium, HairContrast::Low);
        assert_eq!(estimator.estimate_stage(BaldingStage::IIa, &medium_low).total, 1400);

        // 3000 x 1.15 x 0.95 = 3277.5
        let legacy = GraftEstimator::new(GraftTable::Legacy);
        assert_eq!(legacy.estimate_stage(BaldingStage::IV, &fine_low).total, 3300);
    }

    #[test]
    fn test_exact_half_rounds_up() {
        let estimator = GraftEstimator::default();

        // 1500 x 1.1 = 1650
        let medium_high = straight(HairThickness::Medium, HairContrast::High);
        assert_eq!(estimator.estimate_stage(BaldingStage::IIa, &medium_high).total, 1700);

        // 2500 x 0.9 = 2250
        let coarse = straight(HairThickness::Coarse, HairContrast::Medium);
        assert_eq!(estimator.estimate_stage(BaldingStage::IIIVertex, &coarse).total, 2300);

        // 5000 x 0.95 = 4750
        let medium_low = straight(HairThickness::Medium, HairContrast::Low);
        assert_eq!(estimator.estimate_stage(BaldingStage::VI, &medium_low).total, 4800);
    }

    #[test]
    fn test_stage_one_needs_no_grafts() {
        let estimate = GraftEstimator::default()
            .estimate_stage(BaldingStage::I, &HairCharacteristics::default());
        assert_eq!(estimate.total, 0);
        assert_eq!(estimate.breakdown.sum(), 0);
    }
}
