//! 术后生长时间线
//!
//! 密度曲线是固定的阶梯函数。第1个月为术后休克性脱发期，密度不高于术前，
//! 之后单调不减，最后一个检查点接近但不达到100%。

use hairsim_core::utils::percent_of;
use hairsim_core::{BaldingStage, DensityProfile, GraftEstimate, GrowthPhase, HairLength};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::grafts::GraftTable;

/// 检查点月份
pub const CHECKPOINT_MONTHS: [u32; 8] = [0, 1, 3, 6, 9, 12, 15, 18];

/// 最终效果（生成流程的锚点）
pub const TERMINAL_MONTH: u32 = 12;

/// 休克性脱发期
pub const SHOCK_LOSS_MONTH: u32 = 1;

/// 以最终效果为参照插值的中间检查点
pub const INTERMEDIATE_MONTHS: [u32; 3] = [3, 6, 9];

/// 最终效果之后的细化检查点
pub const REFINEMENT_MONTHS: [u32; 2] = [15, 18];

/// 截断到最近的检查点，距离相同时取较早的月份
pub fn clamp_to_checkpoint(month: i32) -> u32 {
    CHECKPOINT_MONTHS
        .iter()
        .copied()
        .min_by_key(|checkpoint| (*checkpoint as i64 - month as i64).abs())
        .unwrap_or(0)
}

/// 检查点的密度百分比
fn density_percent(checkpoint: u32) -> u8 {
    match checkpoint {
        0 => 0,
        1 => 0,
        3 => 15,
        6 => 50,
        9 => 80,
        12 => 95,
        15 => 98,
        _ => 99,
    }
}

/// 检查点的生长阶段
pub fn growth_phase(checkpoint: u32) -> GrowthPhase {
    match checkpoint {
        0 => GrowthPhase::PostOperative,
        1 => GrowthPhase::ShockLoss,
        2..=3 => GrowthPhase::EarlyGrowth,
        4..=6 => GrowthPhase::ActiveGrowth,
        7..=9 => GrowthPhase::Maturation,
        10..=12 => GrowthPhase::NearFinal,
        _ => GrowthPhase::Complete,
    }
}

/// 检查点的发长描述
pub fn hair_length(checkpoint: u32) -> HairLength {
    match checkpoint {
        0 => HairLength::new(0, 0, "Freshly implanted grafts"),
        1 => HairLength::new(0, 0, "Transplanted hairs shed, almost no visible growth"),
        3 => HairLength::new(1, 2, "Very fine, short baby hairs"),
        6 => HairLength::new(3, 5, "Thicker hairs, long enough to start styling"),
        9 => HairLength::new(5, 8, "Much thicker, fully formed hairline"),
        12 => HairLength::new(8, 10, "Mature hair, styled normally"),
        _ => HairLength::new(8, 12, "Fully mature, integrated hair"),
    }
}

/// 毛囊总数的来源
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "source", content = "value", rename_all = "snake_case")]
pub enum GraftSource {
    /// 按分级查表
    Table(GraftTable),
    /// 使用患者的估算结果
    Seeded(u32),
}

/// 生长时间线引擎
#[derive(Debug, Clone, Copy)]
pub struct TimelineEngine {
    source: GraftSource,
}

impl TimelineEngine {
    pub fn new(table: GraftTable) -> Self {
        Self {
            source: GraftSource::Table(table),
        }
    }

    /// 以患者的毛囊数估算结果为种子
    pub fn seeded(estimate: &GraftEstimate) -> Self {
        Self::with_total(estimate.total)
    }

    pub fn with_total(total_grafts: u32) -> Self {
        Self {
            source: GraftSource::Seeded(total_grafts),
        }
    }

    pub fn source(&self) -> GraftSource {
        self.source
    }

    /// 该分级对应的毛囊总数
    pub fn total_grafts(&self, stage: BaldingStage) -> u32 {
        match self.source {
            GraftSource::Table(table) => table.base_grafts(stage),
            GraftSource::Seeded(total) => total,
        }
    }

    /// 指定月份的密度预测，无效月份截断到最近的检查点
    pub fn density_at(&self, stage: BaldingStage, month: i32) -> DensityProfile {
        let checkpoint = clamp_to_checkpoint(month);
        if checkpoint as i32 != month {
            debug!("Month {} is not a checkpoint, clamped to {}", month, checkpoint);
        }

        let total_grafts = self.total_grafts(stage);
        let density_percent = density_percent(checkpoint);
        let phase = growth_phase(checkpoint);

        DensityProfile {
            month: checkpoint,
            requested_month: month,
            density_percent,
            active_grafts: percent_of(total_grafts, density_percent as u32),
            total_grafts,
            phase,
            stage_label: phase.description().to_string(),
            hair_length: hair_length(checkpoint),
        }
    }

    /// 全部检查点的密度预测
    pub fn timeline(&self, stage: BaldingStage) -> Vec<DensityProfile> {
        CHECKPOINT_MONTHS
            .iter()
            .map(|month| self.density_at(stage, *month as i32))
            .collect()
    }
}

impl Default for TimelineEngine {
    fn default() -> Self {
        Self::new(GraftTable::Legacy)
    }
}

/// 按默认（数字编码）对照表查询密度预测
pub fn density_at(stage: BaldingStage, month: i32) -> DensityProfile {
    TimelineEngine::default().density_at(stage, month)
}
