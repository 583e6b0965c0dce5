//! # HairSim 规划模块
//!
//! 植发模拟的确定性核心：
//! - 毛囊数估算：根据脱发分级和头发特征计算所需毛囊数及区域分配
//! - 生长时间线：各检查点月份的密度、活跃毛囊数、发长和生长阶段
//! - 费用估算：按毛囊总数给出费用区间
//! - 生成参数：把密度预测转换成发送给外部影像生成服务的结构化指令
//!
//! 全部为纯函数，无I/O，无共享可变状态。

pub mod cost;
pub mod generation;
pub mod grafts;
pub mod prompt;
pub mod timeline;

pub use cost::{CostEstimate, CostModel};
pub use generation::{
    derive_generation_parameters, CheckpointKind, DensityTarget, GenerationSpec, HairAppearance,
    HairlineGuidance, ReferenceImage,
};
pub use grafts::{AdjustmentFactors, GraftEstimator, GraftTable, ZoneShares, ZONE_SHARES};
pub use timeline::{
    clamp_to_checkpoint, density_at, TimelineEngine, CHECKPOINT_MONTHS, INTERMEDIATE_MONTHS,
    REFINEMENT_MONTHS, SHOCK_LOSS_MONTH, TERMINAL_MONTH,
};
