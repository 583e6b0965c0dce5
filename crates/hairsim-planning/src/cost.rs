//! 费用估算
//!
//! 费用区间只取决于毛囊总数。单价有两种口径，按命名预设保留。

use hairsim_core::utils::round_half_up_div;
use hairsim_core::GraftEstimate;
use serde::{Deserialize, Serialize};

/// 单价的定点精度（美元千分位）
const RATE_SCALE: u64 = 1000;

/// 费用口径
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CostModel {
    /// 每毛囊 2.5 到 5 美元
    #[default]
    PerGraftRange,
    /// 每毛囊平均 3.5 美元，上下浮动 20%
    AverageBand,
}

impl CostModel {
    /// 每毛囊的最低、最高单价（美元千分位）
    pub fn rates(&self) -> (u64, u64) {
        match self {
            CostModel::PerGraftRange => (2500, 5000),
            CostModel::AverageBand => (2800, 4200),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CostModel::PerGraftRange => "per_graft_range",
            CostModel::AverageBand => "average_band",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "per_graft_range" | "range" => Some(CostModel::PerGraftRange),
            "average_band" | "average" => Some(CostModel::AverageBand),
            _ => None,
        }
    }

    /// 按毛囊总数估算费用区间，四舍五入到美元
    pub fn estimate(&self, total_grafts: u32) -> CostEstimate {
        let (min_rate, max_rate) = self.rates();
        let total = total_grafts as u64;

        CostEstimate {
            model: *self,
            min_usd: round_half_up_div(total * min_rate, RATE_SCALE),
            max_usd: round_half_up_div(total * max_rate, RATE_SCALE),
        }
    }

    pub fn for_grafts(&self, estimate: &GraftEstimate) -> CostEstimate {
        self.estimate(estimate.total)
    }
}

/// 费用区间（美元）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub model: CostModel,
    pub min_usd: u64,
    pub max_usd: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_graft_range() {
        let cost = CostModel::PerGraftRange.estimate(3600);
        assert_eq!(cost.min_usd, 9000);
        assert_eq!(cost.max_usd, 18000);
    }

    #[test]
    fn test_average_band() {
        // 3600 x 3.5 = 12600，上下浮动 20%
        let cost = CostModel::AverageBand.estimate(3600);
        assert_eq!(cost.min_usd, 10080);
        assert_eq!(cost.max_usd, 15120);

        // 2.8 x 1 = 2.8 → 3
        let cost = CostModel::AverageBand.estimate(1);
        assert_eq!((cost.min_usd, cost.max_usd), (3, 4));
    }

    #[test]
    fn test_no_grafts_costs_nothing() {
        for model in [CostModel::PerGraftRange, CostModel::AverageBand] {
            let cost = model.estimate(0);
            assert_eq!((cost.min_usd, cost.max_usd), (0, 0));
        }
    }

    #[test]
    fn test_parse_and_serde() {
        assert_eq!(CostModel::parse("average-band"), Some(CostModel::AverageBand));
        assert_eq!(CostModel::parse("range"), Some(CostModel::PerGraftRange));
        assert_eq!(CostModel::parse("flat"), None);

        let value = serde_json::to_value(CostModel::AverageBand.estimate(2000)).unwrap();
        assert_eq!(value["model"], "average_band");
        assert_eq!(value["minUsd"], 5600);
        assert_eq!(value["maxUsd"], 8400);
    }
}
