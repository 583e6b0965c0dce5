//! 生成影像集合
//!
//! 第0个月固定为原始照片，其余检查点各自独立地填充、失败或重新生成。

use chrono::{DateTime, Utc};
use hairsim_core::{HairSimError, ImageHandle, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 单个检查点的影像状态
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckpointSlot {
    Pending,
    Ready {
        handle: ImageHandle,
        generated_at: DateTime<Utc>,
    },
    Failed {
        error: String,
        attempts: u32,
    },
}

impl CheckpointSlot {
    pub fn handle(&self) -> Option<&ImageHandle> {
        match self {
            CheckpointSlot::Ready { handle, .. } => Some(handle),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, CheckpointSlot::Ready { .. })
    }
}

/// 一位患者的生成影像集合
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImageSet {
    original: ImageHandle,
    slots: BTreeMap<u32, CheckpointSlot>,
}

impl GeneratedImageSet {
    /// 创建影像集合，除原始照片外全部为待生成
    pub fn new(original: ImageHandle, months: impl IntoIterator<Item = u32>) -> Self {
        let slots = months
            .into_iter()
            .filter(|month| *month != 0)
            .map(|month| (month, CheckpointSlot::Pending))
            .collect();

        Self { original, slots }
    }

    pub fn original(&self) -> &ImageHandle {
        &self.original
    }

    /// 已规划的生成月份（不含第0个月）
    pub fn months(&self) -> Vec<u32> {
        self.slots.keys().copied().collect()
    }

    pub fn slot(&self, month: u32) -> Option<&CheckpointSlot> {
        self.slots.get(&month)
    }

    /// 指定月份的影像，第0个月返回原始照片
    pub fn image(&self, month: u32) -> Option<&ImageHandle> {
        if month == 0 {
            return Some(&self.original);
        }
        self.slots.get(&month).and_then(CheckpointSlot::handle)
    }

    pub fn set_ready(&mut self, month: u32, handle: ImageHandle) -> Result<()> {
        self.set_slot(
            month,
            CheckpointSlot::Ready {
                handle,
                generated_at: Utc::now(),
            },
        )
    }

    pub fn set_failed(
        &mut self,
        month: u32,
        error: impl Into<String>,
        attempts: u32,
    ) -> Result<()> {
        self.set_slot(
            month,
            CheckpointSlot::Failed {
                error: error.into(),
                attempts,
            },
        )
    }

    /// 记录一次失败的生成，已有的影像保留不动
    ///
    /// 返回 `true` 表示检查点被标记为失败，`false` 表示保留了之前的影像。
    pub fn record_failure(
        &mut self,
        month: u32,
        error: impl Into<String>,
        attempts: u32,
    ) -> Result<bool> {
        if self.slot(month).is_some_and(CheckpointSlot::is_ready) {
            return Ok(false);
        }
        self.set_failed(month, error, attempts)?;
        Ok(true)
    }

    fn set_slot(&mut self, month: u32, slot: CheckpointSlot) -> Result<()> {
        match self.slots.get_mut(&month) {
            Some(existing) => {
                *existing = slot;
                Ok(())
            }
            None if month == 0 => Err(HairSimError::Validation(
                "Month 0 is the original photo and cannot be replaced".to_string(),
            )),
            None => Err(HairSimError::NotFound(format!(
                "No checkpoint planned for month {}",
                month
            ))),
        }
    }

    /// 所有检查点都已生成
    pub fn is_complete(&self) -> bool {
        self.slots.values().all(CheckpointSlot::is_ready)
    }

    pub fn failed_months(&self) -> Vec<u32> {
        self.slots
            .iter()
            .filter(|(_, slot)| matches!(slot, CheckpointSlot::Failed { .. }))
            .map(|(month, _)| *month)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_set() -> GeneratedImageSet {
        GeneratedImageSet::new(ImageHandle::new("data:image/png;base64,AAAA"), [0, 3, 6, 9, 12])
    }

    #[test]
    fn test_created_empty_except_original() {
        let set = image_set();
        assert_eq!(set.months(), vec![3, 6, 9, 12]);
        assert_eq!(set.image(0).unwrap().as_str(), "data:image/png;base64,AAAA");
        assert!(set.image(12).is_none());
        assert_eq!(set.slot(6), Some(&CheckpointSlot::Pending));
        assert!(!set.is_complete());
    }

    #[test]
    fn test_slots_update_independently() {
        let mut set = image_set();
        set.set_ready(12, ImageHandle::new("https://img/12.png")).unwrap();
        set.set_failed(6, "gateway timeout", 3).unwrap();

        assert_eq!(set.image(12).unwrap().as_str(), "https://img/12.png");
        assert_eq!(set.slot(3), Some(&CheckpointSlot::Pending));
        assert_eq!(set.failed_months(), vec![6]);

        set.set_ready(6, ImageHandle::new("https://img/6.png")).unwrap();
        assert!(set.failed_months().is_empty());
        assert!(set.slot(12).unwrap().is_ready());
    }

    #[test]
    fn test_unknown_months_rejected() {
        let mut set = image_set();
        assert!(matches!(
            set.set_ready(0, ImageHandle::new("x")),
            Err(HairSimError::Validation(_))
        ));
        assert!(matches!(set.set_failed(15, "x", 1), Err(HairSimError::NotFound(_))));
    }

    #[test]
    fn test_failure_keeps_existing_image() {
        let mut set = image_set();
        set.set_ready(6, ImageHandle::new("https://img/6.png")).unwrap();

        assert!(!set.record_failure(6, "bad request", 1).unwrap());
        assert_eq!(set.image(6).unwrap().as_str(), "https://img/6.png");

        assert!(set.record_failure(9, "bad request", 1).unwrap());
        assert_eq!(set.failed_months(), vec![9]);
    }
}
