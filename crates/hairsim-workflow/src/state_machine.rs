//! 会话步骤状态机
//!
//! 管理一次模拟会话在 信息录入 → 照片上传 → 结果展示 之间的转换

use hairsim_core::{HairSimError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 会话步骤
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Info,
    Upload,
    Results,
}

/// 步骤转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEvent {
    PatientInfoSubmitted,
    PhotoUploaded,
    AnalysisCompleted,
    PhotoReplaced,
    NewPatient,
}

/// 会话步骤状态机
#[derive(Debug)]
pub struct WorkflowStateMachine {
    transitions: HashMap<(WorkflowStep, WorkflowEvent), WorkflowStep>,
}

impl WorkflowStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        // 定义状态转换规则
        transitions.insert(
            (WorkflowStep::Info, WorkflowEvent::PatientInfoSubmitted),
            WorkflowStep::Upload,
        );
        transitions.insert(
            (WorkflowStep::Upload, WorkflowEvent::PhotoUploaded),
            WorkflowStep::Upload,
        );
        transitions.insert(
            (WorkflowStep::Upload, WorkflowEvent::AnalysisCompleted),
            WorkflowStep::Results,
        );
        transitions.insert(
            (WorkflowStep::Results, WorkflowEvent::PhotoReplaced),
            WorkflowStep::Upload,
        );

        // 任意步骤都可以重新开始
        transitions.insert((WorkflowStep::Info, WorkflowEvent::NewPatient), WorkflowStep::Info);
        transitions.insert((WorkflowStep::Upload, WorkflowEvent::NewPatient), WorkflowStep::Info);
        transitions.insert((WorkflowStep::Results, WorkflowEvent::NewPatient), WorkflowStep::Info);

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: WorkflowStep, event: WorkflowEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 执行状态转换
    pub fn transition(&self, from: WorkflowStep, event: WorkflowEvent) -> Result<WorkflowStep> {
        match self.transitions.get(&(from, event)) {
            Some(to) => Ok(*to),
            None => Err(HairSimError::InvalidStateTransition {
                from: format!("{:?}", from),
                event: format!("{:?}", event),
            }),
        }
    }

    /// 获取步骤的所有可能事件
    pub fn get_possible_events(&self, current: WorkflowStep) -> Vec<WorkflowEvent> {
        self.transitions
            .keys()
            .filter(|(step, _)| *step == current)
            .map(|(_, event)| *event)
            .collect()
    }
}

impl Default for WorkflowStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
