//! 会话状态
//!
//! `WorkflowState` 是不可变值：每个操作接收当前状态、返回新状态，
//! 原状态保持不变。步骤转换统一经过状态机校验。

use chrono::{DateTime, Utc};
use hairsim_core::utils::generate_session_id;
use hairsim_core::{
    find_procedure, DensityProfile, GraftEstimate, HairSimError, ImageHandle, PatientInfo, Result,
};
use hairsim_planning::CostEstimate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::images::GeneratedImageSet;
use crate::services::Classification;
use crate::state_machine::{WorkflowEvent, WorkflowStateMachine, WorkflowStep};

/// 默认照片大小上限 10 MiB
pub const DEFAULT_MAX_PHOTO_BYTES: u64 = 10 * 1024 * 1024;

const MAX_PATIENT_AGE: u8 = 120;

/// 照片视角
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PhotoView {
    /// 正面，必需
    Front,
    /// 头顶，可选
    Top,
}

/// 已上传的照片
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedPhoto {
    pub handle: ImageHandle,
    pub content_type: String,
    pub size_bytes: u64,
}

/// 照片上传限制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoLimits {
    pub max_bytes: u64,
}

impl Default for PhotoLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_PHOTO_BYTES,
        }
    }
}

impl PhotoLimits {
    pub fn check(&self, photo: &UploadedPhoto) -> Result<()> {
        if !photo.content_type.starts_with("image/") {
            return Err(HairSimError::Validation(format!(
                "Unsupported photo type: {}",
                photo.content_type
            )));
        }
        if photo.size_bytes == 0 {
            return Err(HairSimError::Validation("Photo is empty".to_string()));
        }
        if photo.size_bytes > self.max_bytes {
            return Err(HairSimError::Validation(format!(
                "Photo is {} bytes, limit is {} bytes",
                photo.size_bytes, self.max_bytes
            )));
        }
        Ok(())
    }
}

/// 分析结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub classification: Classification,
    pub estimate: GraftEstimate,
    pub cost: CostEstimate,
    /// 以患者估算结果为种子的时间线
    pub timeline: Vec<DensityProfile>,
    pub analyzed_at: DateTime<Utc>,
}

/// 一次患者模拟的会话状态
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub session_id: String,
    pub step: WorkflowStep,
    pub patient: Option<PatientInfo>,
    pub front_photo: Option<UploadedPhoto>,
    pub top_photo: Option<UploadedPhoto>,
    pub analysis: Option<AnalysisResult>,
    pub images: Option<GeneratedImageSet>,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self {
            session_id: generate_session_id(),
            step: WorkflowStep::Info,
            patient: None,
            front_photo: None,
            top_photo: None,
            analysis: None,
            images: None,
        }
    }
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}

/// 会话状态转换
#[derive(Debug, Default)]
pub struct SessionFlow {
    machine: WorkflowStateMachine,
    limits: PhotoLimits,
}

impl SessionFlow {
    pub fn new(limits: PhotoLimits) -> Self {
        Self {
            machine: WorkflowStateMachine::new(),
            limits,
        }
    }

    pub fn limits(&self) -> PhotoLimits {
        self.limits
    }

    /// 校验患者信息
    pub fn validate_patient(&self, patient: &PatientInfo) -> Result<()> {
        if patient.name.trim().is_empty() {
            return Err(HairSimError::Validation("Patient name is required".to_string()));
        }
        if patient.age == 0 || patient.age > MAX_PATIENT_AGE {
            return Err(HairSimError::Validation(format!(
                "Patient age must be between 1 and {}",
                MAX_PATIENT_AGE
            )));
        }
        if find_procedure(&patient.procedure_id).is_none() {
            return Err(HairSimError::NotFound(format!(
                "Unknown procedure: {}",
                patient.procedure_id
            )));
        }
        Ok(())
    }

    /// 提交患者信息，进入上传步骤
    pub fn submit_patient_info(
        &self,
        state: &WorkflowState,
        patient: PatientInfo,
    ) -> Result<WorkflowState> {
        self.validate_patient(&patient)?;
        let step = self.machine.transition(state.step, WorkflowEvent::PatientInfoSubmitted)?;

        info!(
            "Session {} patient info submitted for {}",
            state.session_id, patient.procedure_id
        );

        Ok(WorkflowState {
            step,
            patient: Some(patient),
            ..state.clone()
        })
    }

    /// 上传照片
    pub fn upload_photo(
        &self,
        state: &WorkflowState,
        view: PhotoView,
        photo: UploadedPhoto,
    ) -> Result<WorkflowState> {
        self.limits.check(&photo)?;
        let step = self.machine.transition(state.step, WorkflowEvent::PhotoUploaded)?;

        let mut next = WorkflowState { step, ..state.clone() };
        match view {
            PhotoView::Front => next.front_photo = Some(photo),
            PhotoView::Top => next.top_photo = Some(photo),
        }
        Ok(next)
    }

    /// 分析完成，进入结果步骤
    pub fn complete_analysis(
        &self,
        state: &WorkflowState,
        analysis: AnalysisResult,
        images: GeneratedImageSet,
    ) -> Result<WorkflowState> {
        if state.front_photo.is_none() {
            return Err(HairSimError::Validation(
                "Front photo is required before analysis".to_string(),
            ));
        }
        let step = self.machine.transition(state.step, WorkflowEvent::AnalysisCompleted)?;

        Ok(WorkflowState {
            step,
            analysis: Some(analysis),
            images: Some(images),
            ..state.clone()
        })
    }

    /// 更新结果步骤中的影像集合
    pub fn with_images(
        &self,
        state: &WorkflowState,
        images: GeneratedImageSet,
    ) -> Result<WorkflowState> {
        if state.step != WorkflowStep::Results {
            return Err(HairSimError::Validation(format!(
                "Images can only be updated in the results step, current step is {:?}",
                state.step
            )));
        }
        Ok(WorkflowState {
            images: Some(images),
            ..state.clone()
        })
    }

    /// 更换照片，丢弃之前的分析和生成结果
    pub fn replace_photo(&self, state: &WorkflowState) -> Result<WorkflowState> {
        let step = self.machine.transition(state.step, WorkflowEvent::PhotoReplaced)?;

        Ok(WorkflowState {
            step,
            front_photo: None,
            top_photo: None,
            analysis: None,
            images: None,
            ..state.clone()
        })
    }

    /// 开始新患者
    pub fn new_patient(&self, state: &WorkflowState) -> Result<WorkflowState> {
        self.machine.transition(state.step, WorkflowEvent::NewPatient)?;
        info!("Session {} closed, starting new patient", state.session_id);
        Ok(WorkflowState::new())
    }
}
