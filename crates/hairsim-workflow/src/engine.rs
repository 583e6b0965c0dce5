//! 时间线编排引擎
//!
//! 协调视觉分类、毛囊估算和影像生成。最终效果（第12个月）必须先生成，
//! 因为中间检查点的指令以它为参照；中间检查点之间互不依赖，并发生成，
//! 任何一个失败都不影响其他检查点。

use chrono::Utc;
use hairsim_core::{find_procedure, HairSimError, ImageHandle, Result};
use hairsim_planning::{
    derive_generation_parameters, CostModel, GenerationSpec, GraftEstimator, HairAppearance,
    ReferenceImage, TimelineEngine, INTERMEDIATE_MONTHS, REFINEMENT_MONTHS, SHOCK_LOSS_MONTH,
    TERMINAL_MONTH,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::images::GeneratedImageSet;
use crate::retry::RetryPolicy;
use crate::services::{ImageGenerator, VisionClassifier};
use crate::session::{AnalysisResult, SessionFlow, WorkflowState};

/// 需要生成的检查点
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimelinePlan {
    /// 生成第1个月的休克性脱发影像
    pub include_shock_loss: bool,
    /// 生成第15、18个月的细化影像
    pub include_refinement: bool,
}

impl TimelinePlan {
    /// 全部生成月份，升序
    pub fn months(&self) -> Vec<u32> {
        let mut months = Vec::new();
        if self.include_shock_loss {
            months.push(SHOCK_LOSS_MONTH);
        }
        months.extend(INTERMEDIATE_MONTHS);
        months.push(TERMINAL_MONTH);
        if self.include_refinement {
            months.extend(REFINEMENT_MONTHS);
        }
        months
    }

    /// 依赖最终效果、在其之后生成的月份
    pub fn dependent_months(&self) -> Vec<u32> {
        self.months().into_iter().filter(|m| *m != TERMINAL_MONTH).collect()
    }
}

/// 单个检查点的生成结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Generated,
    Failed { error: String },
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckpointOutcome {
    pub month: u32,
    pub attempts: u32,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl CheckpointOutcome {
    pub fn is_generated(&self) -> bool {
        self.status == OutcomeStatus::Generated
    }
}

/// 一次时间线生成的逐检查点报告
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimelineReport {
    pub outcomes: Vec<CheckpointOutcome>,
}

impl TimelineReport {
    pub fn outcome(&self, month: u32) -> Option<&CheckpointOutcome> {
        self.outcomes.iter().find(|o| o.month == month)
    }

    pub fn generated_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_generated()).count()
    }

    pub fn all_generated(&self) -> bool {
        self.outcomes.iter().all(CheckpointOutcome::is_generated)
    }
}

/// 时间线编排引擎
pub struct TimelineOrchestrator {
    classifier: Arc<dyn VisionClassifier>,
    generator: Arc<dyn ImageGenerator>,
    estimator: GraftEstimator,
    cost_model: CostModel,
    retry: RetryPolicy,
    flow: SessionFlow,
    plan: TimelinePlan,
}

impl TimelineOrchestrator {
    /// 创建新的编排引擎
    pub fn new(classifier: Arc<dyn VisionClassifier>, generator: Arc<dyn ImageGenerator>) -> Self {
        Self {
            classifier,
            generator,
            estimator: GraftEstimator::default(),
            cost_model: CostModel::default(),
            retry: RetryPolicy::default(),
            flow: SessionFlow::default(),
            plan: TimelinePlan::default(),
        }
    }

    pub fn with_estimator(mut self, estimator: GraftEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = cost_model;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_session_flow(mut self, flow: SessionFlow) -> Self {
        self.flow = flow;
        self
    }

    pub fn with_plan(mut self, plan: TimelinePlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn flow(&self) -> &SessionFlow {
        &self.flow
    }

    pub fn estimator(&self) -> &GraftEstimator {
        &self.estimator
    }

    pub fn cost_model(&self) -> CostModel {
        self.cost_model
    }

    pub fn plan(&self) -> TimelinePlan {
        self.plan
    }

    /// 分类并估算，不涉及会话状态
    pub async fn analyze_photos(
        &self,
        front: &ImageHandle,
        top: Option<&ImageHandle>,
    ) -> Result<AnalysisResult> {
        let classifier = &self.classifier;
        let classification = self
            .retry
            .run("Hair classification", move || classifier.classify(front, top))
            .await?;

        let estimate = self
            .estimator
            .estimate(&classification.stage, &classification.characteristics);
        let timeline = TimelineEngine::seeded(&estimate).timeline(estimate.stage);
        let cost = self.cost_model.for_grafts(&estimate);

        info!(
            "Classified stage {} (confidence {:.2}), estimated {} grafts",
            estimate.stage, classification.confidence, estimate.total
        );

        Ok(AnalysisResult {
            classification,
            estimate,
            cost,
            timeline,
            analyzed_at: Utc::now(),
        })
    }

    /// 分析已上传的照片，进入结果步骤，第0个月为正面照
    pub async fn analyze(&self, state: &WorkflowState) -> Result<WorkflowState> {
        let front = state.front_photo.as_ref().ok_or_else(|| {
            HairSimError::Validation("Front photo is required before analysis".to_string())
        })?;
        let top = state.top_photo.as_ref().map(|photo| &photo.handle);

        let analysis = self.analyze_photos(&front.handle, top).await?;
        let images = GeneratedImageSet::new(front.handle.clone(), self.plan.months());

        self.flow.complete_analysis(state, analysis, images)
    }

    /// 为分析结果推导某个月份的生成参数
    pub fn generation_spec(&self, analysis: &AnalysisResult, month: u32) -> Result<GenerationSpec> {
        let spec = derive_generation_parameters(
            analysis.estimate.stage,
            month as i32,
            analysis.estimate.total,
        )?;
        Ok(spec.with_appearance(HairAppearance::from(&analysis.classification.characteristics)))
    }

    /// 按生成参数生成单张影像
    pub async fn generate_checkpoint(
        &self,
        spec: &GenerationSpec,
        before: &ImageHandle,
        after: Option<&ImageHandle>,
    ) -> Result<ImageHandle> {
        let references = resolve_references(spec, before, after)?;
        run_generation(self.generator.clone(), self.retry.clone(), spec.clone(), references)
            .await
            .0
    }

    /// 生成整条时间线：先最终效果，再并发生成其余检查点
    pub async fn generate_timeline(
        &self,
        state: &WorkflowState,
    ) -> Result<(WorkflowState, TimelineReport)> {
        let (analysis, mut images) = results_of(state)?;
        let original = images.original().clone();
        let mut report = TimelineReport::default();

        info!(
            "Session {} generating timeline for months {:?}",
            state.session_id,
            images.months()
        );

        let final_spec = self.generation_spec(analysis, TERMINAL_MONTH)?;
        let references = resolve_references(&final_spec, &original, None)?;
        let (result, attempts) = run_generation(
            self.generator.clone(),
            self.retry.clone(),
            final_spec,
            references,
        )
        .await;

        let final_image = match result {
            Ok(handle) => {
                images.set_ready(TERMINAL_MONTH, handle.clone())?;
                report.outcomes.push(CheckpointOutcome {
                    month: TERMINAL_MONTH,
                    attempts,
                    status: OutcomeStatus::Generated,
                });
                handle
            }
            Err(e) => {
                warn!("Final image failed, dependent checkpoints skipped: {}", e);
                images.record_failure(TERMINAL_MONTH, e.to_string(), attempts)?;
                report.outcomes.push(CheckpointOutcome {
                    month: TERMINAL_MONTH,
                    attempts,
                    status: OutcomeStatus::Failed { error: e.to_string() },
                });
                for month in self.plan.dependent_months() {
                    report.outcomes.push(CheckpointOutcome {
                        month,
                        attempts: 0,
                        status: OutcomeStatus::Skipped {
                            reason: "final image unavailable".to_string(),
                        },
                    });
                }
                let state = self.flow.with_images(state, images)?;
                return Ok((state, report));
            }
        };

        let mut tasks: Vec<(u32, JoinHandle<(Result<ImageHandle>, u32)>)> = Vec::new();
        for month in self.plan.dependent_months() {
            let spec = self.generation_spec(analysis, month)?;
            let references = resolve_references(&spec, &original, Some(&final_image))?;
            let generator = self.generator.clone();
            let retry = self.retry.clone();

            let task = tokio::spawn(async move {
                run_generation(generator, retry, spec, references).await
            });
            tasks.push((month, task));
        }

        for (month, task) in tasks {
            let outcome = match task.await {
                Ok((Ok(handle), attempts)) => {
                    images.set_ready(month, handle)?;
                    CheckpointOutcome {
                        month,
                        attempts,
                        status: OutcomeStatus::Generated,
                    }
                }
                Ok((Err(e), attempts)) => {
                    images.record_failure(month, e.to_string(), attempts)?;
                    CheckpointOutcome {
                        month,
                        attempts,
                        status: OutcomeStatus::Failed { error: e.to_string() },
                    }
                }
                Err(join_error) => {
                    images.record_failure(month, join_error.to_string(), 0)?;
                    CheckpointOutcome {
                        month,
                        attempts: 0,
                        status: OutcomeStatus::Failed {
                            error: join_error.to_string(),
                        },
                    }
                }
            };
            report.outcomes.push(outcome);
        }

        report.outcomes.sort_by_key(|o| o.month);
        info!(
            "Session {} timeline finished: {}/{} checkpoints generated",
            state.session_id,
            report.generated_count(),
            report.outcomes.len()
        );

        let state = self.flow.with_images(state, images)?;
        Ok((state, report))
    }

    /// 单独重新生成一个检查点，其他检查点保持不变
    pub async fn regenerate(
        &self,
        state: &WorkflowState,
        month: u32,
    ) -> Result<(WorkflowState, CheckpointOutcome)> {
        let (analysis, mut images) = results_of(state)?;
        if month == 0 {
            return Err(HairSimError::Validation(
                "Month 0 is the original photo and cannot be regenerated".to_string(),
            ));
        }
        if images.slot(month).is_none() {
            return Err(HairSimError::NotFound(format!(
                "No checkpoint planned for month {}",
                month
            )));
        }

        let spec = self.generation_spec(analysis, month)?;
        let references =
            resolve_references(&spec, images.original(), images.image(TERMINAL_MONTH))?;

        info!("Session {} regenerating month {}", state.session_id, month);

        let (result, attempts) =
            run_generation(self.generator.clone(), self.retry.clone(), spec, references).await;
        let outcome = match result {
            Ok(handle) => {
                images.set_ready(month, handle)?;
                CheckpointOutcome {
                    month,
                    attempts,
                    status: OutcomeStatus::Generated,
                }
            }
            Err(e) => {
                if !images.record_failure(month, e.to_string(), attempts)? {
                    warn!("Month {} regeneration failed, keeping previous image: {}", month, e);
                }
                CheckpointOutcome {
                    month,
                    attempts,
                    status: OutcomeStatus::Failed { error: e.to_string() },
                }
            }
        };

        let state = self.flow.with_images(state, images)?;
        Ok((state, outcome))
    }

    /// 通用整形项目的效果模拟
    pub async fn simulate_procedure(
        &self,
        procedure_id: &str,
        photo: &ImageHandle,
    ) -> Result<ImageHandle> {
        let procedure = find_procedure(procedure_id)
            .ok_or_else(|| HairSimError::NotFound(format!("Unknown procedure: {}", procedure_id)))?;

        info!("Simulating procedure {}", procedure.id);

        let generator = &self.generator;
        let references = std::slice::from_ref(photo);
        self.retry
            .run(&format!("Procedure {} simulation", procedure.id), move || {
                generator.generate(procedure.prompt, references)
            })
            .await
    }
}

fn results_of(state: &WorkflowState) -> Result<(&AnalysisResult, GeneratedImageSet)> {
    match (&state.analysis, &state.images) {
        (Some(analysis), Some(images)) => Ok((analysis, images.clone())),
        _ => Err(HairSimError::Validation(format!(
            "Session {} has no analysis yet",
            state.session_id
        ))),
    }
}

/// 按生成参数要求的顺序组装参照影像
fn resolve_references(
    spec: &GenerationSpec,
    before: &ImageHandle,
    after: Option<&ImageHandle>,
) -> Result<Vec<ImageHandle>> {
    spec.references
        .iter()
        .map(|reference| match reference {
            ReferenceImage::Before => Ok(before.clone()),
            ReferenceImage::After => after.cloned().ok_or_else(|| {
                HairSimError::Validation(format!(
                    "Month {} requires the month {} image, generate it first",
                    spec.month, TERMINAL_MONTH
                ))
            }),
        })
        .collect()
}

async fn run_generation(
    generator: Arc<dyn ImageGenerator>,
    retry: RetryPolicy,
    spec: GenerationSpec,
    references: Vec<ImageHandle>,
) -> (Result<ImageHandle>, u32) {
    let prompt = spec.render_prompt();
    debug!("Month {} prompt is {} characters", spec.month, prompt.len());

    let operation = format!("Month {} generation", spec.month);
    retry
        .execute(&operation, || {
            let generator = generator.clone();
            let prompt = prompt.clone();
            let references = references.clone();
            async move { generator.generate(&prompt, &references).await }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::CheckpointSlot;
    use crate::services::Classification;
    use crate::session::{PhotoView, UploadedPhoto};
    use crate::state_machine::WorkflowStep;
    use async_trait::async_trait;
    use hairsim_core::{
        HairCharacteristics, HairContrast, HairTexture, HairThickness, PatientInfo, StageInput,
        HAIR_TRANSPLANT_ID,
    };
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct MockClassifier {
        stage: &'static str,
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    impl MockClassifier {
        fn new(stage: &'static str, failures: u32) -> Self {
            Self {
                stage,
                failures_left: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl VisionClassifier for MockClassifier {
        async fn classify(
            &self,
            _front: &ImageHandle,
            _top: Option<&ImageHandle>,
        ) -> Result<Classification> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(HairSimError::RateLimited);
            }

            let mut characteristics = HairCharacteristics::new(
                HairThickness::Medium,
                HairTexture::Straight,
                HairContrast::High,
            );
            characteristics.color = "dark brown".to_string();

            Ok(Classification {
                stage: StageInput::parse(self.stage),
                confidence: 0.87,
                characteristics,
                warnings: Vec::new(),
            })
        }
    }

    /// 记录每次调用的指令和参照数量，按指令标题注入失败
    #[derive(Default)]
    struct MockGenerator {
        calls: Mutex<Vec<(String, usize)>>,
        failing_titles: Vec<&'static str>,
    }

    impl MockGenerator {
        fn failing(titles: &[&'static str]) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                failing_titles: titles.to_vec(),
            }
        }

        fn titles(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(prompt, _)| prompt.lines().next().unwrap_or_default().to_string())
                .collect()
        }

        fn reference_count(&self, title_fragment: &str) -> Option<usize> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .find(|(prompt, _)| {
                    prompt.lines().next().unwrap_or_default().contains(title_fragment)
                })
                .map(|(_, refs)| *refs)
        }
    }

    #[async_trait]
    impl ImageGenerator for MockGenerator {
        async fn generate(&self, prompt: &str, references: &[ImageHandle]) -> Result<ImageHandle> {
            let title = prompt.lines().next().unwrap_or_default().to_string();
            let index = {
                let mut calls = self.calls.lock().unwrap();
                calls.push((prompt.to_string(), references.len()));
                calls.len()
            };

            if self.failing_titles.iter().any(|t| title.contains(t)) {
                return Err(HairSimError::Gateway {
                    status: 503,
                    message: "upstream busy".to_string(),
                });
            }
            Ok(ImageHandle::new(format!("https://images.test/{}.png", index)))
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            multiplier: 2.0,
        }
    }

    fn orchestrator(
        classifier: MockClassifier,
        generator: Arc<MockGenerator>,
    ) -> TimelineOrchestrator {
        TimelineOrchestrator::new(Arc::new(classifier), generator).with_retry_policy(fast_retry())
    }

    fn uploaded_state(flow: &SessionFlow) -> WorkflowState {
        let state = flow
            .submit_patient_info(
                &WorkflowState::new(),
                PatientInfo {
                    name: "Sam".to_string(),
                    age: 41,
                    procedure_id: HAIR_TRANSPLANT_ID.to_string(),
                },
            )
            .unwrap();
        flow.upload_photo(
            &state,
            PhotoView::Front,
            UploadedPhoto {
                handle: ImageHandle::new("data:image/jpeg;base64,FRONT"),
                content_type: "image/jpeg".to_string(),
                size_bytes: 2048,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_analyze_enters_results() {
        let generator = Arc::new(MockGenerator::default());
        let engine = orchestrator(MockClassifier::new("IV", 1), generator);
        let state = uploaded_state(engine.flow());

        let results = engine.analyze(&state).await.unwrap();

        assert_eq!(results.step, WorkflowStep::Results);
        let analysis = results.analysis.as_ref().unwrap();
        assert_eq!(analysis.estimate.total, 3600);
        assert_eq!((analysis.cost.min_usd, analysis.cost.max_usd), (9000, 18000));
        assert_eq!(analysis.timeline.len(), 8);
        assert_eq!(analysis.timeline[3].active_grafts, 1800);

        let images = results.images.as_ref().unwrap();
        assert_eq!(images.months(), vec![3, 6, 9, 12]);
        assert_eq!(images.image(0).unwrap().as_str(), "data:image/jpeg;base64,FRONT");
    }

    #[tokio::test]
    async fn test_analyze_requires_front_photo() {
        let engine = orchestrator(MockClassifier::new("IV", 0), Arc::new(MockGenerator::default()));
        let result = engine.analyze(&WorkflowState::new()).await;
        assert!(matches!(result, Err(HairSimError::Validation(_))));
    }

    #[tokio::test]
    async fn test_unrecognized_stage_still_completes() {
        let engine =
            orchestrator(MockClassifier::new("XII", 0), Arc::new(MockGenerator::default()));
        let state = uploaded_state(engine.flow());

        let results = engine.analyze(&state).await.unwrap();
        let estimate = &results.analysis.as_ref().unwrap().estimate;
        assert!(estimate.fallback_used());
        assert_eq!(estimate.fallback.as_ref().unwrap().baseline_grafts, 2500);
    }

    #[tokio::test]
    async fn test_final_generated_before_intermediates() {
        let generator = Arc::new(MockGenerator::default());
        let engine = orchestrator(MockClassifier::new("IV", 0), generator.clone());
        let state = engine.analyze(&uploaded_state(engine.flow())).await.unwrap();

        let (state, report) = engine.generate_timeline(&state).await.unwrap();

        assert!(report.all_generated());
        assert_eq!(report.outcomes.iter().map(|o| o.month).collect::<Vec<_>>(), vec![3, 6, 9, 12]);

        let titles = generator.titles();
        assert_eq!(titles.len(), 4);
        assert!(titles[0].contains("FINAL RESULT"));

        // 最终效果只参照原图，中间检查点同时参照原图和最终效果
        assert_eq!(generator.reference_count("FINAL RESULT"), Some(1));
        assert_eq!(generator.reference_count("MONTH 6"), Some(2));

        assert!(state.images.as_ref().unwrap().is_complete());
    }

    #[tokio::test]
    async fn test_failed_checkpoint_does_not_affect_siblings() {
        let generator = Arc::new(MockGenerator::failing(&["MONTH 6"]));
        let engine = orchestrator(MockClassifier::new("IV", 0), generator.clone());
        let state = engine.analyze(&uploaded_state(engine.flow())).await.unwrap();

        let (state, report) = engine.generate_timeline(&state).await.unwrap();

        let failed = report.outcome(6).unwrap();
        assert!(matches!(failed.status, OutcomeStatus::Failed { .. }));
        assert_eq!(failed.attempts, 2);
        assert_eq!(report.generated_count(), 3);

        let images = state.images.as_ref().unwrap();
        assert!(matches!(images.slot(6), Some(CheckpointSlot::Failed { attempts: 2, .. })));
        assert!(images.slot(3).unwrap().is_ready());
        assert!(images.slot(9).unwrap().is_ready());
    }

    #[tokio::test]
    async fn test_final_failure_skips_dependents() {
        let generator = Arc::new(MockGenerator::failing(&["FINAL RESULT"]));
        let engine = orchestrator(MockClassifier::new("V", 0), generator.clone());
        let state = engine.analyze(&uploaded_state(engine.flow())).await.unwrap();

        let (state, report) = engine.generate_timeline(&state).await.unwrap();

        assert!(matches!(report.outcome(12).unwrap().status, OutcomeStatus::Failed { .. }));
        assert!(matches!(report.outcome(3).unwrap().status, OutcomeStatus::Skipped { .. }));
        assert_eq!(generator.titles().len(), 2);

        let images = state.images.as_ref().unwrap();
        assert_eq!(images.slot(3), Some(&CheckpointSlot::Pending));

        // 没有最终效果时不能单独生成中间检查点
        let result = engine.regenerate(&state, 6).await;
        assert!(matches!(result, Err(HairSimError::Validation(_))));
    }

    #[tokio::test]
    async fn test_regenerate_single_checkpoint() {
        let generator = Arc::new(MockGenerator::default());
        let engine = orchestrator(MockClassifier::new("IV", 0), generator.clone());
        let state = engine.analyze(&uploaded_state(engine.flow())).await.unwrap();
        let (state, _) = engine.generate_timeline(&state).await.unwrap();
        let before = state.images.clone().unwrap();

        let (next, outcome) = engine.regenerate(&state, 9).await.unwrap();
        assert!(outcome.is_generated());

        let after = next.images.as_ref().unwrap();
        assert_ne!(after.image(9), before.image(9));
        for month in [3, 6, 12] {
            assert_eq!(after.image(month), before.image(month));
        }

        assert!(matches!(engine.regenerate(&state, 0).await, Err(HairSimError::Validation(_))));
        assert!(matches!(engine.regenerate(&state, 15).await, Err(HairSimError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_regeneration_keeps_previous_image() {
        let engine = orchestrator(MockClassifier::new("IV", 0), Arc::new(MockGenerator::default()));
        let state = engine.analyze(&uploaded_state(engine.flow())).await.unwrap();
        let (state, _) = engine.generate_timeline(&state).await.unwrap();
        let previous = state.images.as_ref().unwrap().image(6).cloned();
        assert!(previous.is_some());

        let failing = orchestrator(
            MockClassifier::new("IV", 0),
            Arc::new(MockGenerator::failing(&["MONTH 6"])),
        );
        let (next, outcome) = failing.regenerate(&state, 6).await.unwrap();

        assert!(matches!(outcome.status, OutcomeStatus::Failed { .. }));
        assert_eq!(outcome.attempts, 2);
        let images = next.images.as_ref().unwrap();
        assert_eq!(images.image(6).cloned(), previous);
        assert!(images.is_complete());
    }

    #[tokio::test]
    async fn test_plan_with_optional_checkpoints() {
        let plan = TimelinePlan {
            include_shock_loss: true,
            include_refinement: true,
        };
        assert_eq!(plan.months(), vec![1, 3, 6, 9, 12, 15, 18]);
        assert_eq!(plan.dependent_months(), vec![1, 3, 6, 9, 15, 18]);

        let generator = Arc::new(MockGenerator::default());
        let engine =
            orchestrator(MockClassifier::new("IIIVertex", 0), generator.clone()).with_plan(plan);
        let state = engine.analyze(&uploaded_state(engine.flow())).await.unwrap();
        let (_, report) = engine.generate_timeline(&state).await.unwrap();

        assert_eq!(report.outcomes.len(), 7);
        assert!(report.all_generated());
        assert_eq!(generator.reference_count("MONTH 1 (Shock Loss)"), Some(1));
    }

    #[tokio::test]
    async fn test_simulate_procedure() {
        let generator = Arc::new(MockGenerator::default());
        let engine = orchestrator(MockClassifier::new("IV", 0), generator.clone());
        let photo = ImageHandle::new("data:image/png;base64,FACE");

        assert!(engine.simulate_procedure("rhinoplasty", &photo).await.is_ok());
        assert!(matches!(
            engine.simulate_procedure("unknown", &photo).await,
            Err(HairSimError::NotFound(_))
        ));
        assert_eq!(generator.titles().len(), 1);
    }
}
