//! RESTful API接口模块
//!
//! 分析、生成和时间线查询接口。服务端不保存会话：
//! 客户端持有 `WorkflowState`，每次请求带上当前状态，响应返回新状态。

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use hairsim_core::{
    BaldingStage, DensityProfile, GraftEstimate, HairCharacteristics, HairSimError, HairTexture,
    ImageHandle, PatientInfo, StageFallback, StageInput, PROCEDURES,
};
use hairsim_planning::{
    derive_generation_parameters, CostEstimate, GenerationSpec, GraftTable, HairAppearance,
    TimelineEngine, TERMINAL_MONTH,
};
use hairsim_workflow::{
    AnalysisResult, CheckpointOutcome, PhotoView, TimelineOrchestrator, TimelineReport,
    UploadedPhoto, WorkflowState,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info, warn};

/// 请求体上限，base64 编码的照片比原文件大约三分之一
const DEFAULT_BODY_LIMIT: usize = 32 * 1024 * 1024;

/// 默认请求超时，覆盖整条时间线的生成
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// API状态
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<TimelineOrchestrator>,
    /// 未提供毛囊总数时时间线使用的对照表
    pub timeline_table: GraftTable,
    pub body_limit: usize,
    pub request_timeout: Duration,
}

impl ApiState {
    pub fn new(orchestrator: Arc<TimelineOrchestrator>) -> Self {
        Self {
            orchestrator,
            timeline_table: GraftTable::Legacy,
            body_limit: DEFAULT_BODY_LIMIT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeline_table(mut self, table: GraftTable) -> Self {
        self.timeline_table = table;
        self
    }

    pub fn with_body_limit(mut self, body_limit: usize) -> Self {
        self.body_limit = body_limit;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

/// 错误响应
#[derive(Debug)]
pub struct ApiError(pub HairSimError);

impl From<HairSimError> for ApiError {
    fn from(error: HairSimError) -> Self {
        Self(error)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            HairSimError::Validation(_) | HairSimError::InvalidStateTransition { .. } => {
                StatusCode::BAD_REQUEST
            }
            HairSimError::NotFound(_) => StatusCode::NOT_FOUND,
            HairSimError::GenerationParameter(_) | HairSimError::Classification(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            HairSimError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            HairSimError::Gateway { .. }
            | HairSimError::Transport(_)
            | HairSimError::Generation { .. }
            | HairSimError::RetriesExhausted { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub front_image: String,
    pub top_image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateRequest {
    pub stage: String,
    #[serde(default)]
    pub characteristics: HairCharacteristics,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateFinalRequest {
    pub before_image: String,
    pub stage: String,
    pub total_grafts: u32,
    pub hair_color: Option<String>,
    pub hair_texture: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTimelineRequest {
    pub before_image: String,
    pub after_image: Option<String>,
    pub stage: String,
    pub month: i32,
    pub total_grafts: u32,
    pub hair_color: Option<String>,
    pub hair_texture: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSpecRequest {
    pub stage: String,
    pub month: i32,
    pub total_grafts: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DensityQuery {
    pub stage: String,
    pub month: i32,
    pub total_grafts: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineQuery {
    pub stage: String,
    pub total_grafts: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SimulateRequest {
    pub image: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub patient: PatientInfo,
}

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub state: WorkflowState,
}

#[derive(Debug, Deserialize)]
pub struct PhotoUploadRequest {
    pub state: WorkflowState,
    pub view: PhotoView,
    pub image: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<StageFallback>,
}

#[derive(Debug, Serialize)]
pub struct EstimateResponse {
    #[serde(flatten)]
    pub estimate: GraftEstimate,
    pub cost: CostEstimate,
}

#[derive(Debug, Serialize)]
pub struct DensityResponse {
    #[serde(flatten)]
    pub profile: DensityProfile,
    pub fallback: Option<StageFallback>,
}

#[derive(Debug, Serialize)]
pub struct TimelineResponse {
    pub stage: BaldingStage,
    pub timeline: Vec<DensityProfile>,
    pub fallback: Option<StageFallback>,
}

#[derive(Debug, Serialize)]
pub struct GenerationSpecResponse {
    pub spec: GenerationSpec,
    pub prompt: String,
    pub fallback: Option<StageFallback>,
}

#[derive(Debug, Serialize)]
pub struct TimelineGenerationResponse {
    pub state: WorkflowState,
    pub report: TimelineReport,
}

#[derive(Debug, Serialize)]
pub struct RegenerationResponse {
    pub state: WorkflowState,
    pub outcome: CheckpointOutcome,
}

/// 解析请求中的分级，无法识别时记录替代情况
fn resolve_stage(
    raw: &str,
    baseline_grafts: impl Fn(BaldingStage) -> u32,
) -> (BaldingStage, Option<StageFallback>) {
    let input = StageInput::parse(raw);
    let stage = input.effective_stage();
    let fallback = input.fallback(baseline_grafts(stage));
    if let Some(fallback) = &fallback {
        warn!("Unrecognized stage '{}' in request, substituting {}", fallback.raw, stage);
    }
    (stage, fallback)
}

/// 生成接口的分级解析，基础毛囊数取估算器的对照表
fn resolve_generation_stage(
    state: &ApiState,
    raw: &str,
) -> (BaldingStage, Option<StageFallback>) {
    let table = state.orchestrator.estimator().table();
    resolve_stage(raw, |stage| table.base_grafts(stage))
}

/// 解析上传的 data URL 并检查类型和大小
fn uploaded_photo(state: &ApiState, raw: String) -> Result<UploadedPhoto, HairSimError> {
    let rest = raw.strip_prefix("data:").ok_or_else(|| {
        HairSimError::Validation("Photos must be uploaded as data URLs".to_string())
    })?;
    let (meta, data) = rest
        .split_once(',')
        .ok_or_else(|| HairSimError::Validation("Malformed data URL".to_string()))?;
    let content_type = meta.split(';').next().unwrap_or_default().to_string();
    let size_bytes = if meta.ends_with(";base64") {
        (data.len() as u64 * 3) / 4
    } else {
        data.len() as u64
    };

    let photo = UploadedPhoto {
        handle: ImageHandle::from(raw.clone()),
        content_type,
        size_bytes,
    };
    state.orchestrator.flow().limits().check(&photo)?;
    Ok(photo)
}

/// 校验请求中的影像：data URL 检查上传限制，远程地址只接受 http(s)
fn checked_image(state: &ApiState, raw: String) -> Result<ImageHandle, HairSimError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(HairSimError::Validation("No image provided".to_string()));
    }
    if trimmed.starts_with("data:") {
        return Ok(uploaded_photo(state, trimmed.to_string())?.handle);
    }
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        return Ok(ImageHandle::from(trimmed));
    }
    Err(HairSimError::Validation(
        "Images must be data URLs or http(s) URLs".to_string(),
    ))
}

fn appearance(color: Option<String>, texture: Option<String>) -> HairAppearance {
    HairAppearance {
        color: color.unwrap_or_default(),
        texture: texture.as_deref().and_then(HairTexture::parse).unwrap_or_default(),
    }
}

fn timeline_engine(state: &ApiState, total_grafts: Option<u32>) -> TimelineEngine {
    match total_grafts {
        Some(total) => TimelineEngine::with_total(total),
        None => TimelineEngine::new(state.timeline_table),
    }
}

/// API处理器
pub struct ApiHandler;

impl ApiHandler {
    /// 健康检查
    pub async fn health_check() -> Json<Value> {
        Json(json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION"),
        }))
    }

    /// 分类并估算
    pub async fn analyze(
        State(state): State<ApiState>,
        Json(request): Json<AnalyzeRequest>,
    ) -> ApiResult<AnalysisResult> {
        let front = checked_image(&state, request.front_image)?;
        let top = request
            .top_image
            .map(|raw| checked_image(&state, raw))
            .transpose()?;

        info!("Analyzing hair photos (top view: {})", top.is_some());
        let analysis = state.orchestrator.analyze_photos(&front, top.as_ref()).await?;
        Ok(Json(analysis))
    }

    /// 毛囊数和费用估算
    pub async fn estimate(
        State(state): State<ApiState>,
        Json(request): Json<EstimateRequest>,
    ) -> ApiResult<EstimateResponse> {
        let stage = StageInput::parse(&request.stage);
        let estimate = state
            .orchestrator
            .estimator()
            .estimate(&stage, &request.characteristics);
        let cost = state.orchestrator.cost_model().for_grafts(&estimate);
        Ok(Json(EstimateResponse { estimate, cost }))
    }

    /// 生成最终效果（第12个月）
    pub async fn generate_final(
        State(state): State<ApiState>,
        Json(request): Json<GenerateFinalRequest>,
    ) -> ApiResult<ImageResponse> {
        let before = checked_image(&state, request.before_image)?;
        let (stage, fallback) = resolve_generation_stage(&state, &request.stage);

        let spec =
            derive_generation_parameters(stage, TERMINAL_MONTH as i32, request.total_grafts)?
                .with_appearance(appearance(request.hair_color, request.hair_texture));

        info!(
            "Generating final result for stage {} ({} grafts)",
            stage, request.total_grafts
        );
        let image = state
            .orchestrator
            .generate_checkpoint(&spec, &before, None)
            .await?;

        Ok(Json(ImageResponse {
            image_url: image.into_inner(),
            month: Some(spec.month),
            fallback,
        }))
    }

    /// 生成单个检查点，中间检查点需要最终效果作为参照
    pub async fn generate_timeline(
        State(state): State<ApiState>,
        Json(request): Json<GenerateTimelineRequest>,
    ) -> ApiResult<ImageResponse> {
        let before = checked_image(&state, request.before_image)?;
        let after = request
            .after_image
            .map(|raw| checked_image(&state, raw))
            .transpose()?;
        let (stage, fallback) = resolve_generation_stage(&state, &request.stage);

        let spec = derive_generation_parameters(stage, request.month, request.total_grafts)?
            .with_appearance(appearance(request.hair_color, request.hair_texture));

        info!("Generating month {} for stage {}", spec.month, stage);
        let image = state
            .orchestrator
            .generate_checkpoint(&spec, &before, after.as_ref())
            .await?;

        Ok(Json(ImageResponse {
            image_url: image.into_inner(),
            month: Some(spec.month),
            fallback,
        }))
    }

    /// 生成参数和指令文本预览
    pub async fn generation_spec(
        State(state): State<ApiState>,
        Json(request): Json<GenerationSpecRequest>,
    ) -> ApiResult<GenerationSpecResponse> {
        let (stage, fallback) = resolve_generation_stage(&state, &request.stage);
        let spec = derive_generation_parameters(stage, request.month, request.total_grafts)?;
        let prompt = spec.render_prompt();
        Ok(Json(GenerationSpecResponse {
            spec,
            prompt,
            fallback,
        }))
    }

    /// 单个月份的密度预测
    pub async fn density(
        State(state): State<ApiState>,
        Query(query): Query<DensityQuery>,
    ) -> ApiResult<DensityResponse> {
        let engine = timeline_engine(&state, query.total_grafts);
        let (stage, fallback) = resolve_stage(&query.stage, |stage| engine.total_grafts(stage));
        Ok(Json(DensityResponse {
            profile: engine.density_at(stage, query.month),
            fallback,
        }))
    }

    /// 全部检查点的密度预测
    pub async fn timeline(
        State(state): State<ApiState>,
        Query(query): Query<TimelineQuery>,
    ) -> ApiResult<TimelineResponse> {
        let engine = timeline_engine(&state, query.total_grafts);
        let (stage, fallback) = resolve_stage(&query.stage, |stage| engine.total_grafts(stage));
        Ok(Json(TimelineResponse {
            stage,
            timeline: engine.timeline(stage),
            fallback,
        }))
    }

    /// 新建会话并提交患者信息
    pub async fn create_session(
        State(state): State<ApiState>,
        Json(request): Json<CreateSessionRequest>,
    ) -> ApiResult<WorkflowState> {
        let session = state
            .orchestrator
            .flow()
            .submit_patient_info(&WorkflowState::new(), request.patient)?;
        Ok(Json(session))
    }

    /// 上传正面或头顶照片
    pub async fn upload_photo(
        State(state): State<ApiState>,
        Json(request): Json<PhotoUploadRequest>,
    ) -> ApiResult<WorkflowState> {
        let photo = uploaded_photo(&state, request.image)?;
        let session = state
            .orchestrator
            .flow()
            .upload_photo(&request.state, request.view, photo)?;
        Ok(Json(session))
    }

    /// 更换照片，回到上传步骤
    pub async fn replace_photo(
        State(state): State<ApiState>,
        Json(request): Json<SessionRequest>,
    ) -> ApiResult<WorkflowState> {
        let session = state.orchestrator.flow().replace_photo(&request.state)?;
        Ok(Json(session))
    }

    /// 分析会话中已上传的照片
    pub async fn analyze_session(
        State(state): State<ApiState>,
        Json(request): Json<SessionRequest>,
    ) -> ApiResult<WorkflowState> {
        // 客户端回传的照片重新检查上传限制
        let limits = state.orchestrator.flow().limits();
        for photo in [&request.state.front_photo, &request.state.top_photo]
            .into_iter()
            .flatten()
        {
            limits.check(photo)?;
        }

        let session = state.orchestrator.analyze(&request.state).await?;
        Ok(Json(session))
    }

    /// 生成整条时间线：先最终效果，再并发生成其余检查点
    pub async fn generate_session_timeline(
        State(state): State<ApiState>,
        Json(request): Json<SessionRequest>,
    ) -> ApiResult<TimelineGenerationResponse> {
        let (session, report) = state.orchestrator.generate_timeline(&request.state).await?;
        Ok(Json(TimelineGenerationResponse {
            state: session,
            report,
        }))
    }

    /// 单独重新生成一个检查点
    pub async fn regenerate_checkpoint(
        State(state): State<ApiState>,
        Path(month): Path<u32>,
        Json(request): Json<SessionRequest>,
    ) -> ApiResult<RegenerationResponse> {
        let (session, outcome) = state.orchestrator.regenerate(&request.state, month).await?;
        Ok(Json(RegenerationResponse {
            state: session,
            outcome,
        }))
    }

    /// 项目目录
    pub async fn list_procedures() -> Json<Value> {
        let procedures: Vec<Value> = PROCEDURES
            .iter()
            .map(|p| json!({ "id": p.id, "name": p.name, "description": p.description }))
            .collect();
        Json(json!({ "procedures": procedures, "total": procedures.len() }))
    }

    /// 通用项目效果模拟
    pub async fn simulate_procedure(
        State(state): State<ApiState>,
        Path(procedure_id): Path<String>,
        Json(request): Json<SimulateRequest>,
    ) -> ApiResult<ImageResponse> {
        let photo = checked_image(&state, request.image)?;
        let image = state
            .orchestrator
            .simulate_procedure(&procedure_id, &photo)
            .await?;

        Ok(Json(ImageResponse {
            image_url: image.into_inner(),
            month: None,
            fallback: None,
        }))
    }
}

/// 创建API路由
pub fn create_router(state: ApiState) -> Router {
    let body_limit = state.body_limit;
    let request_timeout = state.request_timeout;

    let api = Router::new()
        .route("/hair/analyze", post(ApiHandler::analyze))
        .route("/hair/estimate", post(ApiHandler::estimate))
        .route("/hair/generate-final", post(ApiHandler::generate_final))
        .route("/hair/generate-timeline", post(ApiHandler::generate_timeline))
        .route("/hair/generation-spec", post(ApiHandler::generation_spec))
        .route("/hair/density", get(ApiHandler::density))
        .route("/hair/timeline", get(ApiHandler::timeline))
        .route("/hair/session", post(ApiHandler::create_session))
        .route("/hair/session/photo", post(ApiHandler::upload_photo))
        .route("/hair/session/replace-photo", post(ApiHandler::replace_photo))
        .route("/hair/session/analyze", post(ApiHandler::analyze_session))
        .route("/hair/timeline/generate", post(ApiHandler::generate_session_timeline))
        .route(
            "/hair/timeline/:month/regenerate",
            post(ApiHandler::regenerate_checkpoint),
        )
        .route("/procedures", get(ApiHandler::list_procedures))
        .route("/procedures/:id/simulate", post(ApiHandler::simulate_procedure));

    Router::new()
        .route("/health", get(ApiHandler::health_check))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(DefaultBodyLimit::max(body_limit)),
        )
}

/// API服务器
pub struct ApiServer {
    app: Router,
}

impl ApiServer {
    pub fn new(state: ApiState) -> Self {
        Self {
            app: create_router(state),
        }
    }

    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        info!("Starting API server on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.app).await?;
        Ok(())
    }
}
