//! HairSim服务器主程序

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hairsim_admin::{init_logging, ConfigManager};
use hairsim_core::{
    HairCharacteristics, HairContrast, HairTexture, HairThickness, StageInput,
};
use hairsim_integration::{AiGatewayConnector, ApiServer, ApiState};
use hairsim_planning::{CostModel, GraftEstimator, GraftTable, TimelineEngine};
use hairsim_workflow::{SessionFlow, TimelineOrchestrator};
use std::sync::Arc;
use tracing::{error, info};

/// HairSim命令行参数
#[derive(Parser, Debug)]
#[command(name = "hairsim-server")]
#[command(about = "毛发移植效果模拟服务")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 启动HTTP服务
    Serve {
        /// 配置文件路径
        #[arg(short, long)]
        config: Option<String>,

        /// 监听主机，覆盖配置
        #[arg(long)]
        host: Option<String>,

        /// 监听端口，覆盖配置
        #[arg(short, long)]
        port: Option<u16>,

        /// 日志级别，覆盖配置
        #[arg(short, long)]
        log_level: Option<String>,
    },
    /// 离线计算毛囊数和密度时间线
    Plan {
        /// 秃发分级，如 "IV" 或 "3V"
        #[arg(short, long, default_value = "III Vertex")]
        stage: String,

        /// 发径: fine, medium, coarse
        #[arg(long, default_value = "medium")]
        thickness: String,

        /// 发质: straight, wavy, curly
        #[arg(long, default_value = "straight")]
        texture: String,

        /// 发色与头皮对比度: low, medium, high
        #[arg(long, default_value = "medium")]
        contrast: String,

        /// 毛囊数对照表: clinical, legacy
        #[arg(long, default_value = "clinical")]
        preset: String,

        /// 费用区间口径: per_graft_range, average_band
        #[arg(long, default_value = "per_graft_range")]
        cost_model: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Serve {
            config,
            host,
            port,
            log_level,
        } => serve(config, host, port, log_level).await,
        Command::Plan {
            stage,
            thickness,
            texture,
            contrast,
            preset,
            cost_model,
        } => plan(&stage, &thickness, &texture, &contrast, &preset, &cost_model),
    }
}

async fn serve(
    config_path: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    log_level: Option<String>,
) -> Result<()> {
    let manager = ConfigManager::new(config_path.as_deref())?;
    let mut config = manager.get_config().await;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(level) = log_level {
        config.logging.level = level;
    }

    init_logging(&config.logging)?;

    info!("Starting {}...", config.server.name);
    info!("  Gateway: {}", config.gateway.endpoint);
    info!("  Estimator preset: {}", config.planning.estimator_preset.name());
    info!("  Timeline preset: {}", config.planning.timeline_preset.name());
    info!("  Cost model: {}", config.planning.cost_model.name());
    info!("  Checkpoints: {:?}", config.timeline_plan().months());
    info!("  Request timeout: {:?}", config.request_timeout());
    if config.gateway.api_key.is_none() {
        info!("  No gateway API key configured, requests are sent unauthenticated");
    }

    let connector = Arc::new(AiGatewayConnector::new(config.gateway_config())?);
    let orchestrator = TimelineOrchestrator::new(connector.clone(), connector)
        .with_estimator(config.estimator())
        .with_cost_model(config.planning.cost_model)
        .with_retry_policy(config.retry_policy())
        .with_session_flow(SessionFlow::new(config.photo_limits()))
        .with_plan(config.timeline_plan());

    // 会话状态随请求往返，携带两张照片和已生成的各月图片（data URL 有 4/3 的 base64 开销）
    let body_limit = (config.upload.max_photo_bytes as usize).saturating_mul(8);
    let state = ApiState::new(Arc::new(orchestrator))
        .with_timeline_table(config.planning.timeline_preset)
        .with_request_timeout(config.request_timeout())
        .with_body_limit(body_limit);

    let addr = config.listen_addr();
    if let Err(e) = ApiServer::new(state).run(&addr).await {
        error!("Server failed: {}", e);
        return Err(e);
    }

    Ok(())
}

fn plan(
    stage: &str,
    thickness: &str,
    texture: &str,
    contrast: &str,
    preset: &str,
    cost_model: &str,
) -> Result<()> {
    let characteristics = HairCharacteristics::new(
        HairThickness::parse(thickness).context(format!("Unknown thickness: {}", thickness))?,
        HairTexture::parse(texture).context(format!("Unknown texture: {}", texture))?,
        HairContrast::parse(contrast).context(format!("Unknown contrast: {}", contrast))?,
    );
    let table = GraftTable::parse(preset).context(format!("Unknown preset: {}", preset))?;
    let cost_model =
        CostModel::parse(cost_model).context(format!("Unknown cost model: {}", cost_model))?;

    let stage = StageInput::parse(stage);
    let estimate = GraftEstimator::new(table).estimate(&stage, &characteristics);
    let timeline = TimelineEngine::seeded(&estimate).timeline(stage.effective_stage());
    let cost = cost_model.for_grafts(&estimate);

    let output = serde_json::json!({
        "stage": stage.effective_stage().label(),
        "estimate": estimate,
        "cost": cost,
        "timeline": timeline,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
