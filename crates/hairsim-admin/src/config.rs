//! 配置管理
//!
//! 配置来源按优先级从低到高：内置默认值、配置文件、`HAIRSIM_` 前缀的环境变量
//! （层级分隔符为 `__`，如 `HAIRSIM_GATEWAY__API_KEY`）。

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use hairsim_integration::{AuthenticationConfig, GatewayConfig};
use hairsim_planning::{CostModel, GraftEstimator, GraftTable};
use hairsim_workflow::{PhotoLimits, RetryPolicy, TimelinePlan};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info};

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    /// 配置数据
    config: Arc<RwLock<HairSimConfig>>,
    /// 配置文件路径
    config_path: Option<String>,
    /// 配置验证器
    validator: ConfigValidator,
}

/// 完整配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HairSimConfig {
    pub server: ServerConfig,
    pub gateway: GatewaySettings,
    pub retry: RetrySettings,
    pub planning: PlanningConfig,
    pub upload: UploadConfig,
    pub logging: LoggingConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// 服务器名称
    pub name: String,
    /// 监听主机
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 单个API请求的超时（秒），需覆盖整条时间线的生成
    pub request_timeout_secs: u64,
}

/// AI网关配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewaySettings {
    pub endpoint: String,
    /// 未设置时不发送认证头
    pub api_key: Option<String>,
    /// 设置后以该请求头发送密钥，否则使用 Bearer
    pub api_key_header: Option<String>,
    pub vision_model: String,
    pub image_model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

/// 重试配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrySettings {
    /// 最大尝试次数（含首次）
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

/// 规划配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlanningConfig {
    /// 毛囊数估算使用的对照表
    pub estimator_preset: GraftTable,
    /// 未提供毛囊总数时密度时间线使用的对照表
    pub timeline_preset: GraftTable,
    /// 费用区间口径
    pub cost_model: CostModel,
    pub include_shock_loss: bool,
    pub include_refinement: bool,
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    /// 单张照片大小上限（字节）
    pub max_photo_bytes: u64,
}

/// 日志格式
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别，`RUST_LOG` 优先
    pub level: String,
    /// 日志格式
    pub format: LogFormat,
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    /// 验证规则
    validation_rules: Vec<ValidationRule>,
}

/// 验证规则
#[derive(Debug)]
pub struct ValidationRule {
    /// 字段路径
    pub field_path: String,
    /// 验证函数
    pub validator: fn(&HairSimConfig) -> Result<()>,
    /// 错误消息
    pub error_message: String,
}

impl ConfigManager {
    /// 创建新的配置管理器
    pub fn new(config_path: Option<&str>) -> Result<Self> {
        let config = Self::load_config(config_path)?;
        let validator = ConfigValidator::new();
        validator.validate(&config)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path: config_path.map(str::to_string),
            validator,
        })
    }

    /// 加载配置
    fn load_config(config_path: Option<&str>) -> Result<HairSimConfig> {
        let defaults = Config::try_from(&HairSimConfig::default())
            .context("Failed to build default configuration")?;

        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix("HAIRSIM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to load configuration")?;

        let config: HairSimConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        match config_path {
            Some(path) => info!("Configuration loaded successfully from: {}", path),
            None => info!("Configuration loaded from defaults and environment"),
        }
        Ok(config)
    }

    /// 获取配置
    pub async fn get_config(&self) -> HairSimConfig {
        let config = self.config.read().await;
        config.clone()
    }

    /// 更新配置
    pub async fn update_config(&self, new_config: HairSimConfig) -> Result<()> {
        // 验证新配置
        self.validator.validate(&new_config)?;

        {
            let mut config = self.config.write().await;
            *config = new_config;
        }

        if let Some(path) = &self.config_path {
            self.save_config(path).await?;
        }

        info!("Configuration updated successfully");
        Ok(())
    }

    /// 保存配置到文件
    pub async fn save_config(&self, path: &str) -> Result<()> {
        let config = self.config.read().await;
        let config_str =
            toml::to_string_pretty(&*config).context("Failed to serialize configuration")?;

        tokio::fs::write(path, config_str)
            .await
            .context("Failed to write configuration file")?;

        info!("Configuration saved to: {}", path);
        Ok(())
    }

    /// 重新加载配置
    pub async fn reload_config(&self) -> Result<()> {
        let new_config = Self::load_config(self.config_path.as_deref())?;
        self.validator.validate(&new_config)?;

        let mut config = self.config.write().await;
        *config = new_config;
        Ok(())
    }

    /// 按点分路径获取配置值，如 `gateway.timeout_secs`
    pub async fn get_value<T>(&self, path: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let config = self.config.read().await;
        let value = extract_nested_value(&config, path)
            .context(format!("Configuration path not found: {}", path))?;

        serde_json::from_value(value).context("Failed to deserialize configuration value")
    }

    /// 验证配置
    pub async fn validate_config(&self) -> Result<()> {
        let config = self.config.read().await;
        self.validator.validate(&config)
    }
}

/// 提取嵌套值
fn extract_nested_value(config: &HairSimConfig, path: &str) -> Result<serde_json::Value> {
    let config_json = serde_json::to_value(config).context("Failed to serialize config to JSON")?;

    let mut current = &config_json;
    for part in path.split('.') {
        match current {
            serde_json::Value::Object(map) => {
                current = map
                    .get(part)
                    .ok_or_else(|| anyhow::anyhow!("Path segment not found: {}", part))?;
            }
            _ => return Err(anyhow::anyhow!("Invalid path at segment: {}", part)),
        }
    }

    Ok(current.clone())
}

impl HairSimConfig {
    /// 服务监听地址
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        let authentication = match (&self.gateway.api_key, &self.gateway.api_key_header) {
            (Some(key), Some(header)) if !key.is_empty() => AuthenticationConfig::ApiKey {
                key: key.clone(),
                header: Some(header.clone()),
            },
            (Some(key), None) if !key.is_empty() => {
                AuthenticationConfig::BearerToken { token: key.clone() }
            }
            _ => AuthenticationConfig::None,
        };

        GatewayConfig {
            endpoint: self.gateway.endpoint.clone(),
            authentication,
            vision_model: self.gateway.vision_model.clone(),
            image_model: self.gateway.image_model.clone(),
            temperature: self.gateway.temperature,
            timeout_secs: self.gateway.timeout_secs,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
            multiplier: self.retry.multiplier,
        }
    }

    pub fn estimator(&self) -> GraftEstimator {
        GraftEstimator::new(self.planning.estimator_preset)
    }

    pub fn timeline_plan(&self) -> TimelinePlan {
        TimelinePlan {
            include_shock_loss: self.planning.include_shock_loss,
            include_refinement: self.planning.include_refinement,
        }
    }

    pub fn photo_limits(&self) -> PhotoLimits {
        PhotoLimits {
            max_bytes: self.upload.max_photo_bytes,
        }
    }
}

impl ConfigValidator {
    /// 创建新的配置验证器
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "server.port".to_string(),
                validator: |config| {
                    if config.server.port == 0 {
                        Err(anyhow::anyhow!("Server port cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid server port".to_string(),
            },
            ValidationRule {
                field_path: "server.request_timeout_secs".to_string(),
                validator: |config| {
                    if config.server.request_timeout_secs == 0 {
                        Err(anyhow::anyhow!("Request timeout cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid request timeout".to_string(),
            },
            ValidationRule {
                field_path: "gateway.endpoint".to_string(),
                validator: |config| {
                    let endpoint = config.gateway.endpoint.trim();
                    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
                        Ok(())
                    } else {
                        Err(anyhow::anyhow!(
                            "Gateway endpoint must be an http(s) URL, got '{}'",
                            endpoint
                        ))
                    }
                },
                error_message: "Invalid gateway endpoint".to_string(),
            },
            ValidationRule {
                field_path: "gateway.temperature".to_string(),
                validator: |config| {
                    if (0.0..=2.0).contains(&config.gateway.temperature) {
                        Ok(())
                    } else {
                        Err(anyhow::anyhow!("Temperature must be within [0, 2]"))
                    }
                },
                error_message: "Invalid gateway temperature".to_string(),
            },
            ValidationRule {
                field_path: "retry.max_attempts".to_string(),
                validator: |config| {
                    if config.retry.max_attempts == 0 {
                        Err(anyhow::anyhow!("At least one attempt is required"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid retry attempts".to_string(),
            },
            ValidationRule {
                field_path: "retry.multiplier".to_string(),
                validator: |config| {
                    if config.retry.multiplier < 1.0 {
                        Err(anyhow::anyhow!("Backoff multiplier cannot be below 1.0"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid retry multiplier".to_string(),
            },
            ValidationRule {
                field_path: "upload.max_photo_bytes".to_string(),
                validator: |config| {
                    if config.upload.max_photo_bytes == 0 {
                        Err(anyhow::anyhow!("Photo size limit cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid upload limit".to_string(),
            },
        ];

        Self { validation_rules }
    }

    /// 验证配置
    pub fn validate(&self, config: &HairSimConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(anyhow::anyhow!("{}: {}", rule.error_message, e));
            }
        }

        info!("Configuration validation passed");
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "HairSim-Server".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 300,
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        let gateway = GatewayConfig::default();
        Self {
            endpoint: gateway.endpoint,
            api_key: None,
            api_key_header: None,
            vision_model: gateway.vision_model,
            image_model: gateway.image_model,
            temperature: gateway.temperature,
            timeout_secs: gateway.timeout_secs,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
            multiplier: policy.multiplier,
        }
    }
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            estimator_preset: GraftTable::Clinical,
            timeline_preset: GraftTable::Legacy,
            cost_model: CostModel::PerGraftRange,
            include_shock_loss: false,
            include_refinement: false,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_photo_bytes: PhotoLimits::default().max_bytes,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
