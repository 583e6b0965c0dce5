//! AI网关连接器
//!
//! 通过 chat-completions 格式的网关调用视觉分类和影像生成模型。
//! 重试不在这里处理，由工作流层的重试策略统一负责。

use async_trait::async_trait;
use hairsim_core::{HairSimError, ImageHandle, Result};
use hairsim_workflow::{Classification, ImageGenerator, VisionClassifier};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::classification::{parse_classification, CLASSIFICATION_PROMPT};

/// 认证配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthenticationConfig {
    None,
    ApiKey { key: String, header: Option<String> },
    BearerToken { token: String },
}

/// 网关配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayConfig {
    pub endpoint: String,
    pub authentication: AuthenticationConfig,
    pub vision_model: String,
    pub image_model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://ai.gateway.lovable.dev/v1/chat/completions".to_string(),
            authentication: AuthenticationConfig::None,
            vision_model: "google/gemini-2.5-flash".to_string(),
            image_model: "google/gemini-2.5-flash-image-preview".to_string(),
            temperature: 0.7,
            timeout_secs: 120,
        }
    }
}

/// AI网关连接器
pub struct AiGatewayConnector {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl AiGatewayConnector {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HairSimError::Config(format!("Failed to build HTTP client: {}", e)))?;

        info!("AI gateway connector using {}", config.endpoint);
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// 分类请求体
    pub fn classification_request(&self, front: &ImageHandle, top: Option<&ImageHandle>) -> Value {
        let mut content = vec![image_part(front)];
        if let Some(top) = top {
            content.push(image_part(top));
        }
        content.push(json!({ "type": "text", "text": CLASSIFICATION_PROMPT }));

        json!({
            "model": self.config.vision_model,
            "messages": [{ "role": "user", "content": content }],
        })
    }

    /// 生成请求体，指令在前，参照影像按顺序在后
    pub fn generation_request(&self, prompt: &str, references: &[ImageHandle]) -> Value {
        let mut content = vec![json!({ "type": "text", "text": prompt })];
        content.extend(references.iter().map(image_part));

        json!({
            "model": self.config.image_model,
            "messages": [{ "role": "user", "content": content }],
            "modalities": ["image", "text"],
            "temperature": self.config.temperature,
        })
    }

    /// 发送请求并按状态码分类错误
    async fn complete(&self, body: &Value) -> Result<Value> {
        let request = self.client.post(&self.config.endpoint).json(body);
        let request = add_auth_headers(request, &self.config.authentication);

        let response = request
            .send()
            .await
            .map_err(|e| HairSimError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| HairSimError::Transport(e.to_string()))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(HairSimError::RateLimited);
        }
        if !status.is_success() {
            error!("AI gateway returned {}: {}", status, text);
            return Err(HairSimError::Gateway {
                status: status.as_u16(),
                message: text,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

fn image_part(image: &ImageHandle) -> Value {
    json!({ "type": "image_url", "image_url": { "url": image.as_str() } })
}

/// 添加认证头
fn add_auth_headers(
    request: reqwest::RequestBuilder,
    auth: &AuthenticationConfig,
) -> reqwest::RequestBuilder {
    match auth {
        AuthenticationConfig::None => request,
        AuthenticationConfig::ApiKey { key, header } => {
            let header_name = header.as_deref().unwrap_or("X-API-Key");
            request.header(header_name, key)
        }
        AuthenticationConfig::BearerToken { token } => request.bearer_auth(token),
    }
}

/// 响应中的文本内容
pub fn response_text(response: &Value) -> Result<&str> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| HairSimError::Classification("No analysis content in response".to_string()))
}

/// 响应中的生成影像
pub fn response_image(response: &Value) -> Result<ImageHandle> {
    response["choices"][0]["message"]["images"][0]["image_url"]["url"]
        .as_str()
        .map(ImageHandle::from)
        .ok_or_else(|| HairSimError::Gateway {
            status: StatusCode::BAD_GATEWAY.as_u16(),
            message: "No image in response".to_string(),
        })
}

#[async_trait]
impl VisionClassifier for AiGatewayConnector {
    async fn classify(
        &self,
        front: &ImageHandle,
        top: Option<&ImageHandle>,
    ) -> Result<Classification> {
        let photos = if top.is_some() { 2 } else { 1 };
        debug!("Requesting classification with {} photo(s)", photos);
        let response = self.complete(&self.classification_request(front, top)).await?;
        parse_classification(response_text(&response)?)
    }
}

#[async_trait]
impl ImageGenerator for AiGatewayConnector {
    async fn generate(&self, prompt: &str, references: &[ImageHandle]) -> Result<ImageHandle> {
        debug!("Requesting image generation with {} reference(s)", references.len());
        let response = self.complete(&self.generation_request(prompt, references)).await?;
        response_image(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector() -> AiGatewayConnector {
        AiGatewayConnector::new(GatewayConfig::default()).unwrap()
    }

    #[test]
    fn test_generation_request_shape() {
        let refs = vec![ImageHandle::new("data:before"), ImageHandle::new("https://after.png")];
        let body = connector().generation_request("make it so", &refs);

        assert_eq!(body["model"], "google/gemini-2.5-flash-image-preview");
        assert_eq!(body["modalities"], json!(["image", "text"]));

        let content = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 3);
        assert_eq!(content[0]["text"], "make it so");
        assert_eq!(content[1]["image_url"]["url"], "data:before");
        assert_eq!(content[2]["image_url"]["url"], "https://after.png");
    }

    #[test]
    fn test_classification_request_includes_optional_top_view() {
        let front = ImageHandle::new("data:front");
        let top = ImageHandle::new("data:top");

        let body = connector().classification_request(&front, None);
        assert_eq!(body["messages"][0]["content"].as_array().unwrap().len(), 2);

        let body = connector().classification_request(&front, Some(&top));
        let content = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 3);
        assert_eq!(content[1]["image_url"]["url"], "data:top");
        assert!(content[2]["text"].as_str().unwrap().contains("III Vertex"));
    }

    #[test]
    fn test_response_extraction() {
        let response = json!({
            "choices": [{ "message": {
                "content": "done",
                "images": [{ "image_url": { "url": "data:image/png;base64,OUT" } }]
            }}]
        });
        assert_eq!(response_text(&response).unwrap(), "done");
        assert_eq!(response_image(&response).unwrap().as_str(), "data:image/png;base64,OUT");

        let empty = json!({ "choices": [] });
        assert!(matches!(response_image(&empty), Err(HairSimError::Gateway { status: 502, .. })));
        assert!(response_image(&empty).unwrap_err().is_retryable());
        assert!(matches!(response_text(&empty), Err(HairSimError::Classification(_))));
    }

    #[test]
    fn test_auth_headers() {
        let client = reqwest::Client::new();

        let request = add_auth_headers(
            client.post("http://localhost/v1"),
            &AuthenticationConfig::BearerToken { token: "secret".to_string() },
        )
        .build()
        .unwrap();
        assert_eq!(request.headers()["authorization"], "Bearer secret");

        let request = add_auth_headers(
            client.post("http://localhost/v1"),
            &AuthenticationConfig::ApiKey {
                key: "k1".to_string(),
                header: None,
            },
        )
        .build()
        .unwrap();
        assert_eq!(request.headers()["x-api-key"], "k1");
    }
}
