//! 视觉分类结果解析
//!
//! 模型输出可能包在 markdown 代码块里，也可能夹杂说明文字。
//! 取第一个 `{` 到最后一个 `}` 之间的内容解析；分类值无法识别时
//! 使用中性默认值并记录警告，不中断流程。

use hairsim_core::{
    HairCharacteristics, HairContrast, HairSimError, HairTexture, HairThickness, Result, StageInput,
};
use hairsim_workflow::Classification;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// 发送给视觉模型的分类指令
pub const CLASSIFICATION_PROMPT: &str = r#"You are a board-certified hair transplant surgeon.
Classify the patient photos on the Norwood-Hamilton scale.

STAGES (use these exact labels):
- I: no hair loss, minimal recession
- II: minimal temple recession
- IIa: frontal recession rather than temple recession
- III: deep temple recession, M-shaped hairline
- IIIa: more pronounced frontal recession than IIa
- III Vertex: stage III hairline with crown thinning
- IV: large frontal recession and crown thinning, thin bridge between them
- IVa: more extensive than IV
- V: large bald area, very thin bridge between front and crown
- Va: more extensive than V
- VI: bridge gone, horseshoe forming
- VII: only the horseshoe on the sides and back remains

ASSESSMENT:
1. Hairline position relative to the eyebrows and the temple angles
2. Temple recession depth
3. Crown: a stage III hairline WITH crown thinning is "III Vertex", not "III"
4. If the front recedes more than the temples, use the "a" variant
5. Bridge between front and crown: thin means IV-V, absent means VI

Also describe the hair: thickness (fine, medium, coarse), texture (straight, wavy, curly),
color, scalp color, and hair/scalp contrast (low, medium, high).

Return ONLY this JSON, without markdown:
{
  "norwoodStage": "IV",
  "confidence": 88,
  "description": "Large frontal recession with crown thinning",
  "hairCharacteristics": {
    "thickness": "medium",
    "texture": "straight",
    "color": "black",
    "scalpColor": "light",
    "contrast": "high"
  },
  "crownThinning": true
}"#;

fn json_object_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("static pattern is valid"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawClassification {
    norwood_stage: Option<serde_json::Value>,
    confidence: Option<f64>,
    hair_characteristics: Option<RawCharacteristics>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCharacteristics {
    thickness: Option<String>,
    texture: Option<String>,
    contrast: Option<String>,
    color: Option<String>,
    #[serde(alias = "scalpTone")]
    scalp_color: Option<String>,
}

/// 提取模型输出中的 JSON 对象
pub fn extract_json(text: &str) -> Result<&str> {
    json_object_pattern()
        .find(text)
        .map(|m| m.as_str())
        .ok_or_else(|| {
            HairSimError::Classification("No JSON object in classifier response".to_string())
        })
}

/// 解析模型输出为分类结果
pub fn parse_classification(text: &str) -> Result<Classification> {
    let json = extract_json(text)?;
    let raw: RawClassification = serde_json::from_str(json)
        .map_err(|e| HairSimError::Classification(format!("Invalid JSON from classifier: {}", e)))?;

    let mut warnings = Vec::new();

    let stage_label = match raw.norwood_stage {
        Some(serde_json::Value::String(label)) => label,
        Some(serde_json::Value::Number(code)) => code.to_string(),
        _ => return Err(HairSimError::Classification("Classifier returned no stage".to_string())),
    };
    let stage = StageInput::parse(&stage_label);
    if !stage.is_recognized() {
        warnings.push(format!(
            "Unrecognized stage '{}', using {}",
            stage_label,
            stage.effective_stage()
        ));
    }

    let confidence = match raw.confidence {
        // 模型常按百分比返回
        Some(value) if value > 1.0 => (value / 100.0).min(1.0) as f32,
        Some(value) => value.max(0.0) as f32,
        None => {
            warnings.push("Classifier returned no confidence".to_string());
            0.0
        }
    };

    let characteristics = parse_characteristics(raw.hair_characteristics, &mut warnings);

    for warning in &warnings {
        warn!("Classification: {}", warning);
    }
    debug!("Parsed classification stage {:?}, confidence {:.2}", stage, confidence);

    Ok(Classification {
        stage,
        confidence,
        characteristics,
        warnings,
    })
}

fn parse_characteristics(
    raw: Option<RawCharacteristics>,
    warnings: &mut Vec<String>,
) -> HairCharacteristics {
    let raw = raw.unwrap_or_else(|| {
        warnings.push("Classifier returned no hair characteristics, using defaults".to_string());
        RawCharacteristics::default()
    });

    HairCharacteristics {
        thickness: categorical("thickness", raw.thickness, HairThickness::parse, warnings),
        texture: categorical("texture", raw.texture, HairTexture::parse, warnings),
        contrast: categorical("contrast", raw.contrast, HairContrast::parse, warnings),
        color: raw.color.unwrap_or_default(),
        scalp_tone: raw.scalp_color.unwrap_or_default(),
    }
}

fn categorical<T: Default + Copy + std::fmt::Debug>(
    field: &str,
    value: Option<String>,
    parse: fn(&str) -> Option<T>,
    warnings: &mut Vec<String>,
) -> T {
    match value {
        None => T::default(),
        Some(value) => parse(&value).unwrap_or_else(|| {
            let fallback = T::default();
            warnings.push(format!("Unknown {} '{}', using {:?}", field, value, fallback));
            fallback
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hairsim_core::BaldingStage;

    #[test]
    fn test_parse_fenced_response() {
        let text = r#"Here is the analysis:
```json
{
  "norwoodStage": "IV",
  "confidence": 88,
  "hairCharacteristics": {
    "thickness": "medium",
    "texture": "straight",
    "color": "black",
    "scalpColor": "light",
    "contrast": "high"
  }
}
```"#;

        let classification = parse_classification(text).unwrap();
        assert_eq!(classification.stage, StageInput::Known(BaldingStage::IV));
        assert!((classification.confidence - 0.88).abs() < 1e-6);
        assert_eq!(classification.characteristics.contrast, HairContrast::High);
        assert_eq!(classification.characteristics.color, "black");
        assert_eq!(classification.characteristics.scalp_tone, "light");
        assert!(classification.warnings.is_empty());
    }

    #[test]
    fn test_numeric_stage_codes() {
        let classification =
            parse_classification(r#"{"norwoodStage": "3V", "confidence": 0.7}"#).unwrap();
        assert_eq!(classification.stage, StageInput::Known(BaldingStage::IIIVertex));

        let classification =
            parse_classification(r#"{"norwoodStage": 5, "confidence": 70}"#).unwrap();
        assert_eq!(classification.stage, StageInput::Known(BaldingStage::V));
    }

    #[test]
    fn test_unknown_values_fall_back_with_warnings() {
        let text = r#"{"norwoodStage": "XII", "confidence": 60,
            "hairCharacteristics": {
                "thickness": "wiry", "texture": "curly", "contrast": "extreme"
            }}"#;

        let classification = parse_classification(text).unwrap();
        assert!(!classification.stage.is_recognized());
        assert_eq!(classification.characteristics.thickness, HairThickness::Medium);
        assert_eq!(classification.characteristics.texture, HairTexture::Curly);
        assert_eq!(classification.characteristics.contrast, HairContrast::Medium);
        assert_eq!(classification.warnings.len(), 3);
    }

    #[test]
    fn test_invalid_responses() {
        assert!(matches!(
            parse_classification("I cannot analyze this image."),
            Err(HairSimError::Classification(_))
        ));
        assert!(matches!(
            parse_classification(r#"{"confidence": 50}"#),
            Err(HairSimError::Classification(_))
        ));
        assert!(matches!(parse_classification("{not json}"), Err(HairSimError::Classification(_))));
    }
}
