//! 生成指令文本
//!
//! 把 `GenerationSpec` 渲染为发送给影像生成服务的文字指令。输出完全由参数决定。

use std::fmt::Write;

use crate::generation::{CheckpointKind, DensityTarget, GenerationSpec, ReferenceImage};

const PRESERVATION_RULES: &[&str] = &[
    "Keep the exact same face, facial features and skin tone",
    "Preserve realistic skin texture and pores",
    "Keep the same lighting conditions and background",
    "ONLY modify hair density and hairline coverage",
];

const REALISM_RULES: &[&str] = &[
    "Photorealistic medical simulation, not an idealized result",
    "Natural, uneven growth: hair does not grow uniformly",
    "No \"hair plug\" appearance",
];

impl GenerationSpec {
    /// 渲染生成指令
    pub fn render_prompt(&self) -> String {
        let mut out = String::new();

        self.write_header(&mut out);
        self.write_references(&mut out);
        self.write_specifications(&mut out);
        self.write_rules(&mut out);

        out
    }

    fn write_header(&self, out: &mut String) {
        let title = match self.kind {
            CheckpointKind::ShockLoss => {
                "HAIR TRANSPLANT PROGRESS - MONTH 1 (Shock Loss)".to_string()
            }
            CheckpointKind::Interpolated => {
                format!("HAIR TRANSPLANT PROGRESS - MONTH {}", self.month)
            }
            CheckpointKind::Final => format!(
                "HAIR TRANSPLANT FINAL RESULT SIMULATION ({} months post-operative)",
                self.month
            ),
            CheckpointKind::Refinement => {
                format!("HAIR TRANSPLANT REFINEMENT - MONTH {}", self.month)
            }
        };
        let _ = writeln!(out, "{}", title);
        let _ = writeln!(out);
        let _ = writeln!(out, "PATIENT INFORMATION:");
        let _ = writeln!(out, "- Original Norwood Stage: {}", self.stage);
        let _ = writeln!(out, "- Total grafts transplanted: {}", self.total_grafts);
        let _ = writeln!(out, "- Grafts actively growing at this point: ~{}", self.active_grafts);
        if let Some(appearance) = &self.appearance {
            if !appearance.color.is_empty() {
                let _ = writeln!(out, "- Hair color: {} (match exactly)", appearance.color);
            }
            let _ = writeln!(
                out,
                "- Hair texture: {} (maintain natural pattern)",
                appearance.texture.as_str()
            );
        }
        let _ = writeln!(out);
    }

    fn write_references(&self, out: &mut String) {
        let has_before = self.references.contains(&ReferenceImage::Before);
        let has_after = self.references.contains(&ReferenceImage::After);

        match (has_before, has_after) {
            (true, true) => {
                let _ = writeln!(
                    out,
                    "REFERENCE IMAGES PROVIDED: BEFORE (original photo) and AFTER \
                     (month 12 final result)"
                );
            }
            (true, false) => {
                let _ = writeln!(out, "REFERENCE IMAGE PROVIDED: BEFORE (original photo)");
            }
            (false, true) => {
                let _ = writeln!(out, "REFERENCE IMAGE PROVIDED: AFTER (month 12 final result)");
            }
            (false, false) => {}
        }
        let _ = writeln!(out);
    }

    fn write_specifications(&self, out: &mut String) {
        let _ = writeln!(out, "SPECIFICATIONS:");

        match self.density {
            DensityTarget::AtMostBaseline => {
                let _ = writeln!(out, "- Density: EQUAL TO OR LOWER than the BEFORE image");
                let _ = writeln!(
                    out,
                    "- Most transplanted hair has fallen out (shock loss, medically normal)"
                );
                let _ = writeln!(
                    out,
                    "- Almost no new growth; the patient may look temporarily more bald"
                );
                let _ = writeln!(out, "- Healing nearly complete, minimal redness");
            }
            DensityTarget::RelativeToFinal { percent } => {
                let _ = writeln!(
                    out,
                    "- Density: EXACTLY {}% of the hair visible in the AFTER image",
                    percent
                );
                let _ = writeln!(
                    out,
                    "- Show a {}% interpolation from BEFORE towards AFTER, \
                     not a new or different result",
                    percent
                );
                let _ = writeln!(out, "- Hairline placement and shape must follow the AFTER image");
            }
            DensityTarget::Band { min_percent, max_percent } => {
                let _ = writeln!(
                    out,
                    "- Density: {}-{}% of transplanted grafts producing terminal hairs",
                    min_percent, max_percent
                );
            }
            DensityTarget::AtLeastFinal { percent } => {
                let _ = writeln!(
                    out,
                    "- Density: at least the AFTER image (~{}% of final maturity), \
                     slight additional thickening only",
                    percent
                );
                let _ = writeln!(out, "- Hairline and coverage must match the AFTER image");
            }
        }

        let _ = writeln!(
            out,
            "- Hair Length: {} ({})",
            self.hair_length.range_label(),
            self.hair_length.descriptor
        );

        if let Some(hairline) = self.hairline {
            let _ = writeln!(out, "- Hairline: {}", hairline.instruction());
            let _ = writeln!(
                out,
                "- Hairline must be slightly irregular and natural (NOT perfectly straight)"
            );
        }

        if self.kind == CheckpointKind::Final {
            let crown = if self.crown_restoration { "Fully restored" } else { "N/A" };
            let _ = writeln!(
                out,
                "- Coverage: frontal hairline fully restored, mid-scalp complete"
            );
            let _ = writeln!(out, "- Crown/Vertex: {}", crown);
            let _ = writeln!(out, "- Barely visible, well-healed scar at donor area");
        }
        let _ = writeln!(out);
    }

    fn write_rules(&self, out: &mut String) {
        let _ = writeln!(out, "STRICT PRESERVATION RULES:");
        for rule in PRESERVATION_RULES {
            let _ = writeln!(out, "- {}", rule);
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "REALISM REQUIREMENTS:");
        for rule in REALISM_RULES {
            let _ = writeln!(out, "- {}", rule);
        }
        let _ = writeln!(out, "- Clinically accurate for {} months post-operative", self.month);
    }
}

#[cfg(test)]
mod tests {
    use crate::generation::{derive_generation_parameters, HairAppearance};
    use hairsim_core::{BaldingStage, HairTexture};

    #[test]
    fn test_final_prompt_contents() {
        let prompt = derive_generation_parameters(BaldingStage::IV, 12, 3600)
            .unwrap()
            .with_appearance(HairAppearance {
                color: "black".to_string(),
                texture: HairTexture::Straight,
            })
            .render_prompt();

        assert!(prompt.contains("Original Norwood Stage: IV"));
        assert!(prompt.contains("Total grafts transplanted: 3600"));
        assert!(prompt.contains("90-95%"));
        assert!(prompt.contains("8-12cm"));
        assert!(prompt.contains("age 35-45"));
        assert!(prompt.contains("Crown/Vertex: Fully restored"));
        assert!(prompt.contains("Hair color: black"));
        assert!(prompt.contains("same lighting"));
        assert!(!prompt.contains("AFTER (month 12"));
    }

    #[test]
    fn test_intermediate_prompt_anchors_both_references() {
        let prompt = derive_generation_parameters(BaldingStage::III, 6, 2000)
            .unwrap()
            .render_prompt();

        assert!(prompt.contains("BEFORE (original photo) and AFTER"));
        assert!(prompt.contains("EXACTLY 50% of the hair visible in the AFTER image"));
        assert!(prompt.contains("4-6cm"));
    }

    #[test]
    fn test_shock_loss_prompt() {
        let prompt = derive_generation_parameters(BaldingStage::IV, 1, 3000)
            .unwrap()
            .render_prompt();
        assert!(prompt.contains("EQUAL TO OR LOWER than the BEFORE image"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let spec = derive_generation_parameters(BaldingStage::Va, 9, 4400).unwrap();
        assert_eq!(spec.render_prompt(), spec.clone().render_prompt());
    }
}
