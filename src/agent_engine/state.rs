use serde::{Deserialize, Serialize};

/// Wall-clock milliseconds per stage. Stages that did not run are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_conv_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inference_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_ms: Option<f64>,
    pub total_ms: f64,
}

/// Outcome of one capture -> infer -> act step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationResult {
    pub success: bool,
    /// `(width, height)` of the captured screenshot.
    pub image_size: Option<(u32, u32)>,
    pub response: Option<String>,
    pub execution_result: Option<Vec<String>>,
    pub action_triggered: bool,
    /// Kind of the first parsed command.
    pub action_type: Option<String>,
    pub timing: StageTiming,
    pub error: Option<String>,
}

impl AutomationResult {
    pub fn failed(error: String, timing: StageTiming) -> Self {
        Self {
            success: false,
            image_size: None,
            response: None,
            execution_result: None,
            action_triggered: false,
            action_type: None,
            timing,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_stages_are_not_serialized() {
        let timing = StageTiming {
            screenshot_ms: Some(12.5),
            total_ms: 20.0,
            ..StageTiming::default()
        };
        let json = serde_json::to_value(AutomationResult::failed("boom".into(), timing)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "boom");
        assert_eq!(json["timing"]["screenshot_ms"], 12.5);
        assert!(json["timing"].get("inference_ms").is_none());
        assert!(json["image_size"].is_null());
    }
}
