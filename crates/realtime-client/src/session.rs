//! Realtime session configuration and its validation rules
//! (spec.md §6.4's session object, §7's config invariants).

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How the realtime peer should decide when a turn has ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnDetection {
    ServerVad { threshold: f32, prefix_padding_ms: u32, silence_duration_ms: u32 },
    None,
}

/// Which tools the realtime peer is allowed to invoke on a given turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
}

impl ToolChoice {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(Self::Auto),
            "none" => Some(Self::None),
            "required" => Some(Self::Required),
            _ => None,
        }
    }
}

/// A function tool the realtime peer may call (spec.md's C6 dispatcher).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Realtime session configuration sent via `session.update`.
///
/// Once the client has connected, `model` is frozen: a later
/// [`SessionConfig::apply_update`] that changes it is rejected rather than
/// silently accepted, since the realtime peer does not support mid-session
/// model swaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub model: String,
    pub instructions: String,
    pub voice: String,
    pub temperature: f32,
    pub turn_detection: TurnDetection,
    pub tool_choice: ToolChoice,
    pub tools: Vec<ToolSpec>,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.6..=1.2).contains(&self.temperature) {
            return Err(ConfigError::TemperatureOutOfRange(self.temperature));
        }
        Ok(())
    }

    /// Validate `next` against `self` as the frozen baseline, rejecting any
    /// attempt to change the model id mid-session.
    pub fn apply_update(&self, next: SessionConfig) -> Result<SessionConfig, ConfigError> {
        next.validate()?;
        if next.model != self.model {
            return Err(ConfigError::ModelFrozen { current: self.model.clone(), attempted: next.model });
        }
        Ok(next)
    }

    pub fn tool_choice_from_str(s: &str) -> Result<ToolChoice, ConfigError> {
        ToolChoice::parse(s).ok_or_else(|| ConfigError::InvalidToolChoice(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SessionConfig {
        SessionConfig {
            model: "realtime-preview".into(),
            instructions: "be helpful".into(),
            voice: "alloy".into(),
            temperature: 0.8,
            turn_detection: TurnDetection::None,
            tool_choice: ToolChoice::Auto,
            tools: vec![],
        }
    }

    #[test]
    fn rejects_temperature_out_of_range() {
        let mut cfg = base();
        cfg.temperature = 1.5;
        assert!(matches!(cfg.validate(), Err(ConfigError::TemperatureOutOfRange(_))));
    }

    #[test]
    fn rejects_model_change_after_connect() {
        let current = base();
        let mut next = base();
        next.model = "other-model".into();
        assert!(matches!(current.apply_update(next), Err(ConfigError::ModelFrozen { .. })));
    }

    #[test]
    fn allows_instruction_change_with_same_model() {
        let current = base();
        let mut next = base();
        next.instructions = "be terse".into();
        assert!(current.apply_update(next).is_ok());
    }

    #[test]
    fn tool_choice_parses_known_values() {
        assert_eq!(SessionConfig::tool_choice_from_str("auto").unwrap(), ToolChoice::Auto);
        assert!(SessionConfig::tool_choice_from_str("bogus").is_err());
    }
}
