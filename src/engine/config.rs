//! Per-call generation and synthesis parameters.
//!
//! All fields have safe defaults. Parameters are validated before use.

use super::error::RuntimeError;

/// Per-call text generation configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature for sampling (0.0 = deterministic)
    pub temperature: f32,
    /// Top-p (nucleus) sampling threshold, in (0.0, 1.0]
    pub top_p: f32,
    /// Top-k sampling limit (0 = disabled)
    pub top_k: u32,
    /// Repetition penalty (1.0 = none)
    pub repetition_penalty: f32,
    /// Requested deadline for one generation call, in milliseconds. Only
    /// validated: no backend generates text yet, so nothing enforces it.
    pub timeout_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 256,
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            repetition_penalty: 1.1,
            timeout_ms: 30_000,
        }
    }
}

impl GenerationConfig {
    /// Validate configuration values. Returns error on invalid values.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.max_tokens == 0 {
            return Err(RuntimeError::InvalidConfig("max_tokens must be > 0".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RuntimeError::InvalidConfig(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.top_p <= 0.0 || self.top_p > 1.0 {
            return Err(RuntimeError::InvalidConfig(
                "top_p must be in range (0.0, 1.0]".into(),
            ));
        }
        if self.repetition_penalty < 1.0 {
            return Err(RuntimeError::InvalidConfig(
                "repetition_penalty must be >= 1.0".into(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(RuntimeError::InvalidConfig("timeout_ms must be > 0".into()));
        }
        Ok(())
    }

    /// Greedy decoding.
    pub fn deterministic() -> Self {
        Self {
            temperature: 0.0,
            top_p: 1.0,
            top_k: 0,
            repetition_penalty: 1.0,
            ..Self::default()
        }
    }
}

/// Speech synthesis parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisParams {
    /// Denoising steps (quality vs. latency).
    pub steps: u32,
    /// Speaking rate multiplier.
    pub speed: f32,
    /// Silence inserted between text chunks, in seconds.
    pub silence_secs: f32,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            steps: 5,
            speed: 1.05,
            silence_secs: 0.3,
        }
    }
}

impl SynthesisParams {
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.steps == 0 || self.steps > 100 {
            return Err(RuntimeError::InvalidConfig("steps must be in 1..=100".into()));
        }
        if !(0.5..=2.0).contains(&self.speed) {
            return Err(RuntimeError::InvalidConfig(
                "speed must be between 0.5 and 2.0".into(),
            ));
        }
        if !(0.0..=5.0).contains(&self.silence_secs) {
            return Err(RuntimeError::InvalidConfig(
                "silence_secs must be between 0.0 and 5.0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(GenerationConfig::default().validate().is_ok());
        assert!(GenerationConfig::deterministic().validate().is_ok());
        assert!(SynthesisParams::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cfg = GenerationConfig { top_p: 0.0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(RuntimeError::InvalidConfig(_))));

        let cfg = GenerationConfig { temperature: 3.0, ..Default::default() };
        assert!(cfg.validate().is_err());

        let cfg = GenerationConfig { timeout_ms: 0, ..Default::default() };
        assert!(cfg.validate().is_err());

        let params = SynthesisParams { steps: 0, ..Default::default() };
        assert!(params.validate().is_err());
    }
}
