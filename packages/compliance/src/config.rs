use std::str::FromStr;
use std::time::Duration;

use crate::error::{ComplianceError, Result};
use crate::merge::BuildingInfoPolicy;
use crate::section::AnalysisMode;

const DEFAULT_API_BASE_URL: &str = "https://openrouter.ai/api";
const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-exp:free";
const DEFAULT_SITE_URL: &str = "http://localhost:3000";
const DEFAULT_SITE_NAME: &str = "PCCC Demo";

/// Process-wide configuration for the analysis pipeline.
///
/// Loaded once at startup and never mutated afterwards.
///
/// NOTE: Do NOT derive `Debug` here, `api_key` would end up in logs.
#[derive(Clone)]
pub struct ComplianceConfig {
    pub api_key: String,
    pub api_base_url: String,
    pub model: String,
    pub site_url: String,
    pub site_name: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub mode: AnalysisMode,
    pub analysis_timeout_secs: u64,
    pub building_info_policy: BuildingInfoPolicy,
}

impl ComplianceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPEN_ROUTER_API_KEY")
            .map_err(|_| ComplianceError::Config("OPEN_ROUTER_API_KEY not set".into()))?;

        let api_base_url =
            std::env::var("LLM_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.into());

        let model = std::env::var("MODEL_ID").unwrap_or_else(|_| DEFAULT_MODEL.into());

        let site_url = std::env::var("SITE_URL").unwrap_or_else(|_| DEFAULT_SITE_URL.into());

        let site_name = std::env::var("SITE_NAME").unwrap_or_else(|_| DEFAULT_SITE_NAME.into());

        let temperature = std::env::var("LLM_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.2);

        let max_tokens = std::env::var("LLM_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4096);

        let timeout_secs = std::env::var("LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        let max_attempts = std::env::var("LLM_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(2)
            .max(1);

        let mode = match std::env::var("ANALYSIS_MODE") {
            Ok(v) => AnalysisMode::from_str(&v)
                .map_err(|_| ComplianceError::Config(format!("unknown ANALYSIS_MODE: {v}")))?,
            Err(_) => AnalysisMode::default(),
        };

        let analysis_timeout_secs = std::env::var("ANALYSIS_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(90);

        let building_info_policy = match std::env::var("BUILDING_INFO_POLICY") {
            Ok(v) => BuildingInfoPolicy::from_str(&v).map_err(|_| {
                ComplianceError::Config(format!("unknown BUILDING_INFO_POLICY: {v}"))
            })?,
            Err(_) => BuildingInfoPolicy::default(),
        };

        Ok(Self {
            api_key,
            api_base_url,
            model,
            site_url,
            site_name,
            temperature,
            max_tokens,
            timeout_secs,
            max_attempts,
            mode,
            analysis_timeout_secs,
            building_info_policy,
        })
    }

    /// Create a config builder for testing.
    pub fn builder(api_key: impl Into<String>) -> ComplianceConfigBuilder {
        ComplianceConfigBuilder {
            config: ComplianceConfig {
                api_key: api_key.into(),
                api_base_url: DEFAULT_API_BASE_URL.into(),
                model: DEFAULT_MODEL.into(),
                site_url: DEFAULT_SITE_URL.into(),
                site_name: DEFAULT_SITE_NAME.into(),
                temperature: 0.2,
                max_tokens: 4096,
                timeout_secs: 60,
                max_attempts: 2,
                mode: AnalysisMode::default(),
                analysis_timeout_secs: 90,
                building_info_policy: BuildingInfoPolicy::default(),
            },
        }
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_secs(self.analysis_timeout_secs)
    }
}

/// Builder for constructing `ComplianceConfig` in tests.
pub struct ComplianceConfigBuilder {
    config: ComplianceConfig,
}

impl ComplianceConfigBuilder {
    pub fn api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.config.api_base_url = api_base_url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn site(mut self, url: impl Into<String>, name: impl Into<String>) -> Self {
        self.config.site_url = url.into();
        self.config.site_name = name.into();
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.config.timeout_secs = timeout_secs;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = max_attempts.max(1);
        self
    }

    pub fn mode(mut self, mode: AnalysisMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn analysis_timeout_secs(mut self, secs: u64) -> Self {
        self.config.analysis_timeout_secs = secs;
        self
    }

    pub fn building_info_policy(mut self, policy: BuildingInfoPolicy) -> Self {
        self.config.building_info_policy = policy;
        self
    }

    pub fn build(self) -> ComplianceConfig {
        self.config
    }
}
