use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{PilotError, PilotResult};

const PLACEHOLDER_API_KEY: &str = "your_hugging_face_api_key_here";
const MAX_STEP_BUDGET: u32 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    /// Keyword (matched against the task instruction) to Android package name.
    #[serde(default = "default_apps")]
    pub apps: BTreeMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            vision: VisionConfig::default(),
            device: DeviceConfig::default(),
            agent: AgentConfig::default(),
            apps: default_apps(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Falls back to the `HUGGINGFACE_API_TOKEN` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Longest edge of the image sent to the model.
    #[serde(default = "default_max_image_dimension")]
    pub max_image_dimension: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout(),
            max_image_dimension: default_max_image_dimension(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_adb_path")]
    pub adb_path: String,
    /// Device serial; the first attached device is used when absent.
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_capture_attempts")]
    pub capture_attempts: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Pause after tap / type / scroll so the UI can settle.
    #[serde(default = "default_settle")]
    pub settle_ms: u64,
    #[serde(default = "default_launch_settle")]
    pub launch_settle_ms: u64,
    #[serde(default = "default_screen_width")]
    pub screen_width: i32,
    #[serde(default = "default_screen_height")]
    pub screen_height: i32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            adb_path: default_adb_path(),
            serial: None,
            command_timeout_secs: default_command_timeout(),
            capture_attempts: default_capture_attempts(),
            retry_delay_ms: default_retry_delay(),
            settle_ms: default_settle(),
            launch_settle_ms: default_launch_settle(),
            screen_width: default_screen_width(),
            screen_height: default_screen_height(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Step budget for one task.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// Repetition threshold of the loop guard.
    #[serde(default = "default_max_repetitions")]
    pub max_action_repetitions: usize,
    /// Denominator shown to the model as "Step: n/cap". Independent of `max_steps`.
    #[serde(default = "default_prompt_step_cap")]
    pub prompt_step_cap: u32,
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,
    #[serde(default = "default_ui_dump_dir")]
    pub ui_dump_dir: PathBuf,
    #[serde(default)]
    pub debug_logging: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_action_repetitions: default_max_repetitions(),
            prompt_step_cap: default_prompt_step_cap(),
            screenshot_dir: default_screenshot_dir(),
            ui_dump_dir: default_ui_dump_dir(),
            debug_logging: false,
        }
    }
}

fn default_api_base() -> String {
    "https://router.huggingface.co/v1/chat/completions".into()
}

fn default_model() -> String {
    "Qwen/Qwen2.5-VL-32B-Instruct".into()
}

fn default_temperature() -> f64 {
    0.2
}

fn default_max_tokens() -> u32 {
    300
}

fn default_request_timeout() -> u64 {
    35
}

fn default_max_image_dimension() -> u32 {
    1024
}

fn default_jpeg_quality() -> u8 {
    85
}

fn default_adb_path() -> String {
    "adb".into()
}

fn default_command_timeout() -> u64 {
    15
}

fn default_capture_attempts() -> u32 {
    2
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_settle() -> u64 {
    2000
}

fn default_launch_settle() -> u64 {
    5000
}

fn default_screen_width() -> i32 {
    1080
}

fn default_screen_height() -> i32 {
    1920
}

fn default_max_steps() -> u32 {
    20
}

fn default_max_repetitions() -> usize {
    2
}

fn default_prompt_step_cap() -> u32 {
    15
}

fn default_screenshot_dir() -> PathBuf {
    PathBuf::from("device_screenshots")
}

fn default_ui_dump_dir() -> PathBuf {
    PathBuf::from("ui_hierarchy_dumps")
}

fn default_apps() -> BTreeMap<String, String> {
    [
        ("flipkart", "com.flipkart.android"),
        ("amazon", "in.amazon.mShop.android.shopping"),
        ("blinkit", "com.grofers.customerapp"),
        ("zomato", "com.application.zomato"),
        ("ola", "com.olacabs.customer"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl AppConfig {
    /// Fails on the first invalid setting. This is the only fatal error class.
    pub fn validate(&self) -> PilotResult<()> {
        match self.vision.api_key.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(PilotError::Config(
                    "vision API key missing: set HUGGINGFACE_API_TOKEN or [vision].api_key".into(),
                ))
            }
            Some(PLACEHOLDER_API_KEY) => {
                return Err(PilotError::Config(
                    "vision API key is still the placeholder value".into(),
                ))
            }
            Some(_) => {}
        }
        if self.agent.max_steps < 1 || self.agent.max_steps > MAX_STEP_BUDGET {
            return Err(PilotError::Config(format!(
                "max_steps must be between 1 and {MAX_STEP_BUDGET}, got {}",
                self.agent.max_steps
            )));
        }
        if self.agent.max_action_repetitions == 0 {
            return Err(PilotError::Config("max_action_repetitions must be at least 1".into()));
        }
        if !(1..=100).contains(&self.vision.jpeg_quality) {
            return Err(PilotError::Config(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.vision.jpeg_quality
            )));
        }
        if self.vision.max_image_dimension == 0 {
            return Err(PilotError::Config("max_image_dimension must be positive".into()));
        }
        Ok(())
    }

    /// Applies the environment overrides the agent has always honoured.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> PilotResult<()> {
        if let Some(token) = lookup("HUGGINGFACE_API_TOKEN").filter(|t| !t.trim().is_empty()) {
            self.vision.api_key = Some(token);
        }
        if let Some(serial) = lookup("TARGET_ANDROID_DEVICE_ID").filter(|s| !s.trim().is_empty()) {
            self.device.serial = Some(serial);
        }
        if let Some(v) = lookup("MAXIMUM_EXECUTION_STEPS") {
            self.agent.max_steps = parse_env("MAXIMUM_EXECUTION_STEPS", &v)?;
        }
        if let Some(v) = lookup("MAXIMUM_ACTION_REPETITIONS") {
            self.agent.max_action_repetitions = parse_env("MAXIMUM_ACTION_REPETITIONS", &v)?;
        }
        if let Some(v) = lookup("SCREENSHOT_COMPRESSION_QUALITY") {
            self.vision.jpeg_quality = parse_env("SCREENSHOT_COMPRESSION_QUALITY", &v)?;
        }
        if let Some(v) = lookup("DEBUG_LOGGING_ENABLED") {
            self.agent.debug_logging = v.trim().eq_ignore_ascii_case("true");
        }
        Ok(())
    }

    /// Logs the effective configuration with the secret masked.
    pub fn log_summary(&self) {
        tracing::info!(
            api_key = if self.vision.api_key.is_some() { "set" } else { "missing" },
            model = %self.vision.model,
            device = self.device.serial.as_deref().unwrap_or("auto-detect"),
            max_steps = self.agent.max_steps,
            max_action_repetitions = self.agent.max_action_repetitions,
            jpeg_quality = self.vision.jpeg_quality,
            screenshot_dir = %self.agent.screenshot_dir.display(),
            ui_dump_dir = %self.agent.ui_dump_dir.display(),
            "effective configuration"
        );
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> PilotResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PilotError::Config(format!("{name} has an invalid value: {value:?}")))
}

fn resolve_config_path() -> PilotResult<Option<PathBuf>> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(Some(candidate));
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(Some(candidate));
    }

    if let Some(dir) = dirs::config_dir() {
        let candidate = dir.join("droidpilot").join("config.toml");
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in user config dir");
            return Ok(Some(candidate));
        }
    }

    Ok(None)
}

/// Loads `config.toml` (explicit path first, then the usual locations,
/// else built-in defaults), applies environment overrides and validates.
pub fn load_config(explicit: Option<&Path>) -> PilotResult<AppConfig> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => resolve_config_path()?,
    };

    let mut config = match &path {
        Some(p) => {
            let content = std::fs::read_to_string(p)?;
            let config: AppConfig = toml::from_str(&content)?;
            tracing::info!(path = %p.display(), "config loaded");
            config
        }
        None => {
            tracing::info!("no config.toml found; using defaults");
            AppConfig::default()
        }
    };

    config.apply_env(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn valid() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.vision.api_key = Some("hf_test".into());
        cfg
    }

    #[test]
    fn defaults_are_valid_once_key_is_set() {
        let cfg = valid();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.agent.max_steps, 20);
        assert_eq!(cfg.agent.max_action_repetitions, 2);
        assert_eq!(cfg.agent.prompt_step_cap, 15);
        assert_eq!(cfg.apps.get("blinkit").map(String::as_str), Some("com.grofers.customerapp"));
    }

    #[test]
    fn missing_or_placeholder_key_is_fatal() {
        let mut cfg = valid();
        cfg.vision.api_key = None;
        assert!(matches!(cfg.validate(), Err(PilotError::Config(_))));

        cfg.vision.api_key = Some(PLACEHOLDER_API_KEY.into());
        assert!(matches!(cfg.validate(), Err(PilotError::Config(_))));
    }

    #[test]
    fn step_budget_range_is_enforced() {
        let mut cfg = valid();
        cfg.agent.max_steps = 0;
        assert!(cfg.validate().is_err());
        cfg.agent.max_steps = 51;
        assert!(cfg.validate().is_err());
        cfg.agent.max_steps = 50;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("HUGGINGFACE_API_TOKEN", "hf_env"),
            ("MAXIMUM_EXECUTION_STEPS", "7"),
            ("MAXIMUM_ACTION_REPETITIONS", "3"),
            ("DEBUG_LOGGING_ENABLED", "TRUE"),
        ]
        .into_iter()
        .collect();
        let mut cfg = AppConfig::default();
        cfg.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.vision.api_key.as_deref(), Some("hf_env"));
        assert_eq!(cfg.agent.max_steps, 7);
        assert_eq!(cfg.agent.max_action_repetitions, 3);
        assert!(cfg.agent.debug_logging);
    }

    #[test]
    fn bad_env_number_is_a_config_error() {
        let mut cfg = AppConfig::default();
        let err = cfg
            .apply_env(|k| (k == "MAXIMUM_EXECUTION_STEPS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, PilotError::Config(_)));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [vision]
            api_base = "http://localhost:8080/v1/chat/completions"
            model = "local-vl"

            [agent]
            max_steps = 12
            "#,
        )
        .unwrap();
        assert_eq!(cfg.vision.max_tokens, 300);
        assert_eq!(cfg.agent.max_steps, 12);
        assert_eq!(cfg.device.adb_path, "adb");
        assert!(cfg.apps.contains_key("amazon"));
    }

    #[test]
    fn vision_section_may_omit_endpoint_and_model() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [vision]
            api_key = "hf_abc"
            temperature = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.vision.api_base, VisionConfig::default().api_base);
        assert_eq!(cfg.vision.model, "Qwen/Qwen2.5-VL-32B-Instruct");
        assert_eq!(cfg.vision.api_key.as_deref(), Some("hf_abc"));
        assert_eq!(cfg.vision.temperature, 0.5);
    }
}
