//! Configuration for the briefcast workflow.
//!
//! Sources (highest priority first):
//! 1. Environment variables (OPENAI_API_KEY, PTT_*, WHISPER_*, ...)
//! 2. Config file (.briefcast/config.yaml, searched upward from cwd,
//!    or an explicit --config path)
//! 3. Built-in defaults
//!
//! The result is one immutable `AppConfig` value resolved at process
//! start and passed into the pipeline constructor; the core never reads
//! ambient process state.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when mandatory configuration is missing or invalid. Fatal at
/// CLI/API entry points.
#[derive(Debug, Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(pub String);

/// Raw config file schema (matches YAML structure; every field optional).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub ptt: PttSection,
    #[serde(default)]
    pub whisper: WhisperSection,
    #[serde(default)]
    pub openai: OpenAiSection,
    #[serde(default)]
    pub prompt: PromptSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsSection {
    pub project_management_root: Option<String>,
    pub prompt_output_root: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PttSection {
    pub language: Option<String>,
    pub sample_rate: Option<u32>,
    pub chunk_duration_ms: Option<u32>,
    pub silence_threshold: Option<f64>,
    pub max_record_seconds: Option<u32>,
    pub hotkey: Option<String>,
    pub input_device: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhisperSection {
    pub binary_path: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiSection {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u32>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptSection {
    pub filename_pattern: Option<String>,
    pub metadata_filename: Option<String>,
}

/// Resolved filesystem locations used by the workflow.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectPaths {
    pub repository_root: PathBuf,
    pub project_management_root: PathBuf,
    pub prompt_output_root: PathBuf,
}

/// Microphone and hotkey settings for push-to-talk capture.
///
/// `silence_threshold` is carried for the capture backend but no silence
/// detection is performed; only `max_record_seconds` is enforced, after
/// the fact.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureSettings {
    pub language: String,
    pub sample_rate: u32,
    pub chunk_duration_ms: u32,
    pub silence_threshold: f64,
    pub max_record_seconds: u32,
    pub hotkey: String,
    pub input_device: Option<String>,
}

/// Local whisper transcription settings.
#[derive(Debug, Clone, Serialize)]
pub struct WhisperSettings {
    pub binary_path: String,
    pub model: String,
}

/// OpenAI client settings for prompt enhancement.
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiSettings {
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub base_url: Option<String>,
}

/// Settings that control how enhanced prompts are written to disk.
#[derive(Debug, Clone, Serialize)]
pub struct PromptSettings {
    pub filename_pattern: String,
    pub metadata_filename: String,
}

/// Aggregate configuration used by the workflow.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub paths: ProjectPaths,
    pub capture: CaptureSettings,
    pub whisper: WhisperSettings,
    pub openai: OpenAiSettings,
    pub prompt: PromptSettings,
}

/// Environment variable overrides, gathered once so resolution stays a
/// pure function (and testable without mutating the process environment).
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub home: Option<String>,
    pub project_management_root: Option<String>,
    pub prompt_output_root: Option<String>,
    pub language: Option<String>,
    pub sample_rate: Option<String>,
    pub chunk_duration_ms: Option<String>,
    pub silence_threshold: Option<String>,
    pub max_record_seconds: Option<String>,
    pub hotkey: Option<String>,
    pub input_device: Option<String>,
    pub whisper_path: Option<String>,
    pub whisper_model: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub openai_temperature: Option<String>,
    pub openai_max_output_tokens: Option<String>,
    pub openai_base_url: Option<String>,
    pub filename_pattern: Option<String>,
    pub metadata_filename: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let var = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            home: var("BRIEFCAST_HOME"),
            project_management_root: var("PROJECT_MANAGEMENT_ROOT"),
            prompt_output_root: var("PTT_OUTPUT_ROOT"),
            language: var("PTT_LANGUAGE"),
            sample_rate: var("PTT_SAMPLE_RATE"),
            chunk_duration_ms: var("PTT_CHUNK_DURATION_MS"),
            silence_threshold: var("PTT_SILENCE_THRESHOLD"),
            max_record_seconds: var("PTT_MAX_RECORD_SECONDS"),
            hotkey: var("PTT_HOTKEY"),
            input_device: var("PTT_INPUT_DEVICE"),
            whisper_path: var("WHISPER_PATH"),
            whisper_model: var("WHISPER_MODEL"),
            openai_api_key: var("OPENAI_API_KEY"),
            openai_model: var("OPENAI_MODEL"),
            openai_temperature: var("OPENAI_TEMPERATURE"),
            openai_max_output_tokens: var("OPENAI_MAX_OUTPUT_TOKENS"),
            openai_base_url: var("OPENAI_BASE_URL"),
            filename_pattern: var("PTT_PROMPT_FILENAME_PATTERN"),
            metadata_filename: var("PTT_PROMPT_METADATA_FILENAME"),
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources.
    ///
    /// An explicit `config_path` is loaded strictly (missing file is an
    /// error); otherwise `.briefcast/config.yaml` is searched upward from
    /// the current directory and loaded if present.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let file = match config_path {
            Some(path) => load_config_file(path)?,
            None => match find_config_file() {
                Some(path) => load_config_file(&path)?,
                None => ConfigFile::default(),
            },
        };
        let env = EnvOverrides::from_env();
        Self::resolve(&file, &env)
    }

    /// Resolve a config file plus environment overrides into final values.
    pub fn resolve(file: &ConfigFile, env: &EnvOverrides) -> Result<Self> {
        let base_dir = match &env.home {
            Some(home) => PathBuf::from(home),
            None => env::current_dir().context("failed to determine working directory")?,
        };

        let project_management_root = env
            .project_management_root
            .as_deref()
            .or(file.paths.project_management_root.as_deref())
            .map(PathBuf::from)
            .unwrap_or_else(|| base_dir.join("project-management"));
        let prompt_output_root = env
            .prompt_output_root
            .as_deref()
            .or(file.paths.prompt_output_root.as_deref())
            .map(PathBuf::from)
            .unwrap_or_else(|| base_dir.join("outputs").join("prompts"));

        let api_key = env
            .openai_api_key
            .clone()
            .or_else(|| file.openai.api_key.clone())
            .ok_or_else(|| {
                ConfigError(
                    "OPENAI_API_KEY is not set; provide it via environment or config file"
                        .to_string(),
                )
            })?;

        Ok(Self {
            paths: ProjectPaths {
                repository_root: base_dir,
                project_management_root,
                prompt_output_root,
            },
            capture: CaptureSettings {
                language: pick_string(&env.language, &file.ptt.language, "en"),
                sample_rate: pick_parsed(&env.sample_rate, file.ptt.sample_rate, 16_000)?,
                chunk_duration_ms: pick_parsed(&env.chunk_duration_ms, file.ptt.chunk_duration_ms, 64)?,
                silence_threshold: pick_parsed(
                    &env.silence_threshold,
                    file.ptt.silence_threshold,
                    0.015,
                )?,
                max_record_seconds: pick_parsed(
                    &env.max_record_seconds,
                    file.ptt.max_record_seconds,
                    120,
                )?,
                hotkey: pick_string(&env.hotkey, &file.ptt.hotkey, "space"),
                input_device: env.input_device.clone().or_else(|| file.ptt.input_device.clone()),
            },
            whisper: WhisperSettings {
                binary_path: pick_string(&env.whisper_path, &file.whisper.binary_path, "whisper"),
                model: pick_string(&env.whisper_model, &file.whisper.model, "base"),
            },
            openai: OpenAiSettings {
                api_key,
                model: pick_string(&env.openai_model, &file.openai.model, "gpt-4o-mini"),
                temperature: pick_parsed(&env.openai_temperature, file.openai.temperature, 0.2)?,
                max_output_tokens: pick_parsed(
                    &env.openai_max_output_tokens,
                    file.openai.max_output_tokens,
                    1800,
                )?,
                base_url: env.openai_base_url.clone().or_else(|| file.openai.base_url.clone()),
            },
            prompt: PromptSettings {
                filename_pattern: pick_string(
                    &env.filename_pattern,
                    &file.prompt.filename_pattern,
                    "{story_id}_enhanced-prompt.md",
                ),
                metadata_filename: pick_string(
                    &env.metadata_filename,
                    &file.prompt.metadata_filename,
                    "prompt-metadata.json",
                ),
            },
        })
    }

    /// Dump the resolved configuration (API key redacted) for inspection.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize configuration")
    }
}

fn pick_string(env: &Option<String>, file: &Option<String>, default: &str) -> String {
    env.clone()
        .or_else(|| file.clone())
        .unwrap_or_else(|| default.to_string())
}

fn pick_parsed<T>(env: &Option<String>, file: Option<T>, default: T) -> Result<T>
where
    T: std::str::FromStr + Copy,
    T::Err: std::fmt::Display,
{
    match env {
        Some(raw) => raw.parse::<T>().map_err(|e| {
            ConfigError(format!("invalid value {:?}: {}", raw, e)).into()
        }),
        None => Ok(file.unwrap_or(default)),
    }
}

/// Find the config file by searching the current directory and parents.
fn find_config_file() -> Option<PathBuf> {
    let mut current = env::current_dir().ok()?;
    loop {
        let candidate = current.join(".briefcast").join("config.yaml");
        if candidate.exists() {
            return Some(candidate);
        }
        if !current.pop() {
            break;
        }
    }
    None
}

fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with_key() -> EnvOverrides {
        EnvOverrides {
            openai_api_key: Some("test-key".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn resolve_uses_defaults_without_file_values() {
        let config = AppConfig::resolve(&ConfigFile::default(), &env_with_key()).unwrap();
        assert_eq!(config.capture.language, "en");
        assert_eq!(config.capture.sample_rate, 16_000);
        assert_eq!(config.capture.max_record_seconds, 120);
        assert_eq!(config.capture.hotkey, "space");
        assert_eq!(config.prompt.filename_pattern, "{story_id}_enhanced-prompt.md");
        assert_eq!(config.prompt.metadata_filename, "prompt-metadata.json");
        assert!(config
            .paths
            .prompt_output_root
            .ends_with(Path::new("outputs/prompts")));
    }

    #[test]
    fn resolve_requires_api_key() {
        let err = AppConfig::resolve(&ConfigFile::default(), &EnvOverrides::default()).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn env_overrides_win_over_file() {
        let file: ConfigFile = serde_yaml::from_str(
            r#"
ptt:
  language: de
  max_record_seconds: 30
openai:
  model: gpt-4o
"#,
        )
        .unwrap();
        let mut env = env_with_key();
        env.language = Some("fr".to_string());
        let config = AppConfig::resolve(&file, &env).unwrap();
        assert_eq!(config.capture.language, "fr");
        assert_eq!(config.capture.max_record_seconds, 30);
        assert_eq!(config.openai.model, "gpt-4o");
    }

    #[test]
    fn invalid_numeric_env_is_rejected() {
        let mut env = env_with_key();
        env.sample_rate = Some("not-a-number".to_string());
        let err = AppConfig::resolve(&ConfigFile::default(), &env).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn home_override_anchors_relative_roots() {
        let mut env = env_with_key();
        env.home = Some("/srv/briefcast".to_string());
        let config = AppConfig::resolve(&ConfigFile::default(), &env).unwrap();
        assert_eq!(
            config.paths.project_management_root,
            PathBuf::from("/srv/briefcast/project-management")
        );
    }

    #[test]
    fn config_file_parses_all_sections() {
        let file: ConfigFile = serde_yaml::from_str(
            r#"
paths:
  prompt_output_root: /tmp/prompts
ptt:
  hotkey: f8
whisper:
  model: medium
prompt:
  filename_pattern: "{story_id}.md"
"#,
        )
        .unwrap();
        assert_eq!(file.paths.prompt_output_root.as_deref(), Some("/tmp/prompts"));
        assert_eq!(file.ptt.hotkey.as_deref(), Some("f8"));
        assert_eq!(file.whisper.model.as_deref(), Some("medium"));
        assert_eq!(file.prompt.filename_pattern.as_deref(), Some("{story_id}.md"));
    }
}
