use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_SHELL: &str = "bash";
pub const DEFAULT_SKILLS_DIR: &str = "skills";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown provider '{0}' (expected gemini, openai, ollama or cmd)")]
    UnknownProvider(String),
    #[error("provider 'cmd' requires a custom command (SHREW_COMMAND)")]
    MissingCustomCommand,
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Language-model backend selected once at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Ollama,
    Command,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Command => "cmd",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini-3-flash-preview",
            ProviderKind::OpenAi => "gpt-4o",
            ProviderKind::Ollama => "qwen2.5-coder:7b",
            ProviderKind::Command => "custom",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "openai" => Ok(ProviderKind::OpenAi),
            "ollama" => Ok(ProviderKind::Ollama),
            "cmd" | "command" => Ok(ProviderKind::Command),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

/// On-disk configuration (`~/.shrew/config.json`). Every field is optional.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ollama_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_command: Option<String>,
}

impl ConfigFile {
    /// Load from an explicit path. A missing file is an error here.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from the default location; absence is not an error.
    pub fn load_default() -> Result<Option<Self>, ConfigError> {
        let path = default_config_path();
        if !path.exists() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }
}

/// Values supplied on the command line or through the environment. These win
/// over the config file.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_url: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub ollama_url: Option<String>,
    pub custom_command: Option<String>,
    pub shell: Option<String>,
    pub history_path: Option<PathBuf>,
    pub skills_dir: Option<PathBuf>,
}

/// Fully resolved runtime configuration, passed explicitly to every component.
#[derive(Clone, Debug)]
pub struct Config {
    pub provider: ProviderKind,
    pub model: String,
    pub api_url: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub ollama_url: String,
    pub custom_command: Option<String>,
    pub shell: String,
    pub history_path: PathBuf,
    pub skills_dir: PathBuf,
}

/// `~/.shrew`, falling back to the working directory when there is no home.
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".shrew")
}

pub fn default_config_path() -> PathBuf {
    data_dir().join("config.json")
}

pub fn default_history_path() -> PathBuf {
    data_dir().join("history.json")
}

/// Load `.env` from the working directory without overriding variables that
/// are already set.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("failed to load .env: {e}"),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Merge overrides over the config file over defaults.
    pub fn resolve(
        overrides: ConfigOverrides,
        file: Option<ConfigFile>,
    ) -> Result<Self, ConfigError> {
        let file = file.unwrap_or_default();
        let pick = |cli: Option<String>, from_file: Option<String>| {
            non_empty(cli).or_else(|| non_empty(from_file))
        };

        let gemini_api_key = pick(overrides.gemini_api_key, file.gemini_api_key);
        let openai_api_key = pick(overrides.openai_api_key, file.openai_api_key);

        let provider = match pick(overrides.provider, file.provider) {
            Some(name) => name.parse()?,
            None if gemini_api_key.is_some() => ProviderKind::Gemini,
            None if openai_api_key.is_some() => ProviderKind::OpenAi,
            None => ProviderKind::Ollama,
        };

        let custom_command = pick(overrides.custom_command, file.custom_command);
        if provider == ProviderKind::Command && custom_command.is_none() {
            return Err(ConfigError::MissingCustomCommand);
        }

        let model = pick(overrides.model, file.model)
            .unwrap_or_else(|| provider.default_model().to_string());

        Ok(Self {
            provider,
            model,
            api_url: pick(overrides.api_url, file.api_url),
            gemini_api_key,
            openai_api_key,
            ollama_url: pick(overrides.ollama_url, file.ollama_url)
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            custom_command,
            shell: non_empty(overrides.shell).unwrap_or_else(|| DEFAULT_SHELL.to_string()),
            history_path: overrides
                .history_path
                .unwrap_or_else(default_history_path),
            skills_dir: overrides
                .skills_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SKILLS_DIR)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_ollama_without_keys() {
        let cfg = Config::resolve(ConfigOverrides::default(), None).unwrap();
        assert_eq!(cfg.provider, ProviderKind::Ollama);
        assert_eq!(cfg.model, "qwen2.5-coder:7b");
        assert_eq!(cfg.ollama_url, DEFAULT_OLLAMA_URL);
        assert_eq!(cfg.shell, "bash");
    }

    #[test]
    fn gemini_key_selects_gemini() {
        let overrides = ConfigOverrides {
            gemini_api_key: Some("g".into()),
            openai_api_key: Some("o".into()),
            ..Default::default()
        };
        let cfg = Config::resolve(overrides, None).unwrap();
        assert_eq!(cfg.provider, ProviderKind::Gemini);
        assert_eq!(cfg.model, "gemini-3-flash-preview");
    }

    #[test]
    fn openai_key_from_file_selects_openai() {
        let file = ConfigFile {
            openai_api_key: Some("sk".into()),
            ..Default::default()
        };
        let cfg = Config::resolve(ConfigOverrides::default(), Some(file)).unwrap();
        assert_eq!(cfg.provider, ProviderKind::OpenAi);
        assert_eq!(cfg.model, "gpt-4o");
    }

    #[test]
    fn overrides_win_over_file() {
        let file = ConfigFile {
            provider: Some("gemini".into()),
            model: Some("from-file".into()),
            api_url: Some("http://file".into()),
            ..Default::default()
        };
        let overrides = ConfigOverrides {
            provider: Some("openai".into()),
            model: Some("from-cli".into()),
            ..Default::default()
        };
        let cfg = Config::resolve(overrides, Some(file)).unwrap();
        assert_eq!(cfg.provider, ProviderKind::OpenAi);
        assert_eq!(cfg.model, "from-cli");
        assert_eq!(cfg.api_url.as_deref(), Some("http://file"));
    }

    #[test]
    fn blank_override_falls_through_to_file() {
        let file = ConfigFile {
            model: Some("file-model".into()),
            ..Default::default()
        };
        let overrides = ConfigOverrides {
            model: Some("  ".into()),
            ..Default::default()
        };
        let cfg = Config::resolve(overrides, Some(file)).unwrap();
        assert_eq!(cfg.model, "file-model");
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let overrides = ConfigOverrides {
            provider: Some("bard".into()),
            ..Default::default()
        };
        let err = Config::resolve(overrides, None).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProvider(name) if name == "bard"));
    }

    #[test]
    fn command_provider_requires_command() {
        let overrides = ConfigOverrides {
            provider: Some("cmd".into()),
            ..Default::default()
        };
        assert!(matches!(
            Config::resolve(overrides, None),
            Err(ConfigError::MissingCustomCommand)
        ));
    }

    #[test]
    fn provider_names_parse() {
        assert_eq!("Gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert_eq!("command".parse::<ProviderKind>().unwrap(), ProviderKind::Command);
        assert_eq!(ProviderKind::Command.to_string(), "cmd");
    }

    #[test]
    fn config_file_parses_json_and_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        std::fs::write(&good, r#"{"provider":"ollama","ollama_url":"http://box:1"}"#).unwrap();
        let file = ConfigFile::load(&good).unwrap();
        assert_eq!(file.ollama_url.as_deref(), Some("http://box:1"));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        assert!(matches!(ConfigFile::load(&bad), Err(ConfigError::Json { .. })));

        let missing = dir.path().join("missing.json");
        assert!(matches!(ConfigFile::load(&missing), Err(ConfigError::Io { .. })));
    }
}
