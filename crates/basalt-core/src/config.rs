use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Top-level config (basalt.toml + BASALT_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasaltConfig {
    pub agent: AgentConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
}

impl Default for BasaltConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            workspace: WorkspaceConfig::default(),
            channel: ChannelConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model id used for the "small" variant (compaction, heartbeat checks).
    #[serde(default = "default_small_model")]
    pub small_model: String,
    /// Model id used for the "balanced" variant (default for new sessions).
    #[serde(default = "default_balanced_model")]
    pub balanced_model: String,
    /// Model id used for the "large" variant.
    #[serde(default = "default_large_model")]
    pub large_model: String,
    /// LLM provider API key. Overridden by `BASALT_LLM_API_KEY`.
    pub api_key: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            small_model: default_small_model(),
            balanced_model: default_balanced_model(),
            large_model: default_large_model(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "default_workspace_root")]
    pub root: String,
    /// Extra directories the Path Sandbox allows beyond the workspace root
    /// and the home directory. Overridden by `BASALT_ALLOWED_PATHS`.
    #[serde(default)]
    pub allowed_paths: Vec<String>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
            allowed_paths: Vec::new(),
        }
    }
}

impl WorkspaceConfig {
    pub fn path(&self, relative: &str) -> std::path::PathBuf {
        std::path::Path::new(&self.root).join(relative)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelConfig {
    /// Comma-separated in config; `BASALT_ALLOWED_CHATS` overrides at the
    /// env layer using the same split-on-`_` figment convention.
    #[serde(default)]
    pub allowed_chats: Vec<String>,
    /// Telegram bot token. Overridden by `BASALT_TELEGRAM_BOT_TOKEN`. Stored
    /// separately from `agent.api_key` since it authenticates a different
    /// service; see `secret set telegram-bot-token`.
    pub telegram_bot_token: Option<String>,
}

fn default_small_model() -> String {
    "claude-haiku-4-5".to_string()
}
fn default_balanced_model() -> String {
    "claude-sonnet-4-6".to_string()
}
fn default_large_model() -> String {
    "claude-opus-4-6".to_string()
}
fn default_workspace_root() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.basalt", home)
}
/// Runtime protocol version, reported by `/version` and `/health`.
pub const PROTOCOL_VERSION: &str = "1";

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.basalt/basalt.toml", home)
}

impl BasaltConfig {
    /// Load config from a TOML file with BASALT_* env var overrides.
    ///
    /// Checks, in order: an explicit path argument, then
    /// `~/.basalt/basalt.toml`. A missing file is not an error — every field
    /// has a default, so a bare environment can still start the runtime.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: BasaltConfig = Figment::from(figment::providers::Serialized::defaults(
            BasaltConfig::default(),
        ))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("BASALT_").split("_"))
        .extract()
        .map_err(|e| crate::error::BasaltError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Write this config to `path` as TOML, creating parent directories as
    /// needed. Used by the `secret set` CLI subcommand to persist a
    /// credential without requiring the operator to hand-edit the file.
    pub fn save(&self, path: &str) -> crate::error::Result<()> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body =
            toml::to_string_pretty(self).map_err(|e| crate::error::BasaltError::Config(e.to_string()))?;
        std::fs::write(path, body)?;
        Ok(())
    }
}

/// Default config file path: explicit path > `BASALT_CONFIG` env > this.
pub fn resolve_config_path(explicit: Option<&str>) -> String {
    explicit
        .map(String::from)
        .or_else(|| std::env::var("BASALT_CONFIG").ok())
        .unwrap_or_else(default_config_path)
}
