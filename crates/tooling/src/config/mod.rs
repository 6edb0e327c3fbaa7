//! Environment-driven configuration for every tunable in the spec's
//! Configuration table (§6), plus LLM provider connection settings.

pub mod env;

use llm::compression::CompressionConfig;
use llm::config::LlmClientConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub max_messages: usize,
    pub max_tool_content_length: usize,
    pub enable_context_compression: bool,
    pub max_context_tokens: usize,
    pub compression_threshold: f64,
    pub keep_initial_turns: usize,
    pub keep_recent_turns: usize,
    pub llm_timeout_secs: u64,
    pub llm_connect_timeout_secs: u64,
    pub workspace_path: String,
    pub max_concurrent_actors: usize,
    pub max_planner_retries: usize,
    pub max_actor_iterations: usize,
    pub log_format: String,
    pub log_level: String,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_messages: 20,
            max_tool_content_length: 50_000,
            enable_context_compression: false,
            max_context_tokens: 128_000,
            compression_threshold: 0.8,
            keep_initial_turns: 2,
            keep_recent_turns: 3,
            llm_timeout_secs: 180,
            llm_connect_timeout_secs: 30,
            workspace_path: "./workspace".to_string(),
            max_concurrent_actors: 5,
            max_planner_retries: 3,
            max_actor_iterations: 20,
            log_format: "pretty".to_string(),
            log_level: "info".to_string(),
            llm_api_key: String::new(),
            llm_base_url: "https://api.openai.com/v1".to_string(),
            llm_model: "gpt-4o".to_string(),
        }
    }
}

impl Config {
    /// Builds a `Config` from the process environment, falling back to the
    /// documented default for every variable that is unset or unparsable.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_messages: env::get_env_parse_or("MAX_MESSAGES", default.max_messages),
            max_tool_content_length: env::get_env_parse_or(
                "MAX_TOOL_CONTENT_LENGTH",
                default.max_tool_content_length,
            ),
            enable_context_compression: env::get_env_bool(
                "ENABLE_CONTEXT_COMPRESSION",
                default.enable_context_compression,
            ),
            max_context_tokens: env::get_env_parse_or("MAX_CONTEXT_TOKENS", default.max_context_tokens),
            compression_threshold: env::get_env_parse_or(
                "COMPRESSION_THRESHOLD",
                default.compression_threshold,
            ),
            keep_initial_turns: env::get_env_parse_or("KEEP_INITIAL_TURNS", default.keep_initial_turns),
            keep_recent_turns: env::get_env_parse_or("KEEP_RECENT_TURNS", default.keep_recent_turns),
            llm_timeout_secs: env::get_env_parse_or("LLM_TIMEOUT", default.llm_timeout_secs),
            llm_connect_timeout_secs: env::get_env_parse_or(
                "LLM_CONNECT_TIMEOUT",
                default.llm_connect_timeout_secs,
            ),
            workspace_path: env::get_env_or("WORKSPACE_PATH", &default.workspace_path),
            max_concurrent_actors: env::get_env_parse_or(
                "MAX_CONCURRENT_ACTORS",
                default.max_concurrent_actors,
            ),
            max_planner_retries: env::get_env_parse_or("MAX_PLANNER_RETRIES", default.max_planner_retries),
            max_actor_iterations: env::get_env_parse_or(
                "MAX_ACTOR_ITERATIONS",
                default.max_actor_iterations,
            ),
            log_format: env::get_env_or("LOG_FORMAT", &default.log_format),
            log_level: env::get_env_or("LOG_LEVEL", &default.log_level),
            llm_api_key: env::get_env_or("LLM_API_KEY", &default.llm_api_key),
            llm_base_url: env::get_env_or("LLM_BASE_URL", &default.llm_base_url),
            llm_model: env::get_env_or("LLM_MODEL", &default.llm_model),
        }
    }

    pub fn with_workspace_path(mut self, path: impl Into<String>) -> Self {
        self.workspace_path = path.into();
        self
    }

    pub fn with_max_concurrent_actors(mut self, n: usize) -> Self {
        self.max_concurrent_actors = n;
        self
    }

    /// Bound actually applied by the scheduler: `min(5, max_concurrent_actors)`.
    pub fn scheduler_cap(&self) -> usize {
        self.max_concurrent_actors.min(5)
    }

    pub fn compression_config(&self) -> CompressionConfig {
        CompressionConfig {
            max_context_tokens: self.max_context_tokens,
            compression_threshold: self.compression_threshold,
            keep_initial_turns: self.keep_initial_turns,
            keep_recent_turns: self.keep_recent_turns,
            enable_context_compression: self.enable_context_compression,
        }
    }

    pub fn llm_client_config(&self) -> LlmClientConfig {
        LlmClientConfig {
            max_messages: self.max_messages,
            max_tool_content_length: self.max_tool_content_length,
            compression: self.compression_config(),
            context_length_shrink_groups: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = Config::default();
        assert_eq!(config.max_messages, 20);
        assert_eq!(config.max_tool_content_length, 50_000);
        assert!(!config.enable_context_compression);
        assert_eq!(config.max_context_tokens, 128_000);
        assert_eq!(config.compression_threshold, 0.8);
        assert_eq!(config.keep_initial_turns, 2);
        assert_eq!(config.keep_recent_turns, 3);
        assert_eq!(config.llm_timeout_secs, 180);
    }

    #[test]
    fn scheduler_cap_never_exceeds_five() {
        let config = Config::default().with_max_concurrent_actors(100);
        assert_eq!(config.scheduler_cap(), 5);
    }

    #[test]
    fn scheduler_cap_respects_lower_configured_value() {
        let config = Config::default().with_max_concurrent_actors(2);
        assert_eq!(config.scheduler_cap(), 2);
    }

    #[test]
    fn builder_overrides_workspace_path() {
        let config = Config::default().with_workspace_path("/tmp/acolib");
        assert_eq!(config.workspace_path, "/tmp/acolib");
    }
}
