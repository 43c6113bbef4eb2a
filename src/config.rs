//! Environment-driven server configuration

use crate::state_machine::{SessionRules, TerminationPolicy};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MAX_TURNS: usize = 7;
pub const DEFAULT_COLLABORATOR_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LLM_MODEL: &str = "gpt-4-turbo";
pub const DEFAULT_LLM_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

pub const DEFAULT_INTERVIEW_TYPES: &[&str] = &[
    "software_engineer",
    "backend",
    "frontend",
    "fullstack",
    "data_scientist",
    "devops",
    "product_manager",
];
pub const DEFAULT_LEVELS: &[&str] = &["junior", "mid", "senior"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got `{value}`")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// LLM collaborator settings, present only when an API key is configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub termination: TerminationPolicy,
    /// `None` disables the collaborator timeout
    pub collaborator_timeout: Option<Duration>,
    pub interview_types: Vec<String>,
    pub levels: Vec<String>,
    pub question_bank_dir: Option<PathBuf>,
    pub question_seed: Option<u64>,
    pub llm: Option<LlmSettings>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            termination: TerminationPolicy::MaxTurns(DEFAULT_MAX_TURNS),
            collaborator_timeout: Some(Duration::from_secs(DEFAULT_COLLABORATOR_TIMEOUT_SECS)),
            interview_types: to_strings(DEFAULT_INTERVIEW_TYPES),
            levels: to_strings(DEFAULT_LEVELS),
            question_bank_dir: None,
            question_seed: None,
            llm: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = parse_var(&get, "INTERVIEW_PORT", "a port number")?.unwrap_or(defaults.port);

        let termination = match parse_var::<usize>(&get, "INTERVIEW_MAX_TURNS", "a non-negative integer")? {
            Some(0) => TerminationPolicy::UntilExhausted,
            Some(max) => TerminationPolicy::MaxTurns(max),
            None => defaults.termination,
        };

        let collaborator_timeout = match parse_var::<u64>(
            &get,
            "INTERVIEW_COLLABORATOR_TIMEOUT_SECS",
            "a whole number of seconds",
        )? {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.collaborator_timeout,
        };

        let interview_types = get("INTERVIEW_TYPES").map_or(defaults.interview_types, |v| split_list(&v));
        let levels = get("INTERVIEW_LEVELS").map_or(defaults.levels, |v| split_list(&v));

        let question_seed = parse_var(&get, "INTERVIEW_QUESTION_SEED", "an unsigned integer")?;

        let llm = get("OPENAI_API_KEY").map(|api_key| LlmSettings {
            api_key: api_key.trim().to_string(),
            model: get("INTERVIEW_LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            endpoint: get("INTERVIEW_LLM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_LLM_ENDPOINT.to_string()),
        });

        Ok(Self {
            port,
            termination,
            collaborator_timeout,
            interview_types,
            levels,
            question_bank_dir: get("INTERVIEW_QUESTION_BANK_DIR").map(PathBuf::from),
            question_seed,
            llm,
        })
    }

    /// Rules shared by every session; `extra_types` come from loaded
    /// question banks.
    pub fn session_rules(&self, extra_types: impl IntoIterator<Item = String>) -> SessionRules {
        SessionRules::new(
            self.interview_types.iter().cloned().chain(extra_types),
            &self.levels,
            self.termination,
        )
    }
}

fn parse_var<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    get(var)
        .map(|value| {
            value.trim().parse().map_err(|_| ConfigError::Invalid {
                var,
                expected,
                value,
            })
        })
        .transpose()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}
