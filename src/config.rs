use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_name")]
    pub name: String,
    /// Directory that receives generated-content files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Search results address; the percent-encoded query is appended
    #[serde(default = "default_video_search_url")]
    pub video_search_url: String,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    /// Site directory, checked in order
    #[serde(default = "default_sites")]
    pub sites: Vec<SiteEntry>,
    /// Launchable applications, checked in order
    #[serde(default = "default_apps")]
    pub apps: Vec<AppEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            output_dir: default_output_dir(),
            video_search_url: default_video_search_url(),
            speech: SpeechConfig::default(),
            chat: ChatConfig::default(),
            llm: LlmConfig::default(),
            sites: default_sites(),
            apps: default_apps(),
        }
    }
}

fn default_name() -> String {
    "Jarvis".into()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("Gemini")
}

fn default_video_search_url() -> String {
    "https://www.youtube.com/results?search_query=".into()
}

// ============================================================================
// Site directory / applications
// ============================================================================

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SiteEntry {
    pub keyword: String,
    pub url: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct AppEntry {
    pub keyword: String,
    /// Path or identifier handed to the platform launcher
    pub target: String,
}

fn site(keyword: &str, url: &str) -> SiteEntry {
    SiteEntry {
        keyword: keyword.into(),
        url: url.into(),
    }
}

fn default_sites() -> Vec<SiteEntry> {
    vec![
        site("youtube", "https://www.youtube.com"),
        site("wikipedia", "https://www.wikipedia.com"),
        site("google", "https://www.google.com"),
        site("gemini", "https://gemini.google.com/app?hl=en-IN"),
        site("chat gpt", "https://chatgpt.com/"),
        site("chatgpt", "https://chatgpt.com/"),
    ]
}

fn default_apps() -> Vec<AppEntry> {
    vec![
        AppEntry {
            keyword: "facetime".into(),
            target: "/System/Applications/FaceTime.app".into(),
        },
        AppEntry {
            keyword: "pass".into(),
            target: "/Applications/Passky.app".into(),
        },
    ]
}

// ============================================================================
// Speech / chat
// ============================================================================

#[derive(Debug, Deserialize, Clone)]
pub struct SpeechConfig {
    /// Listen on the microphone before falling back to typed input
    #[serde(default)]
    pub enabled: bool,
    /// How long to wait for speech to start
    #[serde(default = "default_listen_timeout")]
    pub listen_timeout_secs: u64,
    /// Ambient noise sampling window before each listen
    #[serde(default = "default_calibration_ms")]
    pub calibration_ms: u64,
    /// Hard cap on a single phrase
    #[serde(default = "default_max_phrase")]
    pub max_phrase_secs: u64,
    /// Parakeet model directory
    #[serde(default = "default_speech_model")]
    pub model: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_timeout_secs: default_listen_timeout(),
            calibration_ms: default_calibration_ms(),
            max_phrase_secs: default_max_phrase(),
            model: default_speech_model(),
        }
    }
}

fn default_listen_timeout() -> u64 {
    5
}

fn default_calibration_ms() -> u64 {
    1000
}

fn default_max_phrase() -> u64 {
    10
}

fn default_speech_model() -> String {
    "models/parakeet-tdt-0.6b-v3-int8".into()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// Unmatched utterances go to the model when set
    #[serde(default = "default_chat_enabled")]
    pub enabled: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: default_chat_enabled(),
        }
    }
}

fn default_chat_enabled() -> bool {
    true
}

// ============================================================================
// LLM Config
// ============================================================================

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "backend")]
pub enum LlmConfig {
    #[serde(rename = "gemini")]
    Gemini {
        #[serde(default = "default_gemini_model")]
        model: String,
        /// API key (supports ${ENV_VAR} syntax)
        #[serde(default = "default_gemini_api_key")]
        api_key: String,
    },
    #[serde(rename = "openai-compat")]
    OpenAiCompat {
        /// Base URL - can use preset or explicit URL
        #[serde(default)]
        base_url: String,
        /// Preset shortcuts: "lm_studio", "openai", "ollama"
        preset: Option<String>,
        model: String,
        /// API key (supports ${ENV_VAR} syntax)
        #[serde(default)]
        api_key: Option<String>,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    },
    #[serde(rename = "ollama")]
    Ollama {
        #[serde(default = "default_ollama_model")]
        model: String,
    },
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig::Gemini {
            model: default_gemini_model(),
            api_key: default_gemini_api_key(),
        }
    }
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".into()
}

fn default_gemini_api_key() -> String {
    "${gemini_api_key}".into()
}

fn default_ollama_model() -> String {
    "mistral:7b-instruct".into()
}

/// Expand ${VAR} to environment variable values. One pass: substituted
/// text is never scanned again, and an unclosed `${` is kept as written.
pub fn expand_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + len];
        result.push_str(&rest[..start]);
        match std::env::var(var_name) {
            Ok(value) => result.push_str(&value),
            Err(_) => warn!("environment variable '{}' not found", var_name),
        }
        rest = &rest[start + len + 1..];
    }

    result.push_str(rest);
    result
}

impl LlmConfig {
    /// Resolve preset to base_url if needed, and expand env vars in api keys
    pub fn resolve_presets(&mut self) {
        match self {
            LlmConfig::Gemini { api_key, .. } => {
                *api_key = expand_env_vars(api_key);
            }
            LlmConfig::OpenAiCompat {
                base_url,
                preset,
                api_key,
                ..
            } => {
                if base_url.is_empty() {
                    *base_url = match preset.as_deref() {
                        Some("lm_studio") | None => "http://localhost:1234/v1".to_string(),
                        Some("openai") => "https://api.openai.com/v1".to_string(),
                        Some("ollama") => "http://localhost:11434/v1".to_string(),
                        Some(other) => {
                            warn!("unknown preset '{}', using LM Studio default", other);
                            "http://localhost:1234/v1".to_string()
                        }
                    };
                }

                if let Some(key) = api_key {
                    *key = expand_env_vars(key);
                }
            }
            LlmConfig::Ollama { .. } => {}
        }
    }

    /// Short label for the startup banner
    pub fn describe(&self) -> String {
        match self {
            LlmConfig::Gemini { model, .. } => format!("Gemini ({})", model),
            LlmConfig::OpenAiCompat { model, base_url, .. } => {
                format!("OpenAI-compatible ({} @ {})", model, base_url)
            }
            LlmConfig::Ollama { model } => format!("Ollama ({})", model),
        }
    }
}

impl Config {
    /// Load from `path`, falling back to defaults when missing or invalid
    pub fn load(path: &Path) -> Self {
        let mut config = if path.exists() {
            match fs::read_to_string(path) {
                Ok(s) => Self::parse(&s).unwrap_or_else(|e| {
                    warn!("ignoring {}: {}", path.display(), e);
                    Config::default()
                }),
                Err(e) => {
                    warn!("cannot read {}: {}", path.display(), e);
                    Config::default()
                }
            }
        } else {
            Config::default()
        };

        config.llm.resolve_presets();
        config
    }

    pub fn parse(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}
