//! Command routing - maps one utterance to exactly one command
//!
//! Rules are plain substring tests evaluated in a fixed order; the first
//! match wins. The order is observable (an utterance can contain several
//! trigger phrases) so it must not change:
//! 1. Open site - "open <site>" without "play"
//! 2. Play video - "play" and "youtube"
//! 3. Tell time - "the time"
//! 4. Launch app - "open <app>"
//! 5. Generate - "using artificial intelligence"
//! 6. Quit - "jarvis quit", "exit", "quit"
//! 7. Reset chat - "reset chat"
//! 8. Chat, or unrecognized when chat is off

use crate::config::{AppEntry, Config, SiteEntry};

/// What the router decided to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    OpenSite { keyword: String, url: String },

    /// Search phrase, possibly empty after stripping the trigger words
    PlayVideo(String),

    TellTime,

    LaunchApp { keyword: String, target: String },

    /// The full utterance is the prompt
    Generate(String),

    Quit,

    ResetChat,

    Chat(String),

    Unrecognized,
}

type Matcher = Box<dyn Fn(&str) -> Option<Command>>;

struct Rule {
    name: &'static str,
    matcher: Matcher,
}

/// Ordered (predicate, command) rules
pub struct CommandRouter {
    rules: Vec<Rule>,
    chat_enabled: bool,
}

impl CommandRouter {
    pub fn new(config: &Config) -> Self {
        let rules = vec![
            Rule {
                name: "open-site",
                matcher: open_site(config.sites.clone()),
            },
            Rule {
                name: "play-video",
                matcher: Box::new(|text: &str| {
                    (text.contains("play") && text.contains("youtube"))
                        .then(|| Command::PlayVideo(video_query(text)))
                }),
            },
            Rule {
                name: "time",
                matcher: Box::new(|text: &str| text.contains("the time").then_some(Command::TellTime)),
            },
            Rule {
                name: "launch-app",
                matcher: launch_app(config.apps.clone()),
            },
            Rule {
                name: "generate",
                matcher: Box::new(|text: &str| {
                    text.contains("using artificial intelligence")
                        .then(|| Command::Generate(text.to_string()))
                }),
            },
            Rule {
                name: "quit",
                matcher: Box::new(|text: &str| {
                    (text.contains("jarvis quit") || text.contains("exit") || text.contains("quit"))
                        .then_some(Command::Quit)
                }),
            },
            Rule {
                name: "reset-chat",
                matcher: Box::new(|text: &str| text.contains("reset chat").then_some(Command::ResetChat)),
            },
        ];

        Self {
            rules,
            chat_enabled: config.chat.enabled,
        }
    }

    /// Route a normalized utterance
    pub fn route(&self, text: &str) -> Command {
        for rule in &self.rules {
            if let Some(command) = (rule.matcher)(text) {
                tracing::debug!(rule = rule.name, "matched");
                return command;
            }
        }

        if self.chat_enabled {
            Command::Chat(text.to_string())
        } else {
            Command::Unrecognized
        }
    }
}

fn open_site(sites: Vec<SiteEntry>) -> Matcher {
    Box::new(move |text: &str| {
        if text.contains("play") {
            return None;
        }
        sites
            .iter()
            .find(|site| text.contains(&format!("open {}", site.keyword)))
            .map(|site| Command::OpenSite {
                keyword: site.keyword.clone(),
                url: site.url.clone(),
            })
    })
}

fn launch_app(apps: Vec<AppEntry>) -> Matcher {
    Box::new(move |text: &str| {
        apps.iter()
            .find(|app| text.contains(&format!("open {}", app.keyword)))
            .map(|app| Command::LaunchApp {
                keyword: app.keyword.clone(),
                target: app.target.clone(),
            })
    })
}

/// Strip every "play" and "on youtube", then surrounding whitespace
pub fn video_query(text: &str) -> String {
    text.replace("play", "")
        .replace("on youtube", "")
        .trim()
        .to_string()
}

/// Full search address for a non-empty query
pub fn video_search_url(base: &str, query: &str) -> String {
    format!("{}{}", base, urlencoding::encode(query))
}
