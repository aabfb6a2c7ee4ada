//! Command handlers - one side effect per routed command
//!
//! Every failure is reported on the console and swallowed here; only
//! `Command::Quit` stops the loop.

use crate::chat::{self, Transcript};
use crate::command::{self, Command, CommandRouter};
use crate::config::Config;
use crate::generate;
use crate::launcher::Launcher;
use crate::llm::LanguageModel;
use chrono::Local;
use std::fmt::Display;
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;

/// Whether the main loop should read another utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Assistant<W: Write> {
    name: String,
    router: CommandRouter,
    launcher: Box<dyn Launcher>,
    model: Option<Box<dyn LanguageModel>>,
    output_dir: PathBuf,
    video_search_url: String,
    out: W,
}

impl<W: Write> Assistant<W> {
    pub fn new(
        config: &Config,
        launcher: Box<dyn Launcher>,
        model: Option<Box<dyn LanguageModel>>,
        out: W,
    ) -> Self {
        Self {
            name: config.name.clone(),
            router: CommandRouter::new(config),
            launcher,
            model,
            output_dir: config.output_dir.clone(),
            video_search_url: config.video_search_url.clone(),
            out,
        }
    }

    /// Route and run one utterance
    pub fn handle(&mut self, utterance: &str, transcript: &mut Transcript) -> Flow {
        let command = self.router.route(utterance);
        self.execute(command, transcript)
    }

    pub fn execute(&mut self, command: Command, transcript: &mut Transcript) -> Flow {
        match command {
            Command::OpenSite { keyword, url } => {
                self.say(format_args!("Opening {}...", keyword));
                self.open_url(&url);
            }
            Command::PlayVideo(query) => self.play_video(&query),
            Command::TellTime => {
                self.say(format_args!("The time is {}", current_time()));
            }
            Command::LaunchApp { keyword, target } => {
                if let Err(e) = self.launcher.launch(&target) {
                    warn!("{}", e);
                    self.say(format_args!("Could not open {}: {}", keyword, e));
                }
            }
            Command::Generate(prompt) => self.generate(&prompt),
            Command::Quit => {
                self.say("Goodbye!");
                return Flow::Exit;
            }
            Command::ResetChat => {
                transcript.clear();
                self.say("Chat history reset.");
            }
            Command::Chat(query) => {
                let reply = chat::respond(&query, self.model.as_deref(), transcript);
                let line = format!("{}: {}", self.name, reply);
                self.say(line);
            }
            Command::Unrecognized => {
                self.say("Command not recognized. Chatbot is disabled.");
            }
        }
        Flow::Continue
    }

    fn play_video(&mut self, query: &str) {
        if query.is_empty() {
            self.say("No valid search query detected.");
            return;
        }
        self.say(format_args!("Searching YouTube for: {}", query));
        let url = command::video_search_url(&self.video_search_url, query);
        self.open_url(&url);
    }

    fn generate(&mut self, prompt: &str) {
        let Some(model) = self.model.as_deref() else {
            self.say("AI model not available.");
            return;
        };
        match generate::save(model, prompt, &self.output_dir) {
            Ok(path) => self.say(format_args!("Response saved to {}", path.display())),
            Err(e) => self.say(format_args!("Error fetching AI response: {}", e)),
        }
    }

    fn open_url(&mut self, url: &str) {
        if let Err(e) = self.launcher.open_url(url) {
            warn!("{}", e);
            self.say(format_args!("Could not open browser: {}", e));
        }
    }

    /// Console line; a broken stdout is not worth stopping for
    fn say(&mut self, msg: impl Display) {
        let _ = writeln!(self.out, "{}", msg);
    }
}

/// Zero-padded 24-hour local time
pub fn current_time() -> String {
    Local::now().format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Speaker;
    use crate::chat::tests::FakeModel;
    use crate::error::LaunchError;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct FakeLauncher {
        opened: Arc<Mutex<Vec<String>>>,
        launched: Arc<Mutex<Vec<String>>>,
        fail_launch: bool,
    }

    impl Launcher for FakeLauncher {
        fn open_url(&self, url: &str) -> Result<(), LaunchError> {
            self.opened.lock().unwrap().push(url.to_string());
            Ok(())
        }

        fn launch(&self, target: &str) -> Result<(), LaunchError> {
            self.launched.lock().unwrap().push(target.to_string());
            if self.fail_launch {
                return Err(LaunchError::Open {
                    target: target.to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            Ok(())
        }
    }

    struct Harness {
        assistant: Assistant<Vec<u8>>,
        launcher: FakeLauncher,
        transcript: Transcript,
    }

    impl Harness {
        fn new(config: &Config, model: Option<FakeModel>) -> Self {
            let launcher = FakeLauncher::default();
            let model = model.map(|m| Box::new(m) as Box<dyn LanguageModel>);
            Self {
                assistant: Assistant::new(config, Box::new(launcher.clone()), model, Vec::new()),
                launcher,
                transcript: Transcript::new(&config.name),
            }
        }

        fn handle(&mut self, text: &str) -> Flow {
            self.assistant.handle(text, &mut self.transcript)
        }

        fn output(&self) -> String {
            String::from_utf8_lossy(&self.assistant.out).into_owned()
        }

        fn opened(&self) -> Vec<String> {
            self.launcher.opened.lock().unwrap().clone()
        }
    }

    #[test]
    fn test_open_youtube() {
        let mut h = Harness::new(&Config::default(), None);

        assert_eq!(h.handle("open youtube"), Flow::Continue);

        assert_eq!(h.opened(), ["https://www.youtube.com"]);
        assert!(h.output().contains("Opening youtube..."));
    }

    #[test]
    fn test_play_on_youtube_searches() {
        let mut h = Harness::new(&Config::default(), None);

        assert_eq!(h.handle("play never gonna give you up on youtube"), Flow::Continue);

        assert_eq!(
            h.opened(),
            ["https://www.youtube.com/results?search_query=never%20gonna%20give%20you%20up"]
        );
    }

    #[test]
    fn test_empty_video_query_does_not_navigate() {
        let mut h = Harness::new(&Config::default(), None);

        assert_eq!(h.handle("play on youtube"), Flow::Continue);

        assert!(h.opened().is_empty());
        assert!(h.output().contains("No valid search query detected."));
    }

    #[test]
    fn test_time_is_current_local_time() {
        let mut h = Harness::new(&Config::default(), None);

        let before = current_time();
        h.handle("what's the time");
        let after = current_time();

        let out = h.output();
        let reported = out.trim().strip_prefix("The time is ").unwrap();
        assert_eq!(reported.len(), 5);
        assert_eq!(&reported[2..3], ":");
        assert!(reported[..2].chars().all(|c| c.is_ascii_digit()));
        assert!(reported[3..].chars().all(|c| c.is_ascii_digit()));
        assert!(reported == before || reported == after);
    }

    #[test]
    fn test_launch_app() {
        let mut h = Harness::new(&Config::default(), None);

        h.handle("open facetime");

        assert_eq!(
            *h.launcher.launched.lock().unwrap(),
            ["/System/Applications/FaceTime.app"]
        );
        assert!(h.opened().is_empty());
        assert_eq!(h.output(), "");
    }

    #[test]
    fn test_failed_launch_is_reported() {
        let mut h = Harness::new(&Config::default(), None);
        h.launcher.fail_launch = true;
        h.assistant.launcher = Box::new(h.launcher.clone());

        assert_eq!(h.handle("open facetime"), Flow::Continue);

        let output = h.output();
        assert!(output.starts_with("Could not open facetime: failed to open"));
        assert!(!output.contains("Opening"));
    }

    #[test]
    fn test_quit_stops_loop() {
        for text in ["jarvis quit", "quit", "exit"] {
            let mut h = Harness::new(&Config::default(), None);
            assert_eq!(h.handle(text), Flow::Exit);
            assert!(h.output().contains("Goodbye!"));
        }
    }

    #[test]
    fn test_reset_chat_clears_transcript() {
        let model = FakeModel::replying("Hello!");
        let mut h = Harness::new(&Config::default(), Some(model.clone()));

        h.handle("hi there");
        assert_eq!(h.transcript.len(), 2);

        assert_eq!(h.handle("reset chat"), Flow::Continue);
        assert!(h.transcript.is_empty());

        h.handle("who are you");
        assert_eq!(h.transcript.len(), 2);
        assert_eq!(h.transcript.turns()[0].speaker, Speaker::User);
        assert_eq!(h.transcript.turns()[0].text, "who are you");
        assert_eq!(model.calls(), 2);
    }

    #[test]
    fn test_chat_prints_reply() {
        let model = FakeModel::replying("Doing well.");
        let mut h = Harness::new(&Config::default(), Some(model));

        h.handle("how are you");

        assert!(h.output().contains("Jarvis: Doing well."));
    }

    #[test]
    fn test_chat_without_model_makes_no_request() {
        let mut h = Harness::new(&Config::default(), None);

        h.handle("how are you");

        assert!(h.output().contains(chat::CHAT_DISABLED));
        assert_eq!(h.transcript.turns()[1].text, chat::CHAT_DISABLED);
    }

    #[test]
    fn test_chat_disabled_is_unrecognized() {
        let mut config = Config::default();
        config.chat.enabled = false;
        let model = FakeModel::replying("unused");
        let mut h = Harness::new(&config, Some(model.clone()));

        assert_eq!(h.handle("tell me a joke"), Flow::Continue);

        assert!(h.output().contains("Command not recognized."));
        assert_eq!(model.calls(), 0);
        assert!(h.transcript.is_empty());
    }

    #[test]
    fn test_generate_saves_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.output_dir = dir.path().join("Gemini");
        let mut h = Harness::new(&config, Some(FakeModel::replying("Once upon a time.")));

        h.handle("a story using artificial intelligence");

        let path = config.output_dir.join("a_story_using_artificial_intelligence.txt");
        assert!(path.exists());
        assert!(h.output().contains("Response saved to"));
    }

    #[test]
    fn test_generate_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.output_dir = dir.path().join("Gemini");
        let mut h = Harness::new(&config, Some(FakeModel::failing()));

        assert_eq!(h.handle("a poem using artificial intelligence"), Flow::Continue);

        assert!(h.output().contains("Error fetching AI response: offline"));
        assert!(!config.output_dir.exists());
    }

    #[test]
    fn test_generate_without_model() {
        let mut h = Harness::new(&Config::default(), None);

        h.handle("a poem using artificial intelligence");

        assert!(h.output().contains("AI model not available."));
    }
}
