//! Local speech recognizer: microphone + energy VAD + Parakeet

use crate::audio::Microphone;
use crate::config::SpeechConfig;
use crate::error::ListenError;
use crate::input::SpeechRecognizer;
use crate::transcriber::Transcriber;
use crate::vad::EnergyVad;
use std::time::Duration;
use tracing::warn;

pub struct LocalRecognizer {
    /// None when the model failed to load; every listen is then unavailable
    transcriber: Option<Transcriber>,
    vad: EnergyVad,
    timeout: Duration,
    calibration: Duration,
    max_phrase: Duration,
}

impl LocalRecognizer {
    pub fn new(config: &SpeechConfig) -> Self {
        let transcriber = match Transcriber::new(&config.model) {
            Ok(t) => Some(t),
            Err(e) => {
                warn!("speech model unavailable: {}", e);
                None
            }
        };
        Self {
            transcriber,
            vad: EnergyVad::default(),
            timeout: Duration::from_secs(config.listen_timeout_secs),
            calibration: Duration::from_millis(config.calibration_ms),
            max_phrase: Duration::from_secs(config.max_phrase_secs),
        }
    }
}

impl SpeechRecognizer for LocalRecognizer {
    fn listen(&mut self) -> Result<String, ListenError> {
        let Some(transcriber) = self.transcriber.as_mut() else {
            return Err(ListenError::Unavailable("speech model not loaded".into()));
        };

        let samples = {
            let mic = Microphone::open()?;
            mic.calibrate(&mut self.vad, self.calibration)?;
            mic.record_phrase(&self.vad, self.timeout, self.max_phrase)?
        };

        let text = transcriber.transcribe(&samples)?;
        if text.is_empty() {
            return Err(ListenError::Unintelligible);
        }
        Ok(text)
    }
}
