use std::path::Path;
use tracing::info;
use transcribe_rs::{
    TranscriptionEngine,
    engines::parakeet::{ParakeetEngine, ParakeetModelParams},
};

use crate::error::ListenError;

pub struct Transcriber {
    engine: ParakeetEngine,
}

impl Transcriber {
    pub fn new(model_path: impl AsRef<Path>) -> Result<Self, ListenError> {
        let mut engine = ParakeetEngine::new();
        info!(path = %model_path.as_ref().display(), "loading speech model");

        engine
            .load_model_with_params(model_path.as_ref(), ParakeetModelParams::int8())
            .map_err(|e| ListenError::Unavailable(e.to_string()))?;
        info!("speech model loaded");
        Ok(Self { engine })
    }

    #[hotpath::measure]
    pub fn transcribe(&mut self, samples: &[f32]) -> Result<String, ListenError> {
        let result = self
            .engine
            .transcribe_samples(samples.to_vec(), None)
            .map_err(|e| ListenError::Unavailable(e.to_string()))?;
        Ok(result.text.trim().to_string())
    }
}
