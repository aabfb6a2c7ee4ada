//! AI-generated content persisted to disk
//!
//! The filename comes straight from the prompt, so asking the same thing
//! twice overwrites the earlier file.

use crate::error::GenerateError;
use crate::llm::LanguageModel;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const MAX_STEM_CHARS: usize = 50;
const SEPARATOR_WIDTH: usize = 50;

/// Spaces and path separators become underscores, then truncate
pub fn file_stem(prompt: &str) -> String {
    prompt
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            c => c,
        })
        .take(MAX_STEM_CHARS)
        .collect()
}

pub fn output_path(dir: &Path, prompt: &str) -> PathBuf {
    dir.join(format!("{}.txt", file_stem(prompt)))
}

/// File body: prompt header, separator line, blank line, generated text
pub fn render(model_name: &str, prompt: &str, text: &str) -> String {
    format!(
        "{} response for Prompt: {}\n{}\n\n{}",
        model_name,
        prompt,
        "=".repeat(SEPARATOR_WIDTH),
        text
    )
}

/// Ask the model, then write the record. Nothing is written if the
/// request fails.
pub fn save(
    model: &dyn LanguageModel,
    prompt: &str,
    dir: &Path,
) -> Result<PathBuf, GenerateError> {
    let text = model.generate(prompt)?;

    fs::create_dir_all(dir)?;
    let path = output_path(dir, prompt);
    fs::write(&path, render(model.name(), prompt, &text))?;

    info!(path = %path.display(), bytes = text.len(), "saved generated content");
    Ok(path)
}
