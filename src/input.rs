//! Input acquisition - one utterance per call, spoken or typed

use crate::error::ListenError;
use std::io::{self, BufRead, Write};

/// Speech-to-text collaborator
pub trait SpeechRecognizer {
    /// Capture and recognize a single phrase
    fn listen(&mut self) -> Result<String, ListenError>;
}

/// Lower-case and trim
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Recognizers like to end sentences with punctuation
fn normalize_spoken(text: &str) -> String {
    normalize(text)
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .to_string()
}

/// Try speech first (if given), then fall back to one line of text.
///
/// Returns `Ok(None)` at end of input. An empty string means nothing was
/// entered this cycle.
pub fn acquire<R: BufRead, W: Write>(
    speech: Option<&mut dyn SpeechRecognizer>,
    input: &mut R,
    out: &mut W,
) -> io::Result<Option<String>> {
    if let Some(recognizer) = speech {
        writeln!(out, "Listening...")?;
        out.flush()?;
        match recognizer.listen() {
            Ok(text) => {
                let query = normalize_spoken(&text);
                if !query.is_empty() {
                    writeln!(out, "You said: {}", query)?;
                    return Ok(Some(query));
                }
                writeln!(out, "{}", ListenError::Unintelligible)?;
            }
            Err(e) => writeln!(out, "{}", e)?,
        }
    }

    write!(out, "Enter your command: ")?;
    out.flush()?;

    // bytes, not read_line: a non-UTF-8 line must not end the session
    let mut line = Vec::new();
    if input.read_until(b'\n', &mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(normalize(&String::from_utf8_lossy(&line))))
}
