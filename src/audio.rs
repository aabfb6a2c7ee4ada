use cpal::Stream;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rubato::{FftFixedIn, Resampler};
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::ListenError;
use crate::vad::EnergyVad;

pub const TARGET_RATE: usize = 16000;
const RESAMPLE_CHUNK: usize = 1024;

// 30ms frames at 16kHz = 480 samples
const FRAME_SAMPLES: usize = 480;
const FRAME_DURATION: Duration = Duration::from_millis(30);
const MIN_SPEECH_SAMPLES: usize = TARGET_RATE / 4;
const SILENCE_FRAMES_TO_END: usize = 15;
const PREFILL_FRAMES: usize = 10;
const ONSET_FRAMES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
enum VadState {
    Idle,
    Onset(usize),
    Speaking(usize),
}

struct FrameResampler {
    resampler: Option<FftFixedIn<f32>>,
    in_buf: Vec<f32>,
    pending: Vec<f32>,
    frame_samples: usize,
}

impl FrameResampler {
    fn new(in_hz: usize, out_hz: usize, frame_samples: usize) -> Result<Self, ListenError> {
        let resampler = if in_hz != out_hz {
            Some(
                FftFixedIn::<f32>::new(in_hz, out_hz, RESAMPLE_CHUNK, 1, 1)
                    .map_err(|e| ListenError::Unavailable(e.to_string()))?,
            )
        } else {
            None
        };
        Ok(Self {
            resampler,
            in_buf: Vec::with_capacity(RESAMPLE_CHUNK),
            pending: Vec::with_capacity(frame_samples),
            frame_samples,
        })
    }

    fn push(&mut self, src: &[f32], mut emit: impl FnMut(&[f32])) {
        let Some(resampler) = self.resampler.as_mut() else {
            Self::emit_frames(&mut self.pending, self.frame_samples, src, &mut emit);
            return;
        };

        self.in_buf.extend_from_slice(src);

        while self.in_buf.len() >= RESAMPLE_CHUNK {
            let chunk: Vec<f32> = self.in_buf.drain(..RESAMPLE_CHUNK).collect();
            if let Ok(out) = resampler.process(&[&chunk], None) {
                Self::emit_frames(&mut self.pending, self.frame_samples, &out[0], &mut emit);
            }
        }
    }

    fn emit_frames(
        pending: &mut Vec<f32>,
        frame_samples: usize,
        data: &[f32],
        emit: &mut impl FnMut(&[f32]),
    ) {
        pending.extend_from_slice(data);

        while pending.len() >= frame_samples {
            let frame: Vec<f32> = pending.drain(..frame_samples).collect();
            emit(&frame);
        }
    }
}

/// Open microphone for the duration of one listen. The device is released
/// when this is dropped, whichever way the listen ends.
pub struct Microphone {
    stream: Stream,
    frames: Receiver<Vec<f32>>,
}

impl Microphone {
    /// Start capturing mono 16kHz frames from the default input device
    pub fn open() -> Result<Self, ListenError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| ListenError::Unavailable("no input device".into()))?;
        let supported = device.default_input_config().map_err(unavailable)?;
        let input_rate = u32::from(supported.sample_rate()) as usize;
        let channels = supported.channels() as usize;

        debug!(input_rate, channels, "microphone -> {}Hz mono", TARGET_RATE);

        let mut resampler = FrameResampler::new(input_rate, TARGET_RATE, FRAME_SAMPLES)?;
        let (tx, frames) = mpsc::channel::<Vec<f32>>();

        let stream = device
            .build_input_stream(
                &supported.config(),
                move |data: &[f32], _| {
                    let mono: Vec<f32> = if channels == 1 {
                        data.to_vec()
                    } else {
                        data.chunks(channels)
                            .map(|c| c.iter().sum::<f32>() / channels as f32)
                            .collect()
                    };

                    resampler.push(&mono, |frame| {
                        let _ = tx.send(frame.to_vec());
                    });
                },
                |err| warn!("audio stream error: {}", err),
                None,
            )
            .map_err(unavailable)?;

        stream.play().map_err(unavailable)?;
        Ok(Self { stream, frames })
    }

    fn next_frame(&self, timeout: Duration) -> Result<Vec<f32>, ListenError> {
        self.frames.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => ListenError::Timeout,
            RecvTimeoutError::Disconnected => {
                ListenError::Unavailable("audio stream closed".into())
            }
        })
    }

    /// Sample the room for `duration` and tune the detector to it
    pub fn calibrate(&self, vad: &mut EnergyVad, duration: Duration) -> Result<(), ListenError> {
        calibrate_from(|wait| self.next_frame(wait), vad, duration)
    }

    /// Wait up to `timeout` for speech to start, then record until the
    /// speaker goes quiet or `max_phrase` is reached.
    pub fn record_phrase(
        &self,
        vad: &EnergyVad,
        timeout: Duration,
        max_phrase: Duration,
    ) -> Result<Vec<f32>, ListenError> {
        record_phrase_from(|wait| self.next_frame(wait), vad, timeout, max_phrase)
    }
}

/// One `duration` worth of 30ms frames goes into the detector's threshold
fn calibrate_from(
    mut next_frame: impl FnMut(Duration) -> Result<Vec<f32>, ListenError>,
    vad: &mut EnergyVad,
    duration: Duration,
) -> Result<(), ListenError> {
    let wanted = (duration.as_millis() / FRAME_DURATION.as_millis()).max(1) as usize;
    let mut ambient = Vec::with_capacity(wanted);
    while ambient.len() < wanted {
        ambient.push(next_frame(duration)?);
    }
    vad.calibrate(&ambient);
    debug!(threshold = vad.threshold(), frames = wanted, "ambient calibration");
    Ok(())
}

/// Onset/silence state machine over a frame source. `next_frame` gets the
/// longest it may block and returns `ListenError::Timeout` when nothing came.
fn record_phrase_from(
    mut next_frame: impl FnMut(Duration) -> Result<Vec<f32>, ListenError>,
    vad: &EnergyVad,
    timeout: Duration,
    max_phrase: Duration,
) -> Result<Vec<f32>, ListenError> {
    let deadline = Instant::now() + timeout;
    let max_samples = (TARGET_RATE as f32 * max_phrase.as_secs_f32()) as usize;
    let mut state = VadState::Idle;
    let mut speech_buf: Vec<f32> = Vec::with_capacity(max_samples);
    let mut prefill: VecDeque<Vec<f32>> = VecDeque::with_capacity(PREFILL_FRAMES + 1);

    loop {
        let wait = if matches!(state, VadState::Speaking(_)) {
            max_phrase
        } else {
            deadline
                .checked_duration_since(Instant::now())
                .ok_or(ListenError::Timeout)?
        };
        let frame = next_frame(wait)?;

        let speaking = matches!(state, VadState::Speaking(_));
        let is_speech = vad.is_speech(&frame, speaking);

        state = match state {
            VadState::Idle | VadState::Onset(_) if !is_speech => {
                push_prefill(&mut prefill, frame);
                VadState::Idle
            }
            VadState::Idle => {
                push_prefill(&mut prefill, frame);
                VadState::Onset(1)
            }
            VadState::Onset(count) => {
                push_prefill(&mut prefill, frame);
                if count + 1 >= ONSET_FRAMES {
                    for pf in prefill.drain(..) {
                        speech_buf.extend_from_slice(&pf);
                    }
                    VadState::Speaking(0)
                } else {
                    VadState::Onset(count + 1)
                }
            }
            VadState::Speaking(silence) => {
                speech_buf.extend_from_slice(&frame);
                VadState::Speaking(if is_speech { 0 } else { silence + 1 })
            }
        };

        if let VadState::Speaking(silence) = state {
            if silence >= SILENCE_FRAMES_TO_END || speech_buf.len() >= max_samples {
                // trailing silence does not count toward the minimum
                let voiced = speech_buf.len().saturating_sub(silence * FRAME_SAMPLES);
                if voiced >= MIN_SPEECH_SAMPLES {
                    return Ok(speech_buf);
                }
                // a click or a cough, keep waiting
                debug!(voiced, "dropped short burst");
                speech_buf.clear();
                state = VadState::Idle;
            }
        }
    }
}

impl Drop for Microphone {
    fn drop(&mut self) {
        let _ = self.stream.pause();
        debug!("microphone released");
    }
}

fn unavailable(e: impl std::fmt::Display) -> ListenError {
    ListenError::Unavailable(e.to_string())
}

fn push_prefill(prefill: &mut VecDeque<Vec<f32>>, frame: Vec<f32>) {
    prefill.push_back(frame);
    if prefill.len() > PREFILL_FRAMES {
        prefill.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_resampler_emits_whole_frames() {
        let mut resampler = FrameResampler::new(TARGET_RATE, TARGET_RATE, FRAME_SAMPLES).unwrap();
        let mut frames = Vec::new();

        resampler.push(&vec![0.1; 1000], |f| frames.push(f.len()));

        assert_eq!(frames, [FRAME_SAMPLES, FRAME_SAMPLES]);
        assert_eq!(resampler.pending.len(), 1000 - 2 * FRAME_SAMPLES);
    }

    #[test]
    fn test_downsampling_produces_frames() {
        let mut resampler = FrameResampler::new(48000, TARGET_RATE, FRAME_SAMPLES).unwrap();
        let mut total = 0;

        for _ in 0..10 {
            resampler.push(&vec![0.0; 4800], |f| total += f.len());
        }

        assert!(total > 0);
        assert_eq!(total % FRAME_SAMPLES, 0);
    }

    fn frame(level: f32) -> Vec<f32> {
        vec![level; FRAME_SAMPLES]
    }

    fn script(parts: &[(f32, usize)]) -> VecDeque<Vec<f32>> {
        parts
            .iter()
            .flat_map(|&(level, count)| std::iter::repeat_n(frame(level), count))
            .collect()
    }

    const LOUD: f32 = 0.2;
    const QUIET: f32 = 0.0;
    const TIMEOUT: Duration = Duration::from_secs(5);
    const MAX_PHRASE: Duration = Duration::from_secs(10);

    #[test]
    fn test_silence_only_times_out() {
        let mut frames = script(&[(QUIET, 20)]);
        let mut waits = Vec::new();

        let result = record_phrase_from(
            |wait| {
                waits.push(wait);
                frames.pop_front().ok_or(ListenError::Timeout)
            },
            &EnergyVad::default(),
            TIMEOUT,
            MAX_PHRASE,
        );

        assert!(matches!(result, Err(ListenError::Timeout)));
        assert!(frames.is_empty());
        assert!(waits.iter().all(|&w| w <= TIMEOUT));
    }

    #[test]
    fn test_phrase_ends_after_silence() {
        let mut frames = script(&[(QUIET, 2), (LOUD, 12), (QUIET, 15), (LOUD, 1)]);

        let samples = record_phrase_from(
            |_| frames.pop_front().ok_or(ListenError::Timeout),
            &EnergyVad::default(),
            TIMEOUT,
            MAX_PHRASE,
        )
        .unwrap();

        // two prefill frames, the phrase, and the silence that ended it
        assert_eq!(samples.len(), 29 * FRAME_SAMPLES);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_onset_needs_consecutive_frames() {
        let mut frames = script(&[(LOUD, 2), (QUIET, 1), (LOUD, 2), (QUIET, 1)]);

        let result = record_phrase_from(
            |_| frames.pop_front().ok_or(ListenError::Timeout),
            &EnergyVad::default(),
            TIMEOUT,
            MAX_PHRASE,
        );

        assert!(matches!(result, Err(ListenError::Timeout)));
    }

    #[test]
    fn test_phrase_capped_at_max_length() {
        let mut frames = script(&[(LOUD, 100)]);

        let samples = record_phrase_from(
            |_| frames.pop_front().ok_or(ListenError::Timeout),
            &EnergyVad::default(),
            TIMEOUT,
            Duration::from_secs(1),
        )
        .unwrap();

        assert!(samples.len() >= TARGET_RATE);
        assert!(samples.len() < TARGET_RATE + FRAME_SAMPLES);
        assert_eq!(frames.len(), 100 - samples.len() / FRAME_SAMPLES);
    }

    #[test]
    fn test_short_burst_is_dropped() {
        let mut frames = script(&[
            (LOUD, 4),
            (QUIET, 15),
            (LOUD, 12),
            (QUIET, 15),
            (QUIET, 1),
        ]);

        let samples = record_phrase_from(
            |_| frames.pop_front().ok_or(ListenError::Timeout),
            &EnergyVad::default(),
            TIMEOUT,
            MAX_PHRASE,
        )
        .unwrap();

        // only the second phrase comes back
        assert_eq!(samples.len(), 27 * FRAME_SAMPLES);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_short_burst_then_nothing_times_out() {
        let mut frames = script(&[(LOUD, 4), (QUIET, 30)]);

        let result = record_phrase_from(
            |_| frames.pop_front().ok_or(ListenError::Timeout),
            &EnergyVad::default(),
            TIMEOUT,
            MAX_PHRASE,
        );

        assert!(matches!(result, Err(ListenError::Timeout)));
    }

    #[test]
    fn test_calibration_reads_duration_worth_of_frames() {
        let mut frames = script(&[(0.05, 20)]);
        let mut vad = EnergyVad::default();
        let duration = Duration::from_millis(300);

        calibrate_from(
            |wait| {
                assert_eq!(wait, duration);
                frames.pop_front().ok_or(ListenError::Timeout)
            },
            &mut vad,
            duration,
        )
        .unwrap();

        assert_eq!(frames.len(), 10);
        assert!((vad.threshold() - 0.075).abs() < 1e-6);
    }

    #[test]
    fn test_calibration_fails_when_no_audio_arrives() {
        let mut vad = EnergyVad::default();

        let result = calibrate_from(
            |_| Err(ListenError::Timeout),
            &mut vad,
            Duration::from_millis(300),
        );

        assert!(matches!(result, Err(ListenError::Timeout)));
        assert!((vad.threshold() - 0.01).abs() < 1e-6);
    }
}
