/// Energy-based voice activity detection with ambient calibration

const ENERGY_FLOOR: f32 = 0.01;
/// Speech must be this much louder than the calibrated room
const AMBIENT_MULTIPLIER: f32 = 1.5;
/// Once speaking, stay "in speech" down to this fraction of the threshold
const END_RATIO: f32 = 0.6;

pub struct EnergyVad {
    threshold: f32,
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self {
            threshold: ENERGY_FLOOR,
        }
    }
}

impl EnergyVad {
    /// Set the threshold from frames of room noise
    pub fn calibrate(&mut self, frames: &[Vec<f32>]) {
        if frames.is_empty() {
            return;
        }
        let ambient = frames.iter().map(|f| rms(f)).sum::<f32>() / frames.len() as f32;
        self.threshold = (ambient * AMBIENT_MULTIPLIER).max(ENERGY_FLOOR);
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn is_speech(&self, frame: &[f32], currently_speaking: bool) -> bool {
        let threshold = if currently_speaking {
            self.threshold * END_RATIO
        } else {
            self.threshold
        };
        rms(frame) > threshold
    }
}

pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    (frame.iter().map(|&s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
}
