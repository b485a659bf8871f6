//! Loudness of raw PCM chunks

/// Largest magnitude of a signed 16-bit sample
const FULL_SCALE: f64 = 32768.0;

/// RMS loudness of s16le samples, scaled by `gain` and clamped to [0, 1].
///
/// No samples means silence.
pub fn rms_level(samples: &[i16], gain: f32) -> f32 {
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    level_from(sum_squares, samples.len(), gain)
}

fn level_from(sum_squares: f64, count: usize, gain: f32) -> f32 {
    if count == 0 {
        return 0.0;
    }
    let rms = (sum_squares / count as f64).sqrt();
    let level = (rms / FULL_SCALE * gain as f64) as f32;
    if level.is_finite() {
        level.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Per-stream loudness extractor.
///
/// Network chunks are not aligned to samples, so a trailing odd byte is held
/// back and joined with the first byte of the next chunk.
#[derive(Debug, Clone)]
pub struct LoudnessMeter {
    gain: f32,
    carry: Option<u8>,
}

impl LoudnessMeter {
    pub fn new(gain: f32) -> Self {
        Self { gain, carry: None }
    }

    /// Loudness of the complete samples available after adding `chunk`
    pub fn measure(&mut self, chunk: &[u8]) -> f32 {
        let mut sum_squares = 0.0f64;
        let mut count = 0usize;
        let mut bytes = chunk;

        if let Some(low) = self.carry.take() {
            match bytes.split_first() {
                Some((&high, rest)) => {
                    let sample = i16::from_le_bytes([low, high]) as f64;
                    sum_squares += sample * sample;
                    count += 1;
                    bytes = rest;
                }
                None => {
                    self.carry = Some(low);
                    return 0.0;
                }
            }
        }

        let mut pairs = bytes.chunks_exact(2);
        for pair in &mut pairs {
            let sample = i16::from_le_bytes([pair[0], pair[1]]) as f64;
            sum_squares += sample * sample;
            count += 1;
        }
        if let [odd] = pairs.remainder() {
            self.carry = Some(*odd);
        }

        level_from(sum_squares, count, self.gain)
    }

    /// Forget any held-back byte
    pub fn reset(&mut self) {
        self.carry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_silence_is_zero() {
        let mut meter = LoudnessMeter::new(1.0);
        assert_eq!(meter.measure(&encode(&[0; 480])), 0.0);
        assert_eq!(rms_level(&[0; 16], 1.0), 0.0);
    }

    #[test]
    fn test_empty_chunk_is_zero() {
        let mut meter = LoudnessMeter::new(1.0);
        assert_eq!(meter.measure(&[]), 0.0);
        assert_eq!(rms_level(&[], 1.0), 0.0);
    }

    #[test]
    fn test_full_scale_square_wave_near_one() {
        let samples: Vec<i16> = (0..1000).map(|i| if i % 2 == 0 { 32767 } else { -32768 }).collect();
        let mut meter = LoudnessMeter::new(1.0);
        let level = meter.measure(&encode(&samples));
        assert!(level > 0.9999 && level <= 1.0, "level was {}", level);
    }

    #[test]
    fn test_independent_of_chunk_size() {
        let samples: Vec<i16> = (0..64).map(|i| if i % 2 == 0 { 8192 } else { -8192 }).collect();
        let small = rms_level(&samples[..4], 1.0);
        let large = rms_level(&samples, 1.0);
        assert!((small - 0.25).abs() < 1e-6);
        assert!((large - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_gain_is_clamped() {
        let samples = [16384i16; 32];
        assert!((rms_level(&samples, 1.0) - 0.5).abs() < 1e-6);
        assert_eq!(rms_level(&samples, 4.0), 1.0);
        assert_eq!(rms_level(&samples, 0.0), 0.0);
    }

    #[test]
    fn test_odd_byte_carried_across_chunks() {
        let bytes = encode(&[16384, 16384, 16384]);
        let mut meter = LoudnessMeter::new(1.0);

        // first chunk ends in the middle of the second sample
        let first = meter.measure(&bytes[..3]);
        let second = meter.measure(&bytes[3..]);
        assert!((first - 0.5).abs() < 1e-6);
        assert!((second - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_single_byte_chunk_yields_zero_until_completed() {
        let bytes = encode(&[-16384]);
        let mut meter = LoudnessMeter::new(1.0);
        assert_eq!(meter.measure(&bytes[..1]), 0.0);
        assert!((meter.measure(&bytes[1..]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_reset_drops_carry() {
        let mut meter = LoudnessMeter::new(1.0);
        meter.measure(&[0xff]);
        meter.reset();
        assert_eq!(meter.measure(&encode(&[0, 0])), 0.0);
    }
}
