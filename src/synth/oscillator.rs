//! Oscillator primitives
//!
//! Every oscillator is a pure function of (frequency, time): the same
//! inputs always produce the same sample, so oscillators carry no
//! playback state and can be evaluated at arbitrary times. This is
//! what lets a voice re-evaluate overlapping notes sample by sample.

use std::fmt;
use std::sync::Arc;

use super::TWO_PI;

/// A waveform that can be sampled at any (frequency, time) point.
///
/// Implementations must be deterministic and immutable: `sample` may
/// be called from the audio thread with no synchronization.
pub trait Waveform: Send + Sync {
    /// Sample the waveform, returning a value in [-1, 1].
    fn sample(&self, frequency: f64, time: f64) -> f64;
}

/// One layer of a compound oscillator.
#[derive(Clone, PartialEq)]
pub struct Partial {
    pub gain: f64,
    pub oscillator: Oscillator,
    pub harmonic: f64,
}

impl Partial {
    pub fn new(gain: f64, oscillator: Oscillator, harmonic: f64) -> Self {
        Self {
            gain,
            oscillator,
            harmonic,
        }
    }
}

/// A value-copyable oscillator.
///
/// The built-in shapes are plain variants; compound and user-defined
/// oscillators share their immutable innards through an `Arc`, so
/// cloning is always cheap.
#[derive(Clone)]
pub enum Oscillator {
    Sine,
    Triangle,
    Square,
    Saw,
    Noise,
    Rectangular { duty: f64 },
    Compound(Arc<Vec<Partial>>),
    Custom(Arc<dyn Waveform>),
}

impl Oscillator {
    /// Rectangular wave spending `duty` (in (0, 1)) of each cycle high.
    pub fn rectangular(duty: f64) -> Self {
        Oscillator::Rectangular { duty }
    }

    /// Weighted sum of oscillators, each at a multiple of the base
    /// frequency. The caller is responsible for keeping the summed
    /// gains within [-1, 1].
    pub fn compound(partials: Vec<Partial>) -> Self {
        Oscillator::Compound(Arc::new(partials))
    }

    pub fn custom(waveform: impl Waveform + 'static) -> Self {
        Oscillator::Custom(Arc::new(waveform))
    }

    /// Sample the oscillator at `time` seconds, in [-1, 1].
    pub fn sample(&self, frequency: f64, time: f64) -> f64 {
        match self {
            Oscillator::Sine => (frequency * TWO_PI * time).sin(),
            Oscillator::Triangle => {
                (frequency * TWO_PI * time).sin().asin() / std::f64::consts::FRAC_PI_2
            }
            Oscillator::Square => 1.0f64.copysign((frequency * TWO_PI * time).sin()),
            Oscillator::Saw => {
                let cycles = frequency * time;
                2.0 * (cycles - (cycles + 0.5).floor())
            }
            Oscillator::Noise => hash_noise(frequency * TWO_PI * time),
            Oscillator::Rectangular { duty } => {
                let angle = frequency * TWO_PI * time;
                let wrapped = angle - (angle / TWO_PI).floor() * TWO_PI;
                if wrapped <= duty * TWO_PI {
                    1.0
                } else {
                    -1.0
                }
            }
            Oscillator::Compound(partials) => partials
                .iter()
                .map(|p| p.gain * p.oscillator.sample(p.harmonic * frequency, time))
                .sum(),
            Oscillator::Custom(waveform) => waveform.sample(frequency, time),
        }
    }
}

impl PartialEq for Oscillator {
    /// Structural equality for the plain variants; `Custom` waveforms
    /// are compared by `Arc` identity since `dyn Waveform` carries no
    /// general equality.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Oscillator::Sine, Oscillator::Sine) => true,
            (Oscillator::Triangle, Oscillator::Triangle) => true,
            (Oscillator::Square, Oscillator::Square) => true,
            (Oscillator::Saw, Oscillator::Saw) => true,
            (Oscillator::Noise, Oscillator::Noise) => true,
            (Oscillator::Rectangular { duty: a }, Oscillator::Rectangular { duty: b }) => a == b,
            (Oscillator::Compound(a), Oscillator::Compound(b)) => a == b,
            (Oscillator::Custom(a), Oscillator::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Oscillator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Oscillator::Sine => f.write_str("Sine"),
            Oscillator::Triangle => f.write_str("Triangle"),
            Oscillator::Square => f.write_str("Square"),
            Oscillator::Saw => f.write_str("Saw"),
            Oscillator::Noise => f.write_str("Noise"),
            Oscillator::Rectangular { duty } => write!(f, "Rectangular({})", duty),
            Oscillator::Compound(partials) => write!(f, "Compound({} partials)", partials.len()),
            Oscillator::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Deterministic noise: hash the phase angle and spread the result
/// over [-1, 1]. The same (frequency, time) always yields the same
/// sample, which keeps renderings reproducible across platforms.
///
/// The hash is splitmix64 over the bit pattern of the input.
fn hash_noise(angle: f64) -> f64 {
    let mut z = angle.to_bits().wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;
    1.0 - 2.0 * (z as f64 / u64::MAX as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_landmarks() {
        let osc = Oscillator::Sine;
        assert!(osc.sample(1.0, 0.0).abs() < 1e-12);
        assert!((osc.sample(1.0, 0.25) - 1.0).abs() < 1e-12);
        assert!((osc.sample(1.0, 0.75) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_triangle_landmarks() {
        let osc = Oscillator::Triangle;
        assert!(osc.sample(1.0, 0.0).abs() < 1e-9);
        assert!((osc.sample(1.0, 0.25) - 1.0).abs() < 1e-9);
        // Halfway down the falling edge.
        assert!((osc.sample(1.0, 0.375) - 0.5).abs() < 1e-9);
        assert!((osc.sample(1.0, 0.75) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_square_is_sign_of_sine() {
        let osc = Oscillator::Square;
        assert_eq!(osc.sample(1.0, 0.1), 1.0);
        assert_eq!(osc.sample(1.0, 0.6), -1.0);
    }

    #[test]
    fn test_saw_ramp() {
        let osc = Oscillator::Saw;
        assert!(osc.sample(1.0, 0.0).abs() < 1e-12);
        assert!((osc.sample(1.0, 0.25) - 0.5).abs() < 1e-12);
        // Just before the wrap the ramp approaches +1, just after it
        // restarts near -1.
        assert!(osc.sample(1.0, 0.499) > 0.99);
        assert!(osc.sample(1.0, 0.501) < -0.99);
    }

    #[test]
    fn test_rectangular_duty() {
        let osc = Oscillator::rectangular(0.25);
        assert_eq!(osc.sample(1.0, 0.1), 1.0);
        assert_eq!(osc.sample(1.0, 0.3), -1.0);
        assert_eq!(osc.sample(1.0, 0.9), -1.0);
        // A duty of one half matches the square wave.
        let rect = Oscillator::rectangular(0.5);
        let square = Oscillator::Square;
        for i in 0..100 {
            let t = i as f64 * 0.013;
            assert_eq!(rect.sample(220.0, t), square.sample(220.0, t));
        }
    }

    #[test]
    fn test_all_shapes_bounded() {
        let shapes = [
            Oscillator::Sine,
            Oscillator::Triangle,
            Oscillator::Square,
            Oscillator::Saw,
            Oscillator::Noise,
            Oscillator::rectangular(0.3),
        ];
        for osc in &shapes {
            for i in 0..1000 {
                let t = i as f64 / 1000.0;
                let s = osc.sample(440.0, t);
                assert!(s.is_finite());
                assert!((-1.0..=1.0).contains(&s), "{:?} produced {}", osc, s);
            }
        }
    }

    #[test]
    fn test_oscillators_deterministic() {
        let shapes = [
            Oscillator::Sine,
            Oscillator::Noise,
            Oscillator::rectangular(0.7),
        ];
        for osc in &shapes {
            for i in 0..100 {
                let t = i as f64 * 0.00137;
                assert_eq!(osc.sample(311.13, t), osc.sample(311.13, t));
            }
        }
    }

    #[test]
    fn test_noise_uniformity() {
        // Chi-squared test against a uniform distribution over ten
        // buckets. With 10_000 draws the expected count per bucket is
        // 1000; the 9-degree-of-freedom critical value at p = 0.001
        // is 27.88.
        let osc = Oscillator::Noise;
        let mut buckets = [0usize; 10];
        let draws = 10_000;
        for i in 0..draws {
            let s = osc.sample(440.0, i as f64 / 44_100.0);
            let bucket = (((s + 1.0) / 2.0) * 10.0).min(9.0) as usize;
            buckets[bucket] += 1;
        }
        let expected = draws as f64 / 10.0;
        let chi2: f64 = buckets
            .iter()
            .map(|&count| {
                let diff = count as f64 - expected;
                diff * diff / expected
            })
            .sum();
        assert!(chi2 < 27.88, "chi-squared statistic too high: {}", chi2);
    }

    #[test]
    fn test_compound_sums_partials() {
        let osc = Oscillator::compound(vec![
            Partial::new(0.5, Oscillator::Sine, 1.0),
            Partial::new(0.25, Oscillator::Sine, 2.0),
        ]);
        let t = 0.123;
        let expected = 0.5 * Oscillator::Sine.sample(100.0, t)
            + 0.25 * Oscillator::Sine.sample(200.0, t);
        assert!((osc.sample(100.0, t) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_custom_waveform() {
        struct Flat;
        impl Waveform for Flat {
            fn sample(&self, _frequency: f64, _time: f64) -> f64 {
                0.25
            }
        }
        let osc = Oscillator::custom(Flat);
        assert_eq!(osc.sample(440.0, 1.0), 0.25);
        let copy = osc.clone();
        assert_eq!(copy.sample(880.0, 2.0), 0.25);
    }
}
