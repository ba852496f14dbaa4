//! Amplitude envelopes
//!
//! An envelope maps (time, release time) to a non-negative gain.
//! `release_time` is a sentinel: [`NOT_RELEASED`] while the note is
//! held, otherwise the note-relative time at which release began.
//! Envelopes are pure functions of their inputs, like oscillators,
//! so a note can be re-evaluated at any time in its window.

use std::fmt;
use std::sync::Arc;

/// Sentinel `release_time` meaning the note has not been released.
pub const NOT_RELEASED: f64 = -1.0;

/// A gain curve that can be evaluated at any point of a note's life.
///
/// Implementations must be immutable; they are shared freely between
/// the control and audio threads.
pub trait EnvelopeShape: Send + Sync {
    fn gain(&self, time: f64, release_time: f64) -> f64;

    /// How long the envelope keeps sounding after release begins.
    fn release_length(&self) -> f64;
}

/// Attack-release envelope: linear attack to the peak, hold, then a
/// linear ramp to silence once released.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ar {
    pub attack_peak: f64,
    pub attack_length: f64,
    pub release_length: f64,
}

impl Ar {
    fn gain(&self, time: f64, release_time: f64) -> f64 {
        // The branch is chosen by where the note was when released;
        // the attack formula itself still advances with `time`, so a
        // note released mid-attack decays from its attack-time value
        // rather than snapping to the peak.
        let select = if release_time == NOT_RELEASED {
            time
        } else {
            release_time
        };
        let held = if select < self.attack_length {
            (time / self.attack_length) * self.attack_peak
        } else {
            self.attack_peak
        };
        if release_time == NOT_RELEASED {
            held
        } else {
            held * ((release_time + self.release_length - time) / self.release_length)
        }
    }
}

/// Attack-decay-sustain-release envelope. Linear in every section;
/// the release scales whatever section the note was in when it was
/// released.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adsr {
    pub attack_peak: f64,
    pub attack_length: f64,
    pub decay_length: f64,
    pub sustain_level: f64,
    pub release_length: f64,
}

impl Adsr {
    fn gain(&self, time: f64, release_time: f64) -> f64 {
        let select = if release_time == NOT_RELEASED {
            time
        } else {
            release_time
        };
        let held = if select < self.attack_length {
            (time / self.attack_length) * self.attack_peak
        } else if select < self.attack_length + self.decay_length {
            self.attack_peak
                - ((time - self.attack_length) / self.decay_length)
                    * (self.attack_peak - self.sustain_level)
        } else {
            self.sustain_level
        };
        if release_time == NOT_RELEASED {
            held
        } else {
            held * ((release_time + self.release_length - time) / self.release_length)
        }
    }
}

/// A value-copyable envelope.
#[derive(Clone)]
pub enum Envelope {
    Ar(Ar),
    Adsr(Adsr),
    Custom(Arc<dyn EnvelopeShape>),
}

impl Envelope {
    /// The envelope every builtin instrument uses: full-scale peak
    /// with a 50 ms attack and a 50 ms release tail.
    pub fn default_ar() -> Self {
        Envelope::ar(1.0, 0.05, 0.05)
    }

    pub fn ar(attack_peak: f64, attack_length: f64, release_length: f64) -> Self {
        Envelope::Ar(Ar {
            attack_peak,
            attack_length,
            release_length,
        })
    }

    pub fn adsr(
        attack_peak: f64,
        attack_length: f64,
        decay_length: f64,
        sustain_level: f64,
        release_length: f64,
    ) -> Self {
        Envelope::Adsr(Adsr {
            attack_peak,
            attack_length,
            decay_length,
            sustain_level,
            release_length,
        })
    }

    pub fn custom(shape: impl EnvelopeShape + 'static) -> Self {
        Envelope::Custom(Arc::new(shape))
    }

    /// Gain at `time` seconds into the note. `release_time` is
    /// [`NOT_RELEASED`] or the time at which release began.
    pub fn gain(&self, time: f64, release_time: f64) -> f64 {
        match self {
            Envelope::Ar(ar) => ar.gain(time, release_time),
            Envelope::Adsr(adsr) => adsr.gain(time, release_time),
            Envelope::Custom(shape) => shape.gain(time, release_time),
        }
    }

    pub fn release_length(&self) -> f64 {
        match self {
            Envelope::Ar(ar) => ar.release_length,
            Envelope::Adsr(adsr) => adsr.release_length,
            Envelope::Custom(shape) => shape.release_length(),
        }
    }
}

impl PartialEq for Envelope {
    /// Structural equality for built-in shapes; `Custom` shapes are
    /// compared by `Arc` identity since `dyn EnvelopeShape` carries no
    /// general equality.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Envelope::Ar(a), Envelope::Ar(b)) => a == b,
            (Envelope::Adsr(a), Envelope::Adsr(b)) => a == b,
            (Envelope::Custom(a), Envelope::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Envelope::Ar(ar) => write!(f, "{:?}", ar),
            Envelope::Adsr(adsr) => write!(f, "{:?}", adsr),
            Envelope::Custom(_) => f.write_str("Custom"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ar_attack_ramp() {
        let env = Envelope::ar(1.0, 0.1, 0.1);
        assert_eq!(env.gain(0.0, NOT_RELEASED), 0.0);
        assert!((env.gain(0.05, NOT_RELEASED) - 0.5).abs() < 1e-12);
        assert_eq!(env.gain(0.1, NOT_RELEASED), 1.0);
        // Sustain holds the peak indefinitely.
        assert_eq!(env.gain(5.0, NOT_RELEASED), 1.0);
    }

    #[test]
    fn test_ar_release_ramp() {
        let env = Envelope::ar(1.0, 0.1, 0.2);
        // Released at t = 1.0 from sustain; gain halves halfway
        // through the release and reaches zero at its end.
        assert_eq!(env.gain(1.0, 1.0), 1.0);
        assert!((env.gain(1.1, 1.0) - 0.5).abs() < 1e-12);
        assert!(env.gain(1.2, 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ar_release_mid_attack() {
        let env = Envelope::ar(1.0, 0.1, 0.1);
        // Released halfway up the attack: the gain continues from
        // the attack curve scaled by the release ramp, ending at
        // zero, never reaching the peak.
        let released_at = 0.05;
        let start = env.gain(released_at, released_at);
        assert!((start - 0.5).abs() < 1e-12);
        let mid = env.gain(0.1, released_at);
        assert!(mid < start + 1e-12);
        assert!(env.gain(0.15, released_at).abs() < 1e-12);
    }

    #[test]
    fn test_ar_release_length() {
        assert!((Envelope::default_ar().release_length() - 0.05).abs() < 1e-12);
        assert_eq!(Envelope::ar(1.0, 0.1, 0.3).release_length(), 0.3);
    }

    #[test]
    fn test_adsr_sections() {
        let env = Envelope::adsr(1.0, 0.1, 0.1, 0.25, 0.1);
        assert!((env.gain(0.05, NOT_RELEASED) - 0.5).abs() < 1e-12);
        assert_eq!(env.gain(0.1, NOT_RELEASED), 1.0);
        // Halfway down the decay toward the sustain level.
        assert!((env.gain(0.15, NOT_RELEASED) - 0.625).abs() < 1e-12);
        assert!((env.gain(0.2, NOT_RELEASED) - 0.25).abs() < 1e-12);
        assert!((env.gain(2.0, NOT_RELEASED) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_adsr_release_from_sustain() {
        let env = Envelope::adsr(1.0, 0.1, 0.1, 0.5, 0.2);
        assert!((env.gain(1.0, 1.0) - 0.5).abs() < 1e-12);
        assert!((env.gain(1.1, 1.0) - 0.25).abs() < 1e-12);
        assert!(env.gain(1.2, 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_adsr_zero_attack() {
        // A zero-length attack must not divide by zero; the curve
        // starts in the decay section.
        let env = Envelope::adsr(1.0, 0.0, 1.0, 0.95, 0.1);
        assert_eq!(env.gain(0.0, NOT_RELEASED), 1.0);
        assert!((env.gain(0.5, NOT_RELEASED) - 0.975).abs() < 1e-12);
    }

    #[test]
    fn test_custom_envelope() {
        struct Gate;
        impl EnvelopeShape for Gate {
            fn gain(&self, _time: f64, release_time: f64) -> f64 {
                if release_time == NOT_RELEASED {
                    1.0
                } else {
                    0.0
                }
            }
            fn release_length(&self) -> f64 {
                0.0
            }
        }
        let env = Envelope::custom(Gate);
        assert_eq!(env.gain(3.0, NOT_RELEASED), 1.0);
        assert_eq!(env.gain(3.0, 2.0), 0.0);
        assert_eq!(env.release_length(), 0.0);
    }
}
