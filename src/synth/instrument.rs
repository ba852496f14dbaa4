//! Instruments
//!
//! An instrument pairs one oscillator with one envelope. The parser
//! looks instruments up in a char-keyed bank; the NUL slot is the
//! default every voice starts on and must always be present.

use std::collections::HashMap;

use super::envelope::Envelope;
use super::oscillator::{Oscillator, Partial, Waveform};
use super::TWO_PI;

/// Key of the default instrument in an [`InstrumentMap`].
pub const DEFAULT_INSTRUMENT_KEY: char = '\0';

/// Bank of instruments addressable from MML via `IX<key>`.
pub type InstrumentMap = HashMap<char, Instrument>;

/// An oscillator shaped by an envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    oscillator: Oscillator,
    envelope: Envelope,
}

impl Instrument {
    pub fn new(oscillator: Oscillator, envelope: Envelope) -> Self {
        Self {
            oscillator,
            envelope,
        }
    }

    /// Sample the instrument `time` seconds into a note.
    /// `release_time` follows the envelope sentinel convention.
    pub fn sample(&self, frequency: f64, time: f64, release_time: f64) -> f64 {
        self.envelope.gain(time, release_time) * self.oscillator.sample(frequency, time)
    }

    pub fn release_length(&self) -> f64 {
        self.envelope.release_length()
    }

    pub fn sine() -> Self {
        Self::new(Oscillator::Sine, Envelope::default_ar())
    }

    pub fn triangle() -> Self {
        Self::new(Oscillator::Triangle, Envelope::default_ar())
    }

    pub fn square() -> Self {
        Self::new(Oscillator::Square, Envelope::default_ar())
    }

    pub fn saw() -> Self {
        Self::new(Oscillator::Saw, Envelope::default_ar())
    }

    pub fn noise() -> Self {
        Self::new(Oscillator::Noise, Envelope::default_ar())
    }

    pub fn rectangular(duty: f64) -> Self {
        Self::new(Oscillator::rectangular(duty), Envelope::default_ar())
    }

    /// A layered reed instrument: two detuned LFO-wobbled waves, a
    /// square an octave up, and a whisper of noise, under a slow
    /// ADSR decay.
    pub fn harmonica() -> Self {
        let oscillator = Oscillator::compound(vec![
            Partial::new(0.3, Oscillator::custom(SawLfo::new(0.001, 5.0)), 0.5),
            Partial::new(0.3, Oscillator::custom(SquareLfo::new(0.001, 5.0)), 1.0),
            Partial::new(0.15, Oscillator::Square, 2.0),
            Partial::new(0.015, Oscillator::Noise, 4.0),
        ]);
        Self::new(oscillator, Envelope::adsr(1.0, 0.0, 1.0, 0.95, 0.1))
    }
}

/// The minimal bank: a square wave in the default slot.
pub fn default_instruments() -> InstrumentMap {
    let mut bank = InstrumentMap::new();
    bank.insert(DEFAULT_INSTRUMENT_KEY, Instrument::square());
    bank
}

/// A bank whose default slot holds the layered harmonica.
pub fn harmonica_instruments() -> InstrumentMap {
    let mut bank = InstrumentMap::new();
    bank.insert(DEFAULT_INSTRUMENT_KEY, Instrument::harmonica());
    bank
}

/// Parabolic sine approximation over a phase angle in radians.
/// Cheap, smooth, and close enough for modulation duty.
fn parabolic_sine(angle: f64) -> f64 {
    let x = angle / TWO_PI;
    let x = x - x.floor();
    20.875 * x * (x - 0.5) * (x - 1.0)
}

/// Square wave whose phase wobbles with a low-frequency oscillator.
#[derive(Debug, Clone, Copy)]
pub struct SquareLfo {
    depth: f64,
    rate: f64,
}

impl SquareLfo {
    pub fn new(depth: f64, rate: f64) -> Self {
        Self { depth, rate }
    }
}

impl Waveform for SquareLfo {
    fn sample(&self, frequency: f64, time: f64) -> f64 {
        // Scaling the wobble by the carrier frequency is dubious (it
        // makes the vibrato depth grow with pitch) but it is the
        // sound this instrument is known for.
        let angle = frequency * TWO_PI * time
            + self.depth * frequency * parabolic_sine(self.rate * TWO_PI * time);
        1.0f64.copysign(parabolic_sine(angle))
    }
}

/// Saw approximated by a 99-term harmonic series, with the same
/// low-frequency phase wobble as [`SquareLfo`].
#[derive(Debug, Clone, Copy)]
pub struct SawLfo {
    depth: f64,
    rate: f64,
}

impl SawLfo {
    pub fn new(depth: f64, rate: f64) -> Self {
        Self { depth, rate }
    }
}

impl Waveform for SawLfo {
    fn sample(&self, frequency: f64, time: f64) -> f64 {
        let fundamental = frequency * TWO_PI * time
            + self.depth * frequency * parabolic_sine(self.rate * TWO_PI * time);
        let mut sum = 0.0;
        for n in 1..100 {
            sum += parabolic_sine(n as f64 * fundamental) / n as f64;
        }
        sum
    }
}
