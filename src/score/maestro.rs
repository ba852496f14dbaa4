//! Maestro: voices played in parallel
//!
//! A maestro owns one voice per MML line and mixes them by taking
//! the mean of the per-voice samples, so adding a voice never pushes
//! the mix outside the range of the loudest one.

use log::debug;

use crate::score::parser::{parse_voice, ParseError};
use crate::score::voice::Voice;
use crate::synth::instrument::InstrumentMap;

#[derive(Debug, Clone, Default)]
pub struct Maestro {
    choir: Vec<Voice>,
}

impl Maestro {
    /// Parse one maestro from MML lines, one voice per line.
    ///
    /// Voices that parse to no notes are dropped so they do not drag
    /// the mix level down. Construction is atomic: any line failing
    /// to parse fails the whole maestro.
    pub fn from_lines<S: AsRef<str>>(
        lines: &[S],
        instruments: &InstrumentMap,
        pitches: &[f64],
    ) -> Result<Self, ParseError> {
        let mut choir = Vec::with_capacity(lines.len());
        for line in lines {
            let voice = parse_voice(line.as_ref(), instruments, pitches)?;
            if !voice.finished() {
                choir.push(voice);
            }
        }
        debug!("maestro assembled with {} voices", choir.len());
        Ok(Self { choir })
    }

    pub fn from_voices(choir: Vec<Voice>) -> Self {
        Self { choir }
    }

    /// Mean of the voice samples at `time`, 0 when there are no
    /// voices. Times must be non-decreasing within a play session.
    pub fn sample(&mut self, time: f64) -> f64 {
        if self.choir.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.choir.iter_mut().map(|v| v.sample(time)).sum();
        sum / self.choir.len() as f64
    }

    /// True when every voice has played out.
    pub fn finished(&self) -> bool {
        self.choir.iter().all(|v| v.finished())
    }

    /// Rewind all voices for another pass.
    pub fn reset(&mut self) {
        for voice in &mut self.choir {
            voice.reset();
        }
    }

    pub fn voices(&self) -> &[Voice] {
        &self.choir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::PitchTable;
    use crate::synth::instrument::default_instruments;

    fn maestro(lines: &[&str]) -> Maestro {
        let table = PitchTable::default();
        Maestro::from_lines(lines, &default_instruments(), table.frequencies()).unwrap()
    }

    #[test]
    fn test_sample_is_mean_of_voices() {
        let mut pair = maestro(&["O4 C E G", "O5 C E G"]);
        let mut low = maestro(&["O4 C E G"]);
        let mut high = maestro(&["O5 C E G"]);
        for i in 0..2000 {
            let t = i as f64 / 1000.0;
            let expected = (low.sample(t) + high.sample(t)) / 2.0;
            assert!((pair.sample(t) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_empty_voices_dropped() {
        // A lone tempo command emits no notes.
        let m = maestro(&["C D", "T140", ""]);
        assert_eq!(m.voices().len(), 1);
    }

    #[test]
    fn test_no_voices_is_silent_and_finished() {
        let mut m = maestro(&[]);
        assert!(m.finished());
        assert_eq!(m.sample(0.0), 0.0);
    }

    #[test]
    fn test_parse_failure_is_atomic() {
        let table = PitchTable::default();
        let result = Maestro::from_lines(
            &["C D E", "C#Z"],
            &default_instruments(),
            table.frequencies(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_sustain_and_release_amplitudes() {
        // A legato whole note on A4 at 60 BPM sounds for four
        // seconds. The default square instrument makes amplitudes
        // exact: mid-note the envelope sustains at the parser's
        // default half volume, and halfway through the 50 ms release
        // tail it has dropped to half of that.
        let mut m = maestro(&["T60 L1 O4 ML A"]);
        assert!((m.sample(2.0).abs() - 0.5).abs() < 1e-9);
        assert!((m.sample(4.025).abs() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_finished_and_reset() {
        let mut m = maestro(&["T120 L4 C"]);
        assert!(!m.finished());
        // A quarter note plus release tail is well inside a second.
        let mut t = 0.0;
        while t < 1.0 {
            m.sample(t);
            t += 0.001;
        }
        assert!(m.finished());
        m.reset();
        assert!(!m.finished());
    }
}
