//! Notes and voices
//!
//! A voice is a frozen, start-time-ordered sequence of notes plus a
//! streaming cursor. Playback assumes the caller asks for samples at
//! non-decreasing times; under that contract the cursor only moves
//! forward and the set of sounding notes stays small.
//!
//! Known limitation, kept on purpose: a voice's schedule comes from a
//! single monophonic line, so the scheduler makes no attempt to treat
//! a note's release tail and its successor's attack as one musical
//! gesture. Tails that outlast the gap to the next note simply sum
//! with it.

use crate::synth::envelope::NOT_RELEASED;
use crate::synth::Instrument;

/// One scheduled instrument invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    instrument: Instrument,
    frequency: f64,
    start_time: f64,
    duration: f64,
    volume: f64,
}

impl Note {
    pub fn new(
        instrument: Instrument,
        frequency: f64,
        start_time: f64,
        duration: f64,
        volume: f64,
    ) -> Self {
        Self {
            instrument,
            frequency,
            start_time,
            duration,
            volume,
        }
    }

    /// True before the note's window opens.
    pub fn pending(&self, time: f64) -> bool {
        time < self.start_time
    }

    /// True once the note's window, release tail included, is past.
    pub fn expired(&self, time: f64) -> bool {
        time > self.start_time + self.duration + self.instrument.release_length()
    }

    /// Sample the note at an absolute time within its window.
    pub fn play(&self, time: f64) -> f64 {
        let note_time = time - self.start_time;
        let release_time = if note_time < self.duration {
            NOT_RELEASED
        } else {
            self.duration
        };
        self.volume * self.instrument.sample(self.frequency, note_time, release_time)
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    fn end_time(&self) -> f64 {
        self.start_time + self.duration + self.instrument.release_length()
    }
}

/// A monophonic stream of notes with a sample-accurate cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct Voice {
    notes: Vec<Note>,
    index: usize,
    active: Vec<usize>,
}

impl Voice {
    /// Build a voice from notes in non-decreasing start-time order.
    ///
    /// The active set's capacity is sized to the worst-case window
    /// overlap up front, so `sample` never allocates.
    pub fn new(notes: Vec<Note>) -> Self {
        let capacity = max_overlap(&notes);
        Self {
            notes,
            index: 0,
            active: Vec::with_capacity(capacity),
        }
    }

    /// Current amplitude at `time`. Calls must use non-decreasing
    /// times within a play session.
    pub fn sample(&mut self, time: f64) -> f64 {
        // Skip notes whose whole window is already behind us.
        while self.index < self.notes.len() && self.notes[self.index].expired(time) {
            self.index += 1;
        }
        // Activate every note whose window has opened. If the next
        // note is still pending we are resting between notes.
        while self.index < self.notes.len() && !self.notes[self.index].pending(time) {
            self.active.push(self.index);
            self.index += 1;
        }
        let notes = &self.notes;
        let sum: f64 = self.active.iter().map(|&i| notes[i].play(time)).sum();
        self.active.retain(|&i| !notes[i].expired(time));
        sum
    }

    /// True when every note has been consumed and nothing sounds.
    pub fn finished(&self) -> bool {
        self.index == self.notes.len() && self.active.is_empty()
    }

    /// Rewind the cursor for another pass over the same notes.
    pub fn reset(&mut self) {
        self.index = 0;
        self.active.clear();
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }
}

/// Worst-case number of simultaneously sounding notes: the maximum
/// overlap of the notes' [start, start + duration + release] windows.
fn max_overlap(notes: &[Note]) -> usize {
    let mut events: Vec<(f64, i32)> = Vec::with_capacity(notes.len() * 2);
    for note in notes {
        events.push((note.start_time, 1));
        events.push((note.end_time(), -1));
    }
    // Starts sort before ends at equal times: a note beginning the
    // instant another expires briefly coexists with it.
    events.sort_by(|a, b| a.0.total_cmp(&b.0).then(b.1.cmp(&a.1)));
    let mut current = 0i32;
    let mut max = 0i32;
    for (_, delta) in events {
        current += delta;
        max = max.max(current);
    }
    max as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{Envelope, Instrument, Oscillator};

    fn flat_instrument() -> Instrument {
        // Unit gain for the whole note, no release tail: makes
        // amplitudes exact in tests.
        struct Unit;
        impl crate::synth::envelope::EnvelopeShape for Unit {
            fn gain(&self, _time: f64, _release_time: f64) -> f64 {
                1.0
            }
            fn release_length(&self) -> f64 {
                0.0
            }
        }
        Instrument::new(Oscillator::Square, Envelope::custom(Unit))
    }

    fn note_at(start: f64, duration: f64, volume: f64) -> Note {
        Note::new(flat_instrument(), 1.0, start, duration, volume)
    }

    #[test]
    fn test_note_lifecycle() {
        let note = Note::new(Instrument::sine(), 440.0, 1.0, 0.5, 0.5);
        assert!(note.pending(0.9));
        assert!(!note.pending(1.0));
        assert!(!note.expired(1.55));
        // Window closes after duration plus the 50 ms release tail.
        assert!(note.expired(1.5501));
    }

    #[test]
    fn test_note_release_argument() {
        let instr = Instrument::new(
            Oscillator::Square,
            Envelope::ar(1.0, 0.0, 1.0),
        );
        let note = Note::new(instr, 0.25, 0.0, 1.0, 1.0);
        // Held: full gain. Square of 0.25 Hz is +1 for the first two
        // seconds, so the sample equals the gain directly.
        assert_eq!(note.play(0.5), 1.0);
        // Past the duration the release ramp takes over.
        assert!((note.play(1.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_voice_sums_active_notes() {
        let mut voice = Voice::new(vec![
            note_at(0.0, 1.0, 0.25),
            note_at(0.0, 1.0, 0.25),
            note_at(2.0, 1.0, 0.5),
        ]);
        // Chord of the first two notes. Square at 1 Hz is +1 early
        // in the cycle.
        assert!((voice.sample(0.1) - 0.5).abs() < 1e-12);
        // Expired notes are swept from the active set on the call
        // that observes them expired; after that the rest is silent.
        voice.sample(1.2);
        assert_eq!(voice.sample(1.5), 0.0);
        assert!((voice.sample(2.1) - 0.5).abs() < 1e-12);
        assert!(!voice.finished());
        voice.sample(3.5);
        assert!(voice.finished());
    }

    #[test]
    fn test_voice_sample_bounded_by_volume_sum() {
        let mut voice = Voice::new(vec![
            note_at(0.0, 2.0, 0.3),
            note_at(0.5, 2.0, 0.4),
        ]);
        let volume_sum = 0.7;
        for i in 0..300 {
            let t = i as f64 * 0.01;
            let s = voice.sample(t);
            assert!(s.is_finite());
            assert!(s.abs() <= volume_sum + 1e-12);
        }
    }

    #[test]
    fn test_voice_skips_fully_passed_notes() {
        let mut voice = Voice::new(vec![note_at(0.0, 0.1, 1.0), note_at(5.0, 0.1, 1.0)]);
        // Jumping past the first note consumes it without activating.
        assert_eq!(voice.sample(3.0), 0.0);
        assert!(!voice.finished());
        assert!((voice.sample(5.05) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_voice_reset_replays() {
        let mut voice = Voice::new(vec![note_at(0.0, 0.5, 0.5)]);
        let first = voice.sample(0.1);
        voice.sample(1.0);
        assert!(voice.finished());
        voice.reset();
        assert!(!voice.finished());
        assert_eq!(voice.sample(0.1), first);
    }

    #[test]
    fn test_empty_voice_is_finished() {
        let mut voice = Voice::new(Vec::new());
        assert!(voice.finished());
        assert_eq!(voice.sample(0.0), 0.0);
    }

    #[test]
    fn test_max_overlap_sizes_active_set() {
        let notes = vec![
            note_at(0.0, 1.0, 0.1),
            note_at(0.0, 1.0, 0.1),
            note_at(0.5, 1.0, 0.1),
            note_at(3.0, 1.0, 0.1),
        ];
        assert_eq!(max_overlap(&notes), 3);
        let voice = Voice::new(notes);
        assert!(voice.active.capacity() >= 3);
    }
}
