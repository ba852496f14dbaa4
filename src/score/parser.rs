//! Parser for Music Macro Language lines
//!
//! One line of MML describes one monophonic voice. Parsing is
//! character directed with a single character of lookahead; case is
//! folded and whitespace is ignored everywhere.
//!
//! Commands:
//! - `A`-`G`: play a note in the current octave, with suffixes
//!   `#`/`+` (sharp), `-` (flat), `1`-`64` (length override), `.`
//!   (dotted extension), `_` (tie), `'` (staccato), `^` (accent),
//!   `,` (chord: the next note starts at the same time)
//! - `>` / `<` / `On`: octave up / down / set (0-8)
//! - `Tn`: tempo in BPM (16-256); `Ln`: beat note (1-64)
//! - `Nn`: play table entry n (1-108), 0 is a rest
//! - `Pn` / `Rn`: rest, optional length and dots
//! - `ML`/`MN`/`MS`: legato / normal / staccato articulation;
//!   `MF`/`MB` are accepted and ignored
//! - `IQ`/`IT`/`IS`/`IW`/`IN`: builtin instruments; `IPn`:
//!   rectangular wave with duty n/100; `IXc`: instrument bank lookup
//! - `Vn`: volume n/100; `V` with dynamic markings `PPP` through
//!   `FFF`, optionally followed by `;`

use log::debug;

use crate::pitch::{NOTES_PER_OCTAVE, TOTAL_NOTES};
use crate::score::voice::{Note, Voice};
use crate::synth::instrument::{Instrument, InstrumentMap, DEFAULT_INSTRUMENT_KEY};

/// Semitone of each note letter A-G within its octave.
const SEMITONES: [i32; 7] = [9, 11, 0, 2, 4, 5, 7];

const OCTAVES: i32 = 9;
const TOTAL: i32 = TOTAL_NOTES as i32;

/// Parse errors. Each variant names the offending command or value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    UnknownCommand(char),
    UnknownMusicCommand(char),
    UnknownInstrument(char),
    UnknownVolume(char),
    MissingNumber,
    UnexpectedEnd,
    SharpAboveRange,
    FlatBelowRange,
    NoteLengthOutOfRange(u32),
    TempoOutOfRange(u32),
    OctaveOutOfRange(u32),
    OctaveAboveRange,
    OctaveBelowRange,
    NoteNumberOutOfRange(u32),
    DutyCycleOutOfRange(u32),
    VolumeOutOfRange(u32),
    WrongPitchCount(usize),
    NoDefaultInstrument,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::UnknownCommand(c) => {
                write!(f, "did not understand command component '{}'", c)
            }
            ParseError::UnknownMusicCommand(c) => {
                write!(f, "did not understand music ('M') command component '{}'", c)
            }
            ParseError::UnknownInstrument(c) => write!(f, "invalid instrument '{}'", c),
            ParseError::UnknownVolume(c) => {
                write!(f, "invalid volume specification '{}'", c)
            }
            ParseError::MissingNumber => write!(f, "command requires a value, none given"),
            ParseError::UnexpectedEnd => write!(f, "line ended in the middle of a command"),
            ParseError::SharpAboveRange => write!(f, "tried to sharp the highest note"),
            ParseError::FlatBelowRange => write!(f, "tried to flat the lowest note"),
            ParseError::NoteLengthOutOfRange(n) => write!(f, "invalid note length {}", n),
            ParseError::TempoOutOfRange(n) => {
                write!(f, "tempo {} is either too slow or too fast", n)
            }
            ParseError::OctaveOutOfRange(n) => write!(f, "set current octave too high ({})", n),
            ParseError::OctaveAboveRange => write!(f, "operation '>' exceeded octave range"),
            ParseError::OctaveBelowRange => write!(f, "operation '<' exceeded octave range"),
            ParseError::NoteNumberOutOfRange(n) => write!(f, "invalid note number {}", n),
            ParseError::DutyCycleOutOfRange(n) => {
                write!(f, "invalid duty cycle {} for a rectangular wave", n)
            }
            ParseError::VolumeOutOfRange(n) => write!(f, "invalid volume {}", n),
            ParseError::WrongPitchCount(n) => {
                write!(f, "pitch table has {} entries, expected {}", n, TOTAL_NOTES)
            }
            ParseError::NoDefaultInstrument => {
                write!(f, "no default instrument in the instrument bank")
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Character cursor over a line: whitespace stripped, case folded,
/// one character of lookahead.
struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    fn new(input: &str) -> Self {
        let chars = input
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        Self { chars, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn consume(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    /// Read a greedy digit sequence. At least one digit is required.
    fn number(&mut self) -> Result<u32, ParseError> {
        let mut value: u32 = 0;
        let mut any = false;
        while let Some(c) = self.peek() {
            match c.to_digit(10) {
                Some(d) => {
                    self.consume();
                    value = value.saturating_mul(10).saturating_add(d);
                    any = true;
                }
                None => break,
            }
        }
        if any {
            Ok(value)
        } else {
            Err(ParseError::MissingNumber)
        }
    }
}

/// Parser state for one line. Every field resets per line.
struct LineState {
    octave: i32,
    beat_note: u32,
    tempo: u32,
    articulation: f64,
    volume: f64,
    time: f64,
    note_length: f64,
}

impl LineState {
    fn new() -> Self {
        let beat_note = 4;
        let tempo = 120;
        Self {
            octave: 4,
            beat_note,
            tempo,
            articulation: 7.0 / 8.0,
            volume: 0.5,
            time: 0.0,
            // Seconds per note: tempo counts quarter notes per
            // minute, so a whole note lasts 240/tempo seconds.
            note_length: beat_length(beat_note, tempo),
        }
    }

    fn retime(&mut self) {
        self.note_length = beat_length(self.beat_note, self.tempo);
    }
}

fn beat_length(beat_note: u32, tempo: u32) -> f64 {
    240.0 / (beat_note * tempo) as f64
}

/// Parse one MML line into a voice.
///
/// The instrument bank must contain a default instrument under
/// [`DEFAULT_INSTRUMENT_KEY`]; the pitch table must have all 108
/// entries. Failure leaves nothing behind: either the whole line
/// parses or no notes exist.
pub fn parse_voice(
    input: &str,
    instruments: &InstrumentMap,
    pitches: &[f64],
) -> Result<Voice, ParseError> {
    if pitches.len() != TOTAL_NOTES {
        return Err(ParseError::WrongPitchCount(pitches.len()));
    }
    let mut instrument = instruments
        .get(&DEFAULT_INSTRUMENT_KEY)
        .ok_or(ParseError::NoDefaultInstrument)?
        .clone();

    let mut state = LineState::new();
    let mut notes: Vec<Note> = Vec::new();
    let mut cursor = Cursor::new(input);

    while let Some(command) = cursor.peek() {
        match command {
            'A'..='G' => {
                cursor.consume();
                parse_note(&mut cursor, &mut state, &instrument, pitches, command, &mut notes)?;
            }

            '>' => {
                cursor.consume();
                state.octave += 1;
                if state.octave == OCTAVES {
                    return Err(ParseError::OctaveAboveRange);
                }
            }

            '<' => {
                cursor.consume();
                state.octave -= 1;
                if state.octave == -1 {
                    return Err(ParseError::OctaveBelowRange);
                }
            }

            'O' => {
                cursor.consume();
                let octave = cursor.number()?;
                if octave >= OCTAVES as u32 {
                    return Err(ParseError::OctaveOutOfRange(octave));
                }
                state.octave = octave as i32;
            }

            'T' => {
                cursor.consume();
                let tempo = cursor.number()?;
                if !(16..=256).contains(&tempo) {
                    return Err(ParseError::TempoOutOfRange(tempo));
                }
                state.tempo = tempo;
                state.retime();
            }

            'L' => {
                cursor.consume();
                let beat_note = cursor.number()?;
                if !(1..=64).contains(&beat_note) {
                    return Err(ParseError::NoteLengthOutOfRange(beat_note));
                }
                state.beat_note = beat_note;
                state.retime();
            }

            'N' => {
                cursor.consume();
                let number = cursor.number()?;
                if number > TOTAL as u32 {
                    return Err(ParseError::NoteNumberOutOfRange(number));
                }
                if number != 0 {
                    notes.push(Note::new(
                        instrument.clone(),
                        pitches[number as usize - 1],
                        state.time,
                        state.note_length * state.articulation,
                        state.volume,
                    ));
                }
                state.time += state.note_length;
            }

            // Pauses are rests.
            'P' | 'R' => {
                cursor.consume();
                let mut length = state.note_length;
                // The length is optional; without one the rest lasts
                // the current note length.
                if matches!(cursor.peek(), Some('0'..='9')) {
                    let n = cursor.number()?;
                    if !(1..=64).contains(&n) {
                        return Err(ParseError::NoteLengthOutOfRange(n));
                    }
                    length = beat_length(n, state.tempo);
                }
                let mut next_dot = length * 0.5;
                while cursor.peek() == Some('.') {
                    cursor.consume();
                    length += next_dot;
                    next_dot *= 0.5;
                }
                state.time += length;
            }

            'M' => {
                cursor.consume();
                match cursor.peek() {
                    // Foreground/background playback selection is
                    // not a thing here; accept and ignore.
                    Some('F') | Some('B') => {
                        cursor.consume();
                    }
                    Some('L') => {
                        cursor.consume();
                        state.articulation = 1.0;
                    }
                    Some('N') => {
                        cursor.consume();
                        state.articulation = 7.0 / 8.0;
                    }
                    Some('S') => {
                        cursor.consume();
                        state.articulation = 3.0 / 4.0;
                    }
                    Some(c) => return Err(ParseError::UnknownMusicCommand(c)),
                    None => return Err(ParseError::UnexpectedEnd),
                }
            }

            'I' => {
                cursor.consume();
                match cursor.peek() {
                    Some('Q') => {
                        cursor.consume();
                        instrument = Instrument::square();
                    }
                    Some('T') => {
                        cursor.consume();
                        instrument = Instrument::triangle();
                    }
                    Some('S') => {
                        cursor.consume();
                        instrument = Instrument::sine();
                    }
                    Some('W') => {
                        cursor.consume();
                        instrument = Instrument::saw();
                    }
                    Some('N') => {
                        cursor.consume();
                        instrument = Instrument::noise();
                    }
                    Some('X') => {
                        cursor.consume();
                        let key = cursor.peek().ok_or(ParseError::UnexpectedEnd)?;
                        instrument = instruments
                            .get(&key)
                            .ok_or(ParseError::UnknownInstrument(key))?
                            .clone();
                        cursor.consume();
                    }
                    Some('P') => {
                        cursor.consume();
                        let duty = cursor.number()?;
                        if !(1..=99).contains(&duty) {
                            return Err(ParseError::DutyCycleOutOfRange(duty));
                        }
                        instrument = Instrument::rectangular(duty as f64 / 100.0);
                    }
                    Some(c) => return Err(ParseError::UnknownInstrument(c)),
                    None => return Err(ParseError::UnexpectedEnd),
                }
            }

            'V' => {
                cursor.consume();
                parse_volume(&mut cursor, &mut state)?;
            }

            c => return Err(ParseError::UnknownCommand(c)),
        }
    }

    debug!(
        "parsed {} notes spanning {:.3}s",
        notes.len(),
        state.time
    );
    Ok(Voice::new(notes))
}

/// A note letter and its modifier suffixes. The per-note temporaries
/// start from the line state and are committed on the first
/// non-modifier character.
fn parse_note(
    cursor: &mut Cursor,
    state: &mut LineState,
    instrument: &Instrument,
    pitches: &[f64],
    letter: char,
    notes: &mut Vec<Note>,
) -> Result<(), ParseError> {
    let mut note = state.octave * NOTES_PER_OCTAVE as i32 + SEMITONES[(letter as u8 - b'A') as usize];

    let mut temp_duration = state.articulation;
    let mut temp_length = state.note_length;
    let mut temp_volume = state.volume;
    let mut next_dot = temp_length * 0.5;
    let mut advance = true;

    loop {
        match cursor.peek() {
            Some('+') | Some('#') => {
                cursor.consume();
                note += 1;
                if note == TOTAL {
                    return Err(ParseError::SharpAboveRange);
                }
            }
            Some('-') => {
                cursor.consume();
                note -= 1;
                if note == -1 {
                    return Err(ParseError::FlatBelowRange);
                }
            }
            Some('.') => {
                cursor.consume();
                temp_length += next_dot;
                next_dot *= 0.5;
            }
            // A length override. It must come before any dots, since
            // it resets the dot baseline.
            Some('1'..='9') => {
                let length = cursor.number()?;
                if !(1..=64).contains(&length) {
                    return Err(ParseError::NoteLengthOutOfRange(length));
                }
                temp_length = beat_length(length, state.tempo);
                next_dot = temp_length * 0.5;
            }
            Some('_') => {
                cursor.consume();
                temp_duration = 1.0;
            }
            Some('\'') => {
                cursor.consume();
                temp_duration = 3.0 / 4.0;
            }
            Some('^') => {
                cursor.consume();
                temp_volume = (temp_volume + 0.125).min(1.0);
            }
            // Chord continuation: emit without advancing so the next
            // note starts at the same time.
            Some(',') => {
                cursor.consume();
                advance = false;
                break;
            }
            _ => break,
        }
    }

    notes.push(Note::new(
        instrument.clone(),
        pitches[note as usize],
        state.time,
        temp_length * temp_duration,
        temp_volume,
    ));
    if advance {
        state.time += temp_length;
    }
    Ok(())
}

/// Volume: either a percentage or a dynamic marking. Markings may be
/// followed by a `;` so that a note letter can follow them.
fn parse_volume(cursor: &mut Cursor, state: &mut LineState) -> Result<(), ParseError> {
    match cursor.peek() {
        Some('0'..='9') => {
            let volume = cursor.number()?;
            if volume > 100 {
                return Err(ParseError::VolumeOutOfRange(volume));
            }
            state.volume = volume as f64 / 100.0;
        }
        Some('P') => {
            cursor.consume();
            if cursor.peek() == Some('P') {
                cursor.consume();
                if cursor.peek() == Some('P') {
                    cursor.consume();
                    state.volume = 0.125;
                } else {
                    state.volume = 0.25;
                }
            } else {
                state.volume = 0.375;
            }
            consume_separator(cursor);
        }
        Some('M') => {
            cursor.consume();
            match cursor.peek() {
                Some('P') => {
                    cursor.consume();
                    state.volume = 0.5;
                }
                Some('F') => {
                    cursor.consume();
                    state.volume = 0.625;
                }
                Some(c) => return Err(ParseError::UnknownVolume(c)),
                None => return Err(ParseError::UnexpectedEnd),
            }
            consume_separator(cursor);
        }
        Some('F') => {
            cursor.consume();
            if cursor.peek() != Some('F') {
                state.volume = 0.75;
            } else {
                cursor.consume();
                if cursor.peek() != Some('F') {
                    state.volume = 0.875;
                } else {
                    cursor.consume();
                    state.volume = 1.0;
                }
            }
            consume_separator(cursor);
        }
        Some(c) => return Err(ParseError::UnknownVolume(c)),
        None => return Err(ParseError::UnexpectedEnd),
    }
    Ok(())
}

fn consume_separator(cursor: &mut Cursor) {
    if cursor.peek() == Some(';') {
        cursor.consume();
    }
}
