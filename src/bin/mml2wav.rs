//! CLI tool for converting MML text files to WAV files
//!
//! Usage: mml2wav <input.mml> <output.wav>
//!
//! Each line of the input is one voice; lines starting with `/` are
//! comments. Exit codes: 0 success, 1 usage, 2 unreadable input,
//! 3 parse failure, 4 unwritable output.

use std::env;
use std::fs;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use calliope::pitch::PitchTable;
use calliope::score::Maestro;
use calliope::synth::instrument::default_instruments;
use calliope::venue::Venue;
use calliope::wav::write_wav_16bit;

const USAGE: &str = "Usage: mml2wav <input> <output>

Convert text music in Music Macro Language to a WAV file.

Arguments:
  input     MML text file, one voice per line ('/' lines are comments)
  output    Output WAV file path (44100 Hz, 16-bit mono PCM)
";

const SAMPLE_RATE: u32 = 44100;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("{}", USAGE);
        process::exit(1);
    }
    let input_path = &args[1];
    let output_path = &args[2];

    let content = match fs::read_to_string(input_path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error opening file {}: {}", input_path, e);
            process::exit(2);
        }
    };

    let voices: Vec<&str> = content
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with('/'))
        .collect();
    if voices.is_empty() {
        eprintln!("Error reading file, file contained no music: {}", input_path);
        process::exit(2);
    }

    let table = PitchTable::default();
    let bank = default_instruments();
    let maestro = match Maestro::from_lines(&voices, &bank, table.frequencies()) {
        Ok(maestro) => maestro,
        Err(e) => {
            eprintln!("Error parsing music file: {}", e);
            process::exit(3);
        }
    };

    let (mut venue, mut handle) = Venue::new();
    if handle.queue_music(maestro).is_err() {
        eprintln!("Error queueing music for playback");
        process::exit(1);
    }

    // The venue tells us when the program has played out.
    let done = Arc::new(AtomicBool::new(false));
    let finished = done.clone();
    venue.set_idle_callback(move || {
        finished.store(true, Ordering::Release);
    });

    let step = 1.0 / SAMPLE_RATE as f64;
    let mut samples: Vec<f64> = Vec::new();
    while !done.load(Ordering::Acquire) {
        let time = samples.len() as f64 / SAMPLE_RATE as f64;
        samples.push(venue.get_sample(0, time, step));
    }

    println!("Voices found: {}", voices.len());
    println!("Samples generated: {}", samples.len());
    println!(
        "Length: {:.3}s",
        samples.len() as f64 / SAMPLE_RATE as f64
    );

    if let Err(e) = write_wav_16bit(output_path, &samples, SAMPLE_RATE) {
        eprintln!("Error writing file {}: {}", output_path, e);
        process::exit(4);
    }
}
