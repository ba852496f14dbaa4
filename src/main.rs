use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use calliope::pitch::{note_names, PitchTable};
use calliope::score::Maestro;
use calliope::synth::instrument::harmonica_instruments;
use calliope::venue::Venue;

fn main() {
    env_logger::init();

    println!("Calliope Text-to-Audio Engine - Basic Demo");
    println!("==========================================\n");

    // Two voices of a C major arpeggio, an octave apart, on the
    // layered harmonica.
    let tune = [
        "T120 L8 O4 C E G >C G E C2",
        "T120 L8 O3 ML C E G >C G E C2",
    ];
    let table = PitchTable::default();
    let maestro =
        match Maestro::from_lines(&tune, &harmonica_instruments(), table.frequencies()) {
            Ok(maestro) => maestro,
            Err(e) => {
                eprintln!("Demo tune failed to parse: {}", e);
                return;
            }
        };

    let names = note_names();
    for (i, voice) in maestro.voices().iter().enumerate() {
        let name = voice
            .notes()
            .first()
            .and_then(|n| {
                table
                    .frequencies()
                    .iter()
                    .position(|&f| f == n.frequency())
            })
            .map(|idx| names[idx].as_str())
            .unwrap_or("-");
        println!(
            "Voice {}: {} notes, opening on {}",
            i + 1,
            voice.notes().len(),
            name
        );
    }

    let (mut venue, mut handle) = Venue::new();
    if handle.queue_music(maestro).is_err() {
        eprintln!("Could not queue the demo tune");
        return;
    }
    let done = Arc::new(AtomicBool::new(false));
    let finished = done.clone();
    venue.set_idle_callback(move || finished.store(true, Ordering::Release));

    let sample_rate = 44100.0;
    let step = 1.0 / sample_rate;
    let mut count = 0usize;
    let mut peak = 0.0f64;
    while !done.load(Ordering::Acquire) {
        let sample = venue.get_sample(0, count as f64 * step, step);
        peak = peak.max(sample.abs());
        count += 1;
    }

    println!("\nRendered {} samples at {} Hz", count, sample_rate);
    println!(
        "Length: {:.3}s, peak amplitude {:.3}",
        count as f64 / sample_rate,
        peak
    );
    println!("\n✓ Demo complete!");
}
