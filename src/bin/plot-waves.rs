//! Offline oscillator plotter
//!
//! Renders a couple of cycles of a named oscillator to an SVG chart.
//! Handy for eyeballing new waveforms without listening to them.

use calliope::synth::instrument::{SawLfo, SquareLfo};
use calliope::synth::Oscillator;
use plotters::prelude::*;

const FREQUENCY: f64 = 220.0;
const CYCLES: f64 = 2.0;
const POINTS: usize = 2000;

struct Args {
    shape_name: String,
    oscillator: Oscillator,
    output_path: String,
}

fn print_usage() {
    eprintln!("Usage: plot-waves <shape> <output.svg>");
    eprintln!();
    eprintln!("Shapes:");
    eprintln!("  sine, triangle, square, saw, noise, rectangular,");
    eprintln!("  square-lfo, saw-lfo");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  plot-waves triangle triangle.svg");
}

fn parse_args() -> Result<Args, Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        print_usage();
        return Err("Invalid number of arguments".into());
    }

    let shape_name = args[1].clone();
    let oscillator = match shape_name.as_str() {
        "sine" => Oscillator::Sine,
        "triangle" => Oscillator::Triangle,
        "square" => Oscillator::Square,
        "saw" => Oscillator::Saw,
        "noise" => Oscillator::Noise,
        "rectangular" => Oscillator::rectangular(0.25),
        "square-lfo" => Oscillator::custom(SquareLfo::new(0.001, 5.0)),
        "saw-lfo" => Oscillator::custom(SawLfo::new(0.001, 5.0)),
        other => return Err(format!("Unknown shape: {}", other).into()),
    };

    Ok(Args {
        shape_name,
        oscillator,
        output_path: args[2].clone(),
    })
}

fn create_plot(args: &Args, points: &[(f64, f64)]) -> Result<(), Box<dyn std::error::Error>> {
    let root = SVGBackend::new(&args.output_path, (800, 400)).into_drawing_area();
    root.fill(&WHITE)?;

    let max_time = CYCLES / FREQUENCY;
    let title = format!("{} at {} Hz", args.shape_name, FREQUENCY);

    let mut chart = ChartBuilder::on(&root)
        .caption(&title, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..max_time, -1.2f64..1.2f64)?;

    chart
        .configure_mesh()
        .x_desc("Time (s)")
        .y_desc("Sample")
        .x_labels(10)
        .y_labels(10)
        .draw()?;

    chart.draw_series(LineSeries::new(
        points.iter().copied(),
        BLUE.stroke_width(2),
    ))?;

    root.present()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = parse_args()?;

    println!("Oscillator Plot Generator");
    println!("=========================");
    println!("  Shape: {}", args.shape_name);
    println!("  Frequency: {} Hz", FREQUENCY);
    println!("  Cycles: {}", CYCLES);

    let max_time = CYCLES / FREQUENCY;
    let points: Vec<(f64, f64)> = (0..POINTS)
        .map(|i| {
            let t = i as f64 * max_time / POINTS as f64;
            (t, args.oscillator.sample(FREQUENCY, t))
        })
        .collect();

    let out_of_range = points.iter().filter(|(_, s)| s.abs() > 1.0).count();
    if out_of_range > 0 {
        println!("  ! {} samples fall outside [-1, 1]", out_of_range);
    }

    print!("  Creating plot... ");
    create_plot(&args, &points)?;
    println!("done");
    println!();
    println!("Output: {}", args.output_path);

    Ok(())
}
