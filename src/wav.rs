//! WAV file writer
//!
//! Thin sink over a rendered sample stream: 16-bit signed
//! little-endian PCM, mono, standard RIFF/WAVE header.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Write samples as a 16-bit PCM WAV file.
///
/// Samples are clamped to [-1, 1] and scaled by `i16::MAX`. The
/// sample rate only lands in the header; no resampling happens here.
pub fn write_wav_16bit<P: AsRef<Path>>(
    path: P,
    samples: &[f64],
    sample_rate: u32,
) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);

    let num_channels: u16 = 1;
    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate * num_channels as u32 * (bits_per_sample / 8) as u32;
    let block_align = num_channels * (bits_per_sample / 8);
    let data_size = samples.len() as u32 * 2;
    let file_size = 36 + data_size;

    // RIFF chunk
    file.write_all(b"RIFF")?;
    file.write_all(&file_size.to_le_bytes())?;
    file.write_all(b"WAVE")?;

    // fmt subchunk
    file.write_all(b"fmt ")?;
    file.write_all(&16u32.to_le_bytes())?;
    file.write_all(&1u16.to_le_bytes())?; // PCM
    file.write_all(&num_channels.to_le_bytes())?;
    file.write_all(&sample_rate.to_le_bytes())?;
    file.write_all(&byte_rate.to_le_bytes())?;
    file.write_all(&block_align.to_le_bytes())?;
    file.write_all(&bits_per_sample.to_le_bytes())?;

    // data subchunk
    file.write_all(b"data")?;
    file.write_all(&data_size.to_le_bytes())?;
    for &sample in samples {
        let quantized = (sample.clamp(-1.0, 1.0) * i16::MAX as f64) as i16;
        file.write_all(&quantized.to_le_bytes())?;
    }

    file.flush()
}
