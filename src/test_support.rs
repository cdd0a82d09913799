//! Synthetic audio for tests. Nothing binary is checked in; every fixture is
//! generated on the fly with `hound`.

use std::f64::consts::PI;
use std::io::Cursor;
use std::path::Path;

fn spec(sample_rate: u32, channels: u16) -> hound::WavSpec {
    hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

fn to_i16(sample: f64) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f64).round() as i16
}

/// `amplitude * sin(2π f t)` sampled at `rate` for `duration` seconds.
pub fn sine(frequency: f64, rate: f64, duration: f64, amplitude: f64) -> Vec<f64> {
    let count = (duration * rate).round() as usize;
    (0..count)
        .map(|i| amplitude * (2.0 * PI * frequency * i as f64 / rate).sin())
        .collect()
}

/// Write interleaved samples as a 16-bit PCM WAV file.
pub fn write_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[f64]) {
    let mut writer = hound::WavWriter::create(path, spec(sample_rate, channels)).unwrap();
    for &sample in samples {
        writer.write_sample(to_i16(sample)).unwrap();
    }
    writer.finalize().unwrap();
}

/// Mono 16-bit PCM WAV file contents, ready to be used as an upload body.
pub fn wav_bytes(sample_rate: u32, samples: &[f64]) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec(sample_rate, 1)).unwrap();
        for &sample in samples {
            writer.write_sample(to_i16(sample)).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
