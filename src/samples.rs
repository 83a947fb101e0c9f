//! WAV sample library for registered sample functions.
//!
//! Each sub-directory of the library root becomes one sample function named
//! after the directory; the `.wav` files inside, sorted by file name, are its
//! variants. Files are decoded to mono at the session sample rate on load.
//!
//! ```text
//! samples/
//!   kick/
//!     00.wav     kick(0)
//!     01.wav     kick(1)
//!   snare/
//!     a.wav      snare(0)
//! ```

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::library::SampleLoader;

/// Errors that can occur when loading samples.
#[derive(Debug)]
pub enum SampleError {
    /// WAV decoding error.
    Wav(hound::Error),
    /// Reading the library directory failed.
    Io(PathBuf, std::io::Error),
    /// The WAV file contains no samples.
    Empty,
}

impl std::fmt::Display for SampleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleError::Wav(e) => write!(f, "WAV error: {e}"),
            SampleError::Io(path, e) => write!(f, "{}: {e}", path.display()),
            SampleError::Empty => write!(f, "WAV file contains no samples"),
        }
    }
}

impl std::error::Error for SampleError {}

impl From<hound::Error> for SampleError {
    fn from(e: hound::Error) -> Self {
        SampleError::Wav(e)
    }
}

/// Decode a WAV stream to mono f32 at `target_sample_rate`.
///
/// Integer and float formats are accepted. Channels are averaged; a differing
/// source rate is converted by linear interpolation.
pub fn decode_wav<R: Read + Seek>(
    reader: R,
    target_sample_rate: u32,
) -> Result<Vec<f32>, SampleError> {
    let wav = hound::WavReader::new(reader)?;
    let spec = wav.spec();
    let channels = spec.channels.max(1) as usize;

    let raw: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_val = (1u64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            wav.into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<f32>, _>>()?
        }
        hound::SampleFormat::Float => wav.into_samples::<f32>().collect::<Result<Vec<f32>, _>>()?,
    };
    if raw.is_empty() {
        return Err(SampleError::Empty);
    }

    let mono: Vec<f32> = raw
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();

    Ok(if spec.sample_rate == target_sample_rate {
        mono
    } else {
        resample_linear(&mono, spec.sample_rate, target_sample_rate)
    })
}

/// Linear-interpolation resampling from `source_rate` to `target_rate`.
fn resample_linear(input: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if input.len() < 2 || source_rate == 0 || target_rate == 0 {
        return input.to_vec();
    }
    let ratio = source_rate as f64 / target_rate as f64;
    let output_len = (input.len() as f64 / ratio).ceil() as usize;
    (0..output_len)
        .map(|i| {
            let src_pos = i as f64 * ratio;
            let idx = src_pos as usize;
            let frac = (src_pos - idx as f64) as f32;
            if idx + 1 < input.len() {
                input[idx] * (1.0 - frac) + input[idx + 1] * frac
            } else {
                input[input.len() - 1]
            }
        })
        .collect()
}

/// Decoded sample sets keyed by function name.
#[derive(Debug, Default, Clone)]
pub struct SampleLibrary {
    sets: BTreeMap<String, Vec<Vec<f32>>>,
}

impl SampleLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `<root>/<name>/*.wav`.
    ///
    /// Files that fail to decode are skipped with a log line; directories
    /// without any usable file are left out.
    pub fn load_dir(root: &Path, sample_rate: u32) -> Result<Self, SampleError> {
        let mut library = Self::new();
        for dir in sorted_entries(root)? {
            if !dir.is_dir() {
                continue;
            }
            let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let mut variants = Vec::new();
            for file in sorted_entries(&dir)? {
                let is_wav = file
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
                if !is_wav {
                    continue;
                }
                let decoded = File::open(&file)
                    .map_err(|e| SampleError::Io(file.clone(), e))
                    .and_then(|f| decode_wav(BufReader::new(f), sample_rate));
                match decoded {
                    Ok(samples) => variants.push(samples),
                    Err(e) => debug!(file = %file.display(), error = %e, "skipping sample"),
                }
            }
            if !variants.is_empty() {
                library.insert(name, variants);
            }
        }
        info!(root = %root.display(), sets = library.len(), "sample library loaded");
        Ok(library)
    }

    pub fn insert(&mut self, name: &str, variants: Vec<Vec<f32>>) {
        self.sets.insert(name.to_string(), variants);
    }

    /// Function names, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    pub fn variants(&self, name: &str) -> usize {
        self.sets.get(name).map_or(0, Vec::len)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Variant indices wrap around the set; frames past the end are silent.
impl SampleLoader for SampleLibrary {
    fn load(&self, name: &str, variant: i32, frame: usize) -> f32 {
        let Some(set) = self.sets.get(name).filter(|s| !s.is_empty()) else {
            return 0.0;
        };
        let index = variant.rem_euclid(set.len() as i32) as usize;
        set[index].get(frame).copied().unwrap_or(0.0)
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, SampleError> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| SampleError::Io(dir.to_path_buf(), e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect::<Vec<_>>();
    entries.sort();
    Ok(entries)
}
