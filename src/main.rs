//! glitch: play or render a live-coded expression file.
//!
//! In live mode the file is watched and recompiled whenever it changes; the
//! new program takes over at the next beat (or sample, without `bpm`).

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use glitch::audio::{self, AudioEngine};
use glitch::config::{default_config_path, Config};
use glitch::midi::MidiInput;
use glitch::samples::SampleLibrary;
use glitch::session::{Controller, Session};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "glitch", version)]
#[command(about = "Sample-by-sample expression synthesizer", long_about = None)]
struct Cli {
    /// Program file
    #[arg(required_unless_present = "list_midi")]
    file: Option<PathBuf>,

    /// Render to a WAV file instead of playing
    #[arg(short, long, value_name = "OUT")]
    render: Option<PathBuf>,

    /// Length of the render in seconds
    #[arg(short, long, default_value = "10.0")]
    seconds: f32,

    /// Sample library: one sub-directory of WAV files per sample function
    #[arg(long, value_name = "DIR")]
    samples: Option<PathBuf>,

    /// Sample rate for rendering (live mode uses the device rate)
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Seed for r() and the drum kit
    #[arg(long)]
    seed: Option<u64>,

    /// Master volume 0.0-1.0
    #[arg(long)]
    volume: Option<f32>,

    /// MIDI input device (substring match)
    #[arg(long)]
    midi: Option<String>,

    /// List MIDI input devices and exit
    #[arg(long)]
    list_midi: bool,

    /// Configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.list_midi {
        let devices = MidiInput::list_devices();
        if devices.is_empty() {
            println!("no MIDI input devices");
        }
        for name in devices {
            println!("{name}");
        }
        return Ok(());
    }

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = Config::load(&config_path)?;
    apply_overrides(&mut config, &cli);

    let Some(file) = cli.file.as_deref() else {
        return Err("no program file given".into());
    };

    match cli.render.as_deref() {
        Some(out) => render(file, out, cli.seconds, &config),
        None => play(file, &config),
    }
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(sample_rate) = cli.sample_rate {
        config.sample_rate = sample_rate;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(volume) = cli.volume {
        config.volume = volume;
    }
    if let Some(dir) = &cli.samples {
        config.samples_dir = Some(dir.clone());
    }
    if let Some(device) = &cli.midi {
        config.midi.device_name = Some(device.clone());
    }
}

/// Create a session at `sample_rate` with the configured sample library.
fn build_session(config: &Config, sample_rate: u32) -> Result<Session, Box<dyn Error>> {
    let mut session = Session::new(sample_rate, config.seed);
    if let Some(dir) = &config.samples_dir {
        let library = SampleLibrary::load_dir(dir, sample_rate)?;
        for name in library.names() {
            if let Err(e) = session.register_sample_function(name) {
                warn!(name, error = %e, "sample set not registered");
            }
        }
        session.set_loader(Some(Arc::new(library)));
    }
    Ok(session)
}

fn render(file: &Path, out: &Path, seconds: f32, config: &Config) -> Result<(), Box<dyn Error>> {
    let mut session = build_session(config, config.sample_rate)?;
    session.compile(&fs::read_to_string(file)?)?;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(out, spec)?;
    let frames = (seconds.max(0.0) as f64 * config.sample_rate as f64) as u64;
    let volume = config.volume.clamp(0.0, 1.0);
    for _ in 0..frames {
        let sample = session.eval_sample() * volume;
        writer.write_sample((sample * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;
    info!(out = %out.display(), frames, "render finished");
    Ok(())
}

fn play(file: &Path, config: &Config) -> Result<(), Box<dyn Error>> {
    let (sample_rate, channels) = audio::default_output_config()?;
    let session = build_session(config, sample_rate)?;
    let controller = session.controller();

    let mut modified = modified_time(file);
    compile_file(&controller, file);

    let mut engine = AudioEngine::with_config(session, sample_rate, channels)?;
    engine.set_volume(config.volume)?;

    let _midi = if config.midi.device_name.is_some() {
        match MidiInput::start(&config.midi, controller.clone()) {
            Ok(input) => Some(input),
            Err(e) => {
                warn!("MIDI input unavailable: {e}");
                None
            }
        }
    } else {
        None
    };

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))?;

    info!(file = %file.display(), "playing, Ctrl-C to quit");
    while running.load(Ordering::SeqCst) {
        thread::sleep(POLL_INTERVAL);
        let current = modified_time(file);
        if current != modified {
            modified = current;
            compile_file(&controller, file);
        }
    }
    info!("stopped");
    Ok(())
}

fn modified_time(file: &Path) -> Option<SystemTime> {
    fs::metadata(file).and_then(|m| m.modified()).ok()
}

/// Compile the file's current contents. Errors are logged and the running
/// program keeps playing.
fn compile_file(controller: &Controller, file: &Path) {
    let source = match fs::read_to_string(file) {
        Ok(source) => source,
        Err(e) => {
            error!(file = %file.display(), "cannot read program: {e}");
            return;
        }
    };
    match controller.compile(&source) {
        Ok(()) => info!(file = %file.display(), "program compiled"),
        Err(e) => error!(file = %file.display(), "{e}"),
    }
}
