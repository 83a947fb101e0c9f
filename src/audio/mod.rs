//! Audio engine: cpal output stream driving a [`Session`].
//!
//! The engine moves the session onto the audio thread, where the callback
//! evaluates it once per output frame. The main thread keeps a
//! [`Controller`](crate::session::Controller) for compiling and sends
//! [`AudioCommand`]s through a lock-free ring buffer.

pub mod callback;
pub mod command;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{
    traits::{Producer, Split},
    HeapRb,
};
use tracing::{error, info};

pub use command::AudioCommand;

use crate::session::Session;
use callback::AudioCallback;

/// Ring buffer capacity (number of commands).
const RING_BUFFER_CAPACITY: usize = 64;

/// Audio engine errors.
#[derive(Debug)]
pub enum AudioError {
    /// No audio output device found.
    NoOutputDevice,
    /// Failed to query device configuration.
    DeviceConfig(String),
    /// Failed to build the audio stream.
    StreamBuild(String),
    /// Failed to start the audio stream.
    StreamPlay(String),
    /// Ring buffer is full; audio thread is not draining fast enough.
    BufferFull,
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::NoOutputDevice => write!(f, "no audio output device found"),
            AudioError::DeviceConfig(e) => write!(f, "device config error: {e}"),
            AudioError::StreamBuild(e) => write!(f, "stream build error: {e}"),
            AudioError::StreamPlay(e) => write!(f, "stream play error: {e}"),
            AudioError::BufferFull => write!(f, "audio command ring buffer is full"),
        }
    }
}

impl std::error::Error for AudioError {}

/// Sample rate and channel count of the default output device.
pub fn default_output_config() -> Result<(u32, u16), AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(AudioError::NoOutputDevice)?;
    let config = device
        .default_output_config()
        .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;
    Ok((config.sample_rate().0, config.channels()))
}

/// The audio engine. Owns the cpal stream and ring buffer producer.
pub struct AudioEngine {
    _stream: cpal::Stream,
    producer: ringbuf::HeapProd<AudioCommand>,
    sample_rate: u32,
    channels: u16,
}

impl AudioEngine {
    /// Start playing `session` with a specific sample rate and channel count.
    pub fn with_config(session: Session, sample_rate: u32, channels: u16) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;
        Self::build_with_device(&device, session, sample_rate, channels)
    }

    fn build_with_device(
        device: &cpal::Device,
        mut session: Session,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self, AudioError> {
        session.set_sample_rate(sample_rate);

        let rb = HeapRb::<AudioCommand>::new(RING_BUFFER_CAPACITY);
        let (producer, consumer) = rb.split();
        let mut audio_callback = AudioCallback::new(consumer, session, channels);

        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    audio_callback.process(data);
                },
                |err: cpal::StreamError| error!("audio stream error: {err}"),
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;

        info!(sample_rate, channels, "audio output started");
        Ok(Self {
            _stream: stream,
            producer,
            sample_rate,
            channels,
        })
    }

    /// Set master volume (clamped to 0.0..=1.0 on the audio thread).
    pub fn set_volume(&mut self, volume: f32) -> Result<(), AudioError> {
        self.send(AudioCommand::SetVolume(volume))
    }

    pub fn pause(&mut self) -> Result<(), AudioError> {
        self.send(AudioCommand::Pause)
    }

    pub fn resume(&mut self) -> Result<(), AudioError> {
        self.send(AudioCommand::Resume)
    }

    fn send(&mut self, command: AudioCommand) -> Result<(), AudioError> {
        self.producer
            .try_push(command)
            .map_err(|_| AudioError::BufferFull)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}
