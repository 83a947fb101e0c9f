//! Commands sent from the main thread to the audio thread via ring buffer.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioCommand {
    /// Set master volume (0.0 to 1.0).
    SetVolume(f32),
    /// Output silence without advancing the session.
    Pause,
    Resume,
}
