//! MIDI controller support: note input driving the polyphony slots.

pub mod config;
pub mod input;
pub mod mapping;

pub use config::MidiConfig;
pub use input::{select_port, MidiError, MidiInput};
pub use mapping::{apply_midi_message, parse_midi_message, MidiEvent};
