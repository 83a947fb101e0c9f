//! Glitch: a tiny expression language for live-coded, sample-by-sample sound.
//!
//! A program is a single expression evaluated once per output sample. It is
//! compiled by [`session::Controller::compile`] and played by a
//! [`session::Session`], either inside the cpal callback of
//! [`audio::AudioEngine`] or offline.
//!
//! ```
//! use glitch::session::Session;
//!
//! let mut session = Session::new(8000, 42);
//! session.compile("t * 2 & t >> 4").unwrap();
//! let first: Vec<f32> = (0..4).map(|_| session.eval_sample()).collect();
//! assert!(first.iter().all(|s| (-1.0..1.0).contains(s)));
//! ```

pub mod audio;
pub mod config;
pub mod expr;
pub mod library;
pub mod midi;
pub mod samples;
pub mod session;
