//! Audio callback: runs on the cpal audio thread.
//!
//! Drains commands from the ring buffer, then evaluates the session once per
//! output frame and copies the sample to every channel.

use ringbuf::traits::Consumer;
use ringbuf::HeapCons;

use super::command::AudioCommand;
use crate::session::Session;

/// State that lives on the audio thread. Accessed only from the cpal callback.
pub struct AudioCallback {
    consumer: HeapCons<AudioCommand>,
    session: Session,
    volume: f32,
    paused: bool,
    channels: usize,
}

impl AudioCallback {
    pub fn new(consumer: HeapCons<AudioCommand>, session: Session, channels: u16) -> Self {
        Self {
            consumer,
            session,
            volume: 1.0,
            paused: false,
            channels: channels.max(1) as usize,
        }
    }

    /// Called by cpal for each buffer of interleaved frames.
    pub fn process(&mut self, output: &mut [f32]) {
        while let Some(cmd) = self.consumer.try_pop() {
            match cmd {
                AudioCommand::SetVolume(v) => self.volume = v.clamp(0.0, 1.0),
                AudioCommand::Pause => self.paused = true,
                AudioCommand::Resume => self.paused = false,
            }
        }

        if self.paused {
            output.fill(0.0);
            return;
        }
        for frame in output.chunks_mut(self.channels) {
            let sample = self.session.eval_sample() * self.volume;
            frame.fill(sample);
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::{
        traits::{Producer, Split},
        HeapRb,
    };

    fn setup(source: &str, channels: u16) -> (ringbuf::HeapProd<AudioCommand>, AudioCallback) {
        let rb = HeapRb::<AudioCommand>::new(16);
        let (prod, cons) = rb.split();
        let session = Session::new(8000, 1);
        session.compile(source).unwrap();
        (prod, AudioCallback::new(cons, session, channels))
    }

    #[test]
    fn one_sample_per_frame() {
        let (_prod, mut callback) = setup("t * 32", 2);
        let mut output = vec![9.0f32; 8];
        callback.process(&mut output);
        // t is written after each sample, so it trails the frame by one.
        assert_eq!(output, vec![-1.0, -1.0, -1.0, -1.0, -0.75, -0.75, -0.5, -0.5]);
        assert_eq!(callback.session().frame(), 4);
    }

    #[test]
    fn applies_volume() {
        let (mut prod, mut callback) = setup("192", 1);
        prod.try_push(AudioCommand::SetVolume(0.5)).unwrap();
        let mut output = vec![0.0f32; 2];
        callback.process(&mut output);
        assert_eq!(output, vec![0.25, 0.25]);
    }

    #[test]
    fn volume_clamps_to_range() {
        let (mut prod, mut callback) = setup("192", 1);
        prod.try_push(AudioCommand::SetVolume(1.5)).unwrap();
        let mut output = vec![0.0f32; 1];
        callback.process(&mut output);
        assert_eq!(output[0], 0.5);
    }

    #[test]
    fn pause_freezes_the_session() {
        let (mut prod, mut callback) = setup("192", 1);
        prod.try_push(AudioCommand::Pause).unwrap();
        let mut output = vec![9.0f32; 4];
        callback.process(&mut output);
        assert!(output.iter().all(|&s| s == 0.0));
        assert_eq!(callback.session().frame(), 0);

        prod.try_push(AudioCommand::Resume).unwrap();
        callback.process(&mut output);
        assert!(output.iter().all(|&s| s == 0.5));
        assert_eq!(callback.session().frame(), 4);
    }
}
