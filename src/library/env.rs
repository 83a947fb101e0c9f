//! Breakpoint envelope: `env(signal, (dt, level), ...)`.
//!
//! Shapes the byte-centred `signal` with a piecewise-linear amplitude curve.
//! A NaN signal restarts the curve. Breakpoints are re-read every sample so
//! they can be modulated while the envelope runs.

use super::{arg, Env};
use crate::expr::{eval, Expr};

/// Segment length used until a breakpoint gives its own.
pub const DEFAULT_SEGMENT_SECS: f32 = 0.05;

/// Value returned once the last segment has finished.
pub const SILENCE: f32 = 128.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvState {
    /// Index of the running segment.
    pub segment: usize,
    /// Samples elapsed within the running segment.
    pub t: u64,
    durations: Vec<f32>,
    levels: Vec<f32>,
}

impl EnvState {
    /// Rebuild the breakpoint list from `args[1..]`.
    ///
    /// A first level below 1 gets an instant attack to full level in front;
    /// a last level above 0 gets a release to 0 behind, reusing the last
    /// segment length.
    fn load(&mut self, args: &mut [Expr], env: &mut Env) {
        self.durations.clear();
        self.levels.clear();
        let sample_rate = env.sample_rate();
        let mut dt = DEFAULT_SEGMENT_SECS;
        let mut level = 0.0;
        for (i, breakpoint) in args.iter_mut().enumerate().skip(1) {
            level = match breakpoint.as_pair_mut() {
                Some((time, value)) => {
                    dt = eval(time, env);
                    eval(value, env)
                }
                None => eval(breakpoint, env),
            };
            if i == 1 && level < 1.0 {
                self.durations.push(0.0);
                self.levels.push(1.0);
            }
            self.durations.push(dt * sample_rate);
            self.levels.push(level);
        }
        if level > 0.0 {
            self.durations.push(dt * sample_rate);
            self.levels.push(0.0);
        }
    }

    /// Current amplitude, advancing one sample. `None` past the end.
    fn step(&mut self) -> Option<f32> {
        self.t += 1;
        let duration = *self.durations.get(self.segment)?;
        if self.t as f32 > duration {
            self.t = 0;
            self.segment += 1;
        }
        let duration = *self.durations.get(self.segment)?;
        let from = match self.segment {
            0 => 0.0,
            n => self.levels[n - 1],
        };
        let to = self.levels[self.segment];
        let k = if duration > 0.0 {
            (self.t as f32 / duration).min(1.0)
        } else {
            1.0
        };
        Some(from + (to - from) * k)
    }
}

pub fn envelope(state: &mut EnvState, args: &mut [Expr], env: &mut Env) -> f32 {
    let signal = arg(args, 0, f32::NAN, env);
    state.load(args, env);

    if signal.is_nan() {
        state.segment = 0;
        state.t = 0;
        return f32::NAN;
    }
    match state.step() {
        Some(amp) => (signal - 128.0) * amp + 128.0,
        None => SILENCE,
    }
}
