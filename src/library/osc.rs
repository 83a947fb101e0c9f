//! Oscillator primitives: `sin`, `tri`, `saw`, `sqr` and the `fm` operator.

use std::f32::consts::PI;

use super::{arg, denorm, Env};
use crate::expr::Expr;

/// Available waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    Sine,
    Triangle,
    Saw,
    Square,
}

/// Bipolar value of `waveform` at `phase` in [0, 1).
///
/// `width` is the duty cycle of the square wave and ignored otherwise.
pub fn shape(waveform: Waveform, phase: f32, width: f32) -> f32 {
    match waveform {
        Waveform::Sine => (phase * 2.0 * PI).sin(),
        Waveform::Triangle => {
            let w = phase + 0.25;
            -1.0 + 4.0 * (w - w.round()).abs()
        }
        Waveform::Saw => 2.0 * (phase - phase.round()),
        Waveform::Square => {
            if phase - phase.floor() < width {
                1.0
            } else {
                -1.0
            }
        }
    }
}

/// Running state of one oscillator call site.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OscState {
    /// Position within the current cycle.
    pub phase: f32,
    /// Frequency seen on the previous sample; the phase advances by it.
    pub freq: f32,
}

impl OscState {
    fn advance(&mut self, sample_rate: f32) {
        self.phase += self.freq / sample_rate;
        if self.phase > 1.0 {
            self.phase -= 1.0;
        }
    }
}

/// `sin/tri/saw(freq)`, `sqr(freq, width = 0.5)`.
///
/// A NaN frequency holds the phase where it is and yields NaN.
pub fn oscillator(waveform: Waveform, state: &mut OscState, args: &mut [Expr], env: &mut Env) -> f32 {
    let freq = arg(args, 0, f32::NAN, env);
    if freq.is_nan() {
        return f32::NAN;
    }
    state.advance(env.sample_rate());
    state.freq = freq;
    let width = match waveform {
        Waveform::Square => arg(args, 1, 0.5, env),
        _ => 0.5,
    };
    denorm(shape(waveform, state.phase, width))
}

/// Running state of one `fm` call site: a carrier and three modulators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FmState {
    pub freq: f32,
    /// Set by a NaN frequency; cleared at the next upward zero crossing.
    pub sync: bool,
    prev: f32,
    carrier: f32,
    mod1: f32,
    mod2: f32,
    mod3: f32,
}

fn wrap(phase: &mut f32, inc: f32) {
    *phase += inc;
    if *phase > 1.0 {
        *phase -= 1.0;
    }
}

/// `fm(freq, mf1, mi1, mf2, mi2, mf3, mi3)`.
///
/// Modulator 3 feeds modulators 1 and 2, which both feed the carrier. `mfN`
/// are frequency ratios against `freq`, `miN` modulation indices.
pub fn fm(state: &mut FmState, args: &mut [Expr], env: &mut Env) -> f32 {
    let freq = arg(args, 0, f32::NAN, env);
    let mf1 = arg(args, 1, 0.0, env);
    let mi1 = arg(args, 2, 0.0, env);
    let mf2 = arg(args, 3, 0.0, env);
    let mi2 = arg(args, 4, 0.0, env);
    let mf3 = arg(args, 5, 0.0, env);
    let mi3 = arg(args, 6, 0.0, env);

    let step = state.freq / env.sample_rate();
    wrap(&mut state.mod3, mf3 * step);
    wrap(&mut state.mod2, mf2 * step);
    wrap(&mut state.mod1, mf1 * step);
    wrap(&mut state.carrier, step);

    let v3 = mi3 * (2.0 * PI * state.mod3).sin();
    let v2 = mi2 * (2.0 * PI * (state.mod2 + v3)).sin();
    let v1 = mi1 * (2.0 * PI * (state.mod1 + v3)).sin();
    let v0 = (2.0 * PI * (state.carrier + v1 + v2)).sin();

    if freq.is_nan() {
        state.sync = true;
        return f32::NAN;
    }
    state.freq = freq;

    if state.sync && v0 >= 0.0 && state.prev <= 0.0 {
        state.sync = false;
        state.carrier = 0.0;
        state.mod1 = 0.0;
        state.mod2 = 0.0;
        state.mod3 = 0.0;
    }
    state.prev = v0;

    denorm(v0)
}
