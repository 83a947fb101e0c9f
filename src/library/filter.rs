//! One-pole filters: `lpf(signal, cutoff = 200)` and `hpf(signal, cutoff = 200)`.

use std::f32::consts::PI;

use super::{arg, Env};
use crate::expr::Expr;

pub const DEFAULT_CUTOFF: f32 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    LowPass,
    HighPass,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    /// Smoothed signal.
    pub value: f32,
}

/// Smoothing coefficient for `cutoff` Hz, recomputed every sample.
pub fn coefficient(cutoff: f32, sample_rate: f32) -> f32 {
    let wa = (PI * cutoff / sample_rate).tan();
    wa / (1.0 + wa)
}

pub fn filter(mode: Mode, state: &mut FilterState, args: &mut [Expr], env: &mut Env) -> f32 {
    let signal = arg(args, 0, f32::NAN, env);
    let cutoff = arg(args, 1, DEFAULT_CUTOFF, env);
    if signal.is_nan() || cutoff.is_nan() {
        return f32::NAN;
    }
    let a = coefficient(cutoff, env.sample_rate());
    state.value += (signal - state.value) * a;
    match mode {
        Mode::LowPass => state.value,
        Mode::HighPass => signal - state.value,
    }
}
