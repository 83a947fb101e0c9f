//! Step sequencers: `seq` and `loop`.
//!
//! Both take a tempo followed by one argument per step:
//!
//! ```text
//! seq(bpm, step0, step1, ...)
//! seq((start_beat, bpm), ...)       start part-way into the pattern
//! seq(bpm, (mul, value), ...)       step lasts `mul` beats
//! seq(bpm, (mul, v0, v1, ...), ...) glide through v0..vn over the step
//! ```
//!
//! The first sample of every step returns NaN, which downstream envelopes
//! and drum voices read as a retrigger.

use super::{arg, Env};
use crate::expr::{eval, to_int, Expr};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeqState {
    init: bool,
    /// Length of the current step in beats.
    mul: f32,
    /// Index of the current step, counted from the start.
    pub beat: i64,
    /// Samples elapsed within the current step.
    pub t: u64,
    value: f32,
    values: Vec<f32>,
}

impl SeqState {
    /// Set up on first use, honouring a `(start_beat, bpm)` first argument.
    fn start(&mut self, args: &mut [Expr], env: &mut Env) {
        self.init = true;
        self.mul = 1.0;
        if let Some((beat, tempo)) = args.first_mut().and_then(Expr::as_pair_mut) {
            let beat = eval(beat, env);
            let tempo = eval(tempo, env);
            self.beat = i64::from(to_int(beat));
            let offset = (beat - beat.floor()) * env.sample_rate() / (tempo / 60.0);
            self.t = if offset.is_finite() && offset > 0.0 {
                offset as u64
            } else {
                0
            };
        }
    }

    /// Advance one sample. Returns the step index and the sample position
    /// within the step before advancing, or `None` when the tempo is NaN.
    fn tick(&mut self, args: &mut [Expr], env: &mut Env) -> Option<(Option<usize>, u64, f32)> {
        if !self.init {
            self.start(args, env);
        }
        let beat_len = env.sample_rate() / (arg(args, 0, f32::NAN, env) / 60.0) * self.mul;
        if beat_len.is_nan() {
            return None;
        }
        let t = self.t;
        self.t += 1;
        let steps = args.len().saturating_sub(1);
        if steps == 0 {
            return Some((None, t, beat_len));
        }
        let step = self.beat.rem_euclid(steps as i64) as usize;
        if self.t as f32 >= beat_len {
            self.t = 0;
            self.beat += 1;
        }
        Some((Some(step + 1), t, beat_len))
    }
}

/// `seq`: holds (or glides through) each step's value, evaluated once at
/// the start of the step.
pub fn seq(state: &mut SeqState, args: &mut [Expr], env: &mut Env) -> f32 {
    let (index, t, beat_len) = match state.tick(args, env) {
        Some(tick) => tick,
        None => return f32::NAN,
    };
    let index = match index {
        Some(index) => index,
        None => return if t == 0 { f32::NAN } else { 0.0 },
    };

    if t == 0 {
        state.values.clear();
        let step = &mut args[index];
        match step.as_pair_mut() {
            Some((mul, rest)) => {
                state.mul = eval(mul, env);
                if rest.is_pair() {
                    eval_list(rest, env, &mut state.values);
                } else {
                    state.value = eval(rest, env);
                }
            }
            None => {
                state.mul = 1.0;
                state.value = eval(step, env);
            }
        }
        return f32::NAN;
    }

    glide(&state.values, t as f32 / beat_len).unwrap_or(state.value)
}

/// Evaluate every element of a comma chain `a, (b, (c, ...))` in order.
fn eval_list(node: &mut Expr, env: &mut Env, out: &mut Vec<f32>) {
    match node.as_pair_mut() {
        Some((head, tail)) => {
            out.push(eval(head, env));
            eval_list(tail, env, out);
        }
        None => out.push(eval(node, env)),
    }
}

/// Linear interpolation through evenly spaced `points`, `pos` in [0, 1].
fn glide(points: &[f32], pos: f32) -> Option<f32> {
    match points {
        [] => None,
        [only] => Some(*only),
        _ => {
            let segments = (points.len() - 1) as f32;
            let p = (pos * segments).clamp(0.0, segments);
            let i = (p as usize).min(points.len() - 2);
            let k = p - i as f32;
            Some(points[i] + (points[i + 1] - points[i]) * k)
        }
    }
}

/// `loop`: re-evaluates the current step every sample.
pub fn looped(state: &mut SeqState, args: &mut [Expr], env: &mut Env) -> f32 {
    let (index, t, _) = match state.tick(args, env) {
        Some(tick) => tick,
        None => return f32::NAN,
    };
    let index = match index {
        Some(index) => index,
        None => return if t == 0 { f32::NAN } else { 0.0 },
    };

    let step = &mut args[index];
    let value = match step.as_pair_mut() {
        Some((mul, rest)) => {
            state.mul = eval(mul, env);
            eval(rest, env)
        }
        None => {
            state.mul = 1.0;
            eval(step, env)
        }
    };
    if t == 0 {
        f32::NAN
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{compile, VariableTable};
    use crate::library::{CallContext, FunctionRegistry};
    use assert_approx_eq::assert_approx_eq;

    const SR: u32 = 8000;

    fn run(src: &str, samples: usize) -> Vec<f32> {
        let vars = VariableTable::new();
        let mut expr = compile(src, &vars, &FunctionRegistry::with_builtins()).unwrap();
        let mut env = Env::new(SR, 1);
        (0..samples).map(|_| eval(&mut expr, &mut env)).collect()
    }

    #[test]
    fn steps_hold_for_one_beat() {
        // 120 bpm at 8 kHz: 4000 samples per beat.
        let out = run("seq(120, 1, 2, 3)", 12_001);
        assert!(out[0].is_nan());
        assert_eq!(out[1], 1.0);
        assert_eq!(out[3999], 1.0);
        assert!(out[4000].is_nan());
        assert_eq!(out[4001], 2.0);
        assert!(out[8000].is_nan());
        assert_eq!(out[8001], 3.0);
        assert!(out[12_000].is_nan());
    }

    #[test]
    fn pattern_wraps() {
        let out = run("seq(240, 5, 6)", 8_002);
        // 240 bpm: 2000 samples per beat.
        assert_eq!(out[2001], 6.0);
        assert_eq!(out[4001], 5.0);
        assert_eq!(out[6001], 6.0);
        assert_eq!(out[8001], 5.0);
    }

    #[test]
    fn step_multiplier_stretches_next_beat() {
        let out = run("seq(120, (2, 7), 8)", 12_002);
        assert_eq!(out[1], 7.0);
        // Still the first step: it lasts two beats.
        assert_eq!(out[7999], 7.0);
        assert!(out[8000].is_nan());
        assert_eq!(out[8001], 8.0);
    }

    #[test]
    fn glide_interpolates_across_the_step() {
        let out = run("seq(120, (1, 0, 100))", 4_000);
        assert!(out[0].is_nan());
        assert_approx_eq!(out[1000], 25.0, 1e-3);
        assert_approx_eq!(out[2000], 50.0, 1e-3);
        assert_approx_eq!(out[3000], 75.0, 1e-3);
    }

    #[test]
    fn glide_through_several_points() {
        let out = run("seq(120, (1, 0, 100, 0))", 4_000);
        assert_approx_eq!(out[1000], 50.0, 1e-3);
        assert_approx_eq!(out[2000], 100.0, 1e-3);
        assert_approx_eq!(out[3000], 50.0, 1e-3);
    }

    #[test]
    fn start_beat_offset() {
        let out = run("seq((1.5, 120), 10, 20, 30)", 2_002);
        // Half-way through step 1, whose value has not been evaluated yet.
        assert_eq!(out[0], 0.0);
        assert!(out[2000].is_nan());
        assert_eq!(out[2001], 30.0);
    }

    #[test]
    fn nan_tempo_is_silent() {
        let out = run("seq(0/0, 1, 2)", 10);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn nan_tempo_does_not_advance() {
        let vars = VariableTable::new();
        let mut expr = compile("seq(bpm, 1, 2)", &vars, &FunctionRegistry::with_builtins()).unwrap();
        let mut env = Env::new(SR, 1);
        vars.define("bpm", f32::NAN);
        for _ in 0..100 {
            assert!(eval(&mut expr, &mut env).is_nan());
        }
        match &expr {
            Expr::Call(call) => match &call.context {
                CallContext::Seq(state) => assert_eq!((state.beat, state.t), (0, 0)),
                other => panic!("expected sequencer, got {other:?}"),
            },
            other => panic!("expected call, got {other}"),
        }
    }

    #[test]
    fn tempo_only() {
        let out = run("seq(120)", 3);
        assert!(out[0].is_nan());
        assert_eq!(out[1], 0.0);
    }

    #[test]
    fn loop_pulses_then_tracks_value() {
        let vars = VariableTable::new();
        let mut expr = compile("loop(120, x, 7)", &vars, &FunctionRegistry::with_builtins()).unwrap();
        let mut env = Env::new(SR, 1);
        vars.define("x", 1.0);
        assert!(eval(&mut expr, &mut env).is_nan());
        assert_eq!(eval(&mut expr, &mut env), 1.0);
        vars.define("x", 2.0);
        assert_eq!(eval(&mut expr, &mut env), 2.0);
        for _ in 3..4000 {
            eval(&mut expr, &mut env);
        }
        assert!(eval(&mut expr, &mut env).is_nan());
        assert_eq!(eval(&mut expr, &mut env), 7.0);
    }

    #[test]
    fn glide_helper() {
        assert_eq!(glide(&[], 0.5), None);
        assert_eq!(glide(&[3.0], 0.5), Some(3.0));
        assert_eq!(glide(&[0.0, 10.0], 2.0), Some(10.0));
        assert_eq!(glide(&[0.0, 10.0], -1.0), Some(0.0));
    }
}
