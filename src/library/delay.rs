//! Feedback delay line: `delay(signal, time, level, feedback)`.

use super::{arg, denorm, Env};
use crate::expr::Expr;

/// Longest delay line, in seconds. Longer times are clamped.
pub const MAX_DELAY_SECS: f32 = 10.0;

#[derive(Default, Clone, PartialEq)]
pub struct DelayState {
    /// Backing store. Only grows; entries at or past `filled` are zero.
    buf: Vec<f32>,
    /// Active line length.
    len: usize,
    pos: usize,
    /// Number of leading entries written since the last clear.
    filled: usize,
}

impl std::fmt::Debug for DelayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayState")
            .field("len", &self.len)
            .field("pos", &self.pos)
            .finish()
    }
}

impl DelayState {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Resize to `size` samples. Any change clears the line. Clearing only
    /// touches entries written since the previous clear, so a time that
    /// changes every sample stays cheap.
    fn resize(&mut self, size: usize) {
        if size == self.len {
            return;
        }
        self.buf[..self.filled].fill(0.0);
        self.filled = 0;
        self.pos = 0;
        if size > self.buf.len() && self.buf.try_reserve_exact(size - self.buf.len()).is_err() {
            self.len = 0;
            return;
        }
        if size > self.buf.len() {
            self.buf.resize(size, 0.0);
        }
        self.len = size;
    }

    /// Read the oldest entry, then overwrite it with feedback plus `input`.
    fn tick(&mut self, input: f32, level: f32, feedback: f32) -> f32 {
        let slot = &mut self.buf[self.pos];
        let out = *slot * level;
        *slot = *slot * feedback + input;
        self.filled = self.filled.max(self.pos + 1);
        self.pos = (self.pos + 1) % self.len;
        out
    }
}

/// Line length in samples for `time` seconds, clamped to [`MAX_DELAY_SECS`].
fn line_len(time: f32, sample_rate: f32) -> usize {
    let size = time.min(MAX_DELAY_SECS) * sample_rate;
    if size.is_finite() && size > 0.0 {
        size as usize
    } else {
        0
    }
}

/// The line holds `time` seconds of normalised signal. Each sample the
/// oldest entry is read (scaled by `level`), then overwritten with itself
/// times `feedback` plus the new input.
pub fn delay(state: &mut DelayState, args: &mut [Expr], env: &mut Env) -> f32 {
    let signal = arg(args, 0, f32::NAN, env);
    let time = arg(args, 1, 0.0, env);
    let level = arg(args, 2, 0.0, env);
    let feedback = arg(args, 3, 0.0, env).clamp(0.0, 1.0);

    state.resize(line_len(time, env.sample_rate()));
    if state.is_empty() {
        return signal;
    }

    let signal = (signal - 127.0) / 128.0;
    let signal = if signal.is_nan() { 0.0 } else { signal };
    let out = state.tick(signal, level, feedback);
    denorm(signal + out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{compile, eval, VariableTable};
    use crate::library::{CallContext, FunctionRegistry};
    use assert_approx_eq::assert_approx_eq;

    fn run(src: &str, samples: usize) -> (Vec<f32>, VariableTable) {
        let vars = VariableTable::new();
        let mut expr = compile(src, &vars, &FunctionRegistry::with_builtins()).unwrap();
        let mut env = Env::new(8000, 1);
        let out = (0..samples).map(|_| eval(&mut expr, &mut env)).collect();
        (out, vars)
    }

    #[test]
    fn impulse_echoes_after_delay_time() {
        // 0.001 s at 8 kHz = 8 samples. One impulse of +1 at sample 0.
        let (out, _) = run("delay((n = n + 1) == 1 && 255 || 127, 0.001, 0.5, 0)", 40);
        assert_approx_eq!(out[0], denorm(1.0), 1e-3);
        assert_approx_eq!(out[1], denorm(0.0), 1e-3);
        assert_approx_eq!(out[8], denorm(0.5), 1e-3);
        // No feedback: a single echo.
        assert_approx_eq!(out[16], denorm(0.0), 1e-3);
    }

    #[test]
    fn feedback_repeats_echo() {
        let (out, _) = run("delay((n = n + 1) == 1 && 255 || 127, 0.001, 1, 0.5)", 40);
        assert_approx_eq!(out[8], denorm(1.0), 1e-3);
        assert_approx_eq!(out[16], denorm(0.5), 1e-3);
        assert_approx_eq!(out[24], denorm(0.25), 1e-3);
    }

    #[test]
    fn zero_time_bypasses() {
        let (out, _) = run("delay(42, 0, 1, 1)", 3);
        assert!(out.iter().all(|&v| v == 42.0));
    }

    #[test]
    fn nan_input_is_treated_as_silence() {
        let (out, _) = run("delay(0/0, 0.001, 1, 0)", 3);
        assert!(out.iter().all(|&v| v == 128.0));
    }

    #[test]
    fn time_change_clears_line() {
        let vars = VariableTable::new();
        let mut expr = compile("delay(255, dt, 1, 1)", &vars, &FunctionRegistry::with_builtins()).unwrap();
        let mut env = Env::new(8000, 1);
        vars.define("dt", 0.001);
        for _ in 0..20 {
            eval(&mut expr, &mut env);
        }
        vars.define("dt", 0.002);
        // Freshly cleared: only the dry signal comes through.
        assert_approx_eq!(eval(&mut expr, &mut env), denorm(1.0), 1e-3);
        match &expr {
            Expr::Call(call) => match &call.context {
                CallContext::Delay(state) => assert_eq!(state.len(), 16),
                other => panic!("expected delay, got {other:?}"),
            },
            other => panic!("expected call, got {other}"),
        }
    }

    #[test]
    fn huge_time_is_clamped() {
        let (out, _) = run("delay(255, 1000000000000000, 1, 0)", 4);
        assert!(out.iter().all(|&v| (v - denorm(1.0)).abs() < 1e-3));

        let vars = VariableTable::new();
        let mut expr = compile("delay(255, 1000000, 1, 0)", &vars, &FunctionRegistry::with_builtins()).unwrap();
        let mut env = Env::new(8000, 1);
        eval(&mut expr, &mut env);
        match &expr {
            Expr::Call(call) => match &call.context {
                CallContext::Delay(state) => {
                    assert_eq!(state.len(), (MAX_DELAY_SECS * 8000.0) as usize)
                }
                other => panic!("expected delay, got {other:?}"),
            },
            other => panic!("expected call, got {other}"),
        }
    }

    #[test]
    fn infinite_time_is_clamped() {
        assert_eq!(line_len(f32::INFINITY, 48000.0), (MAX_DELAY_SECS * 48000.0) as usize);
        assert_eq!(line_len(f32::NEG_INFINITY, 48000.0), 0);
        assert_eq!(line_len(f32::NAN, 48000.0), 0);
    }

    #[test]
    fn time_changing_every_sample_only_passes_dry_signal() {
        // The line restarts every sample (8 samples longer each time), so
        // no echo ever comes back.
        let (out, _) = run("delay(255, (n = n + 1) * 0.001, 1, 1)", 9_000);
        assert!(out.iter().all(|&v| (v - denorm(1.0)).abs() < 1e-3));
    }

    #[test]
    fn shrink_then_grow_leaves_no_stale_echo() {
        let vars = VariableTable::new();
        let mut expr = compile("delay(255, dt, 1, 1)", &vars, &FunctionRegistry::with_builtins()).unwrap();
        let mut env = Env::new(8000, 1);
        vars.define("dt", 0.002);
        for _ in 0..40 {
            eval(&mut expr, &mut env);
        }
        vars.define("dt", 0.001);
        for _ in 0..5 {
            eval(&mut expr, &mut env);
        }
        // Back to 16 samples: everything written before is gone.
        vars.define("dt", 0.002);
        for _ in 0..16 {
            assert_approx_eq!(eval(&mut expr, &mut env), denorm(1.0), 1e-3);
        }
        assert_approx_eq!(eval(&mut expr, &mut env), denorm(2.0), 1e-3);
    }
}
