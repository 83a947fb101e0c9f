//! Mixing: `mix` and the polyphonic `each`.

use super::{denorm, Env};
use crate::expr::{eval, Expr};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MixState {
    /// Last non-NaN value seen on each channel.
    held: Vec<f32>,
}

/// `mix(ch0, (vol, ch1), ...)`: sum of channels, each optionally weighted.
///
/// A channel that goes NaN keeps contributing its last value. The sum is
/// normalised by the square root of the channel count and clamped.
pub fn mix(state: &mut MixState, args: &mut [Expr], env: &mut Env) -> f32 {
    if args.is_empty() {
        return 128.0;
    }
    // Channels start at the centre line so an initially silent voice adds
    // nothing.
    state.held.resize(args.len(), 128.0);

    let mut sum = 0.0;
    for (channel, held) in args.iter_mut().zip(state.held.iter_mut()) {
        let (vol, sample) = match channel.as_pair_mut() {
            Some((vol, sample)) => (eval(vol, env), eval(sample, env)),
            None => (1.0, eval(channel, env)),
        };
        if !sample.is_nan() {
            *held = sample;
        }
        sum += vol * (*held - 128.0) / 127.0;
    }
    let v = sum / (args.len() as f32).sqrt();
    denorm(v.clamp(-1.0, 1.0))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EachState {
    /// One private copy of the voice expression per value list.
    voices: Option<Vec<Expr>>,
}

impl EachState {
    pub fn voice_count(&self) -> usize {
        self.voices.as_ref().map_or(0, Vec::len)
    }
}

/// Assign the variables of a comma chain from the matching elements of
/// `values`. A shorter value chain repeats its last element.
fn bind(targets: &Expr, values: &mut Expr, env: &mut Env) {
    match targets.as_pair() {
        Some((target, rest)) => match values.as_pair_mut() {
            Some((value, more)) => {
                assign(target, value, env);
                bind(rest, more, env);
            }
            None => {
                assign(target, values, env);
                bind(rest, values, env);
            }
        },
        None => assign(targets, values, env),
    }
}

fn assign(target: &Expr, value: &mut Expr, env: &mut Env) {
    if let Expr::Var(var) = target {
        var.set(eval(value, env));
    }
}

/// `each(vars, voice, values0, values1, ...)`.
///
/// Runs one copy of `voice` per value list, each with its own call state.
/// Before copy `i` is evaluated, `vars` (a variable or comma chain of
/// variables) is assigned from `values_i`. Non-NaN voices are summed and
/// normalised by the square root of the voice count.
pub fn each(state: &mut EachState, args: &mut [Expr], env: &mut Env) -> f32 {
    if args.len() < 3 {
        return f32::NAN;
    }
    let (head, lists) = args.split_at_mut(2);
    let voices = state
        .voices
        .get_or_insert_with(|| lists.iter().map(|_| head[1].clone()).collect());

    let mut sum = 0.0;
    for (voice, values) in voices.iter_mut().zip(lists.iter_mut()) {
        bind(&head[0], values, env);
        let r = eval(voice, env);
        if !r.is_nan() {
            sum += (r - 127.0) / 128.0;
        }
    }
    denorm(sum / (voices.len() as f32).sqrt())
}
