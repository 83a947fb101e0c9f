//! Host-provided sample playback.
//!
//! Functions registered with `register_sample_function` all dispatch here.
//! The audio itself comes from a [`SampleLoader`] injected by the host;
//! without one, sample functions are silent (NaN).

use super::{arg, denorm, Env};
use crate::expr::{to_int, Expr};

/// Source of sample frames for registered sample functions.
///
/// `load(name, variant, frame)` returns the frame in [-1, 1], or 0 past the
/// end of the sample.
pub trait SampleLoader: Send + Sync {
    fn load(&self, name: &str, variant: i32, frame: usize) -> f32;
}

impl<F> SampleLoader for F
where
    F: Fn(&str, i32, usize) -> f32 + Send + Sync,
{
    fn load(&self, name: &str, variant: i32, frame: usize) -> f32 {
        self(name, variant, frame)
    }
}

/// Frame counter of one playback voice (`tr808` and sample functions).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackState {
    pub frame: usize,
}

/// `name(variant, volume = 1)`.
pub fn sample(name: &str, state: &mut PlaybackState, args: &mut [Expr], env: &mut Env) -> f32 {
    if env.loader().is_none() {
        return f32::NAN;
    }
    let variant = arg(args, 0, f32::NAN, env);
    let vol = arg(args, 1, 1.0, env);
    if variant.is_nan() || vol.is_nan() {
        state.frame = 0;
        return f32::NAN;
    }
    let x = match env.loader() {
        Some(loader) => loader.load(name, to_int(variant), state.frame),
        None => return f32::NAN,
    };
    state.frame += 1;
    denorm(x * vol)
}
