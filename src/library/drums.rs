//! `tr808(drum, volume = 1)` and its synthetic drum kit.
//!
//! The kit has nine voices in fixed slots, addressed by the percussion
//! constants `BD SD MT MA RS CP CB OH HH` (0..=8). Every voice is generated
//! once per sample rate; noise voices use a seeded `ChaCha8Rng` so a given
//! seed always renders the same kit.

use std::f64::consts::PI;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::sample::PlaybackState;
use super::{arg, Env};
use crate::expr::{to_int, Expr};

/// Slot names in kit order.
pub const VOICES: [&str; 9] = ["BD", "SD", "MT", "MA", "RS", "CP", "CB", "OH", "HH"];

/// Nine mono voices in [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct DrumKit {
    voices: Vec<Vec<f32>>,
}

impl DrumKit {
    pub fn generate(sample_rate: u32, seed: u64) -> Self {
        let sr = sample_rate.max(1);
        Self {
            voices: vec![
                generate_kick(sr),
                generate_snare(sr, seed),
                generate_tom(sr),
                generate_maracas(sr, seed.wrapping_add(1)),
                generate_rimshot(sr),
                generate_clap(sr, seed.wrapping_add(2)),
                generate_cowbell(sr),
                generate_hihat(sr, seed.wrapping_add(3), 0.4),
                generate_hihat(sr, seed.wrapping_add(4), 0.08),
            ],
        }
    }

    /// Voice for a drum number; wraps so any integer picks a slot.
    pub fn voice(&self, drum: i32) -> &[f32] {
        let index = drum.rem_euclid(self.voices.len() as i32) as usize;
        &self.voices[index]
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}

fn samples_for(sample_rate: u32, secs: f64) -> usize {
    (sample_rate as f64 * secs) as usize
}

/// Sine with an exponential pitch sweep and decay.
fn swept_sine(sample_rate: u32, secs: f64, from: f64, to: f64, sweep: f64, decay: f64) -> Vec<f32> {
    let n = samples_for(sample_rate, secs);
    let mut phase = 0.0_f64;
    (0..n)
        .map(|i| {
            let norm = i as f64 / n as f64;
            let freq = to + (from - to) * (-norm * sweep).exp();
            let amp = (-norm * decay).exp();
            phase += freq / sample_rate as f64;
            ((phase * 2.0 * PI).sin() * amp) as f32
        })
        .collect()
}

/// Kick: 150 Hz falling to 50 Hz, 250 ms.
fn generate_kick(sample_rate: u32) -> Vec<f32> {
    swept_sine(sample_rate, 0.25, 150.0, 50.0, 8.0, 10.0)
}

/// Mid tom: 220 Hz falling to 160 Hz, 300 ms.
fn generate_tom(sample_rate: u32) -> Vec<f32> {
    swept_sine(sample_rate, 0.3, 220.0, 160.0, 4.0, 7.0)
}

/// Snare: 180 Hz body plus a noise burst, 200 ms.
fn generate_snare(sample_rate: u32, seed: u64) -> Vec<f32> {
    let n = samples_for(sample_rate, 0.2);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut phase = 0.0_f64;
    (0..n)
        .map(|i| {
            let norm = i as f64 / n as f64;
            phase += 180.0 / sample_rate as f64;
            let body = (phase * 2.0 * PI).sin() * (-norm * 15.0).exp();
            let noise: f64 = rng.gen_range(-1.0..1.0) * (-norm * 12.0).exp();
            (body * 0.5 + noise * 0.5) as f32
        })
        .collect()
}

/// High-passed noise with a fast decay; `secs` sets open vs. closed.
fn generate_hihat(sample_rate: u32, seed: u64, secs: f64) -> Vec<f32> {
    let n = samples_for(sample_rate, secs);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut prev_input = 0.0_f64;
    let mut prev_output = 0.0_f64;
    (0..n)
        .map(|i| {
            let norm = i as f64 / n as f64;
            let noise: f64 = rng.gen_range(-1.0..1.0);
            let filtered = 0.85 * (prev_output + noise - prev_input);
            prev_input = noise;
            prev_output = filtered;
            (filtered * (-norm * 6.0).exp()).clamp(-1.0, 1.0) as f32
        })
        .collect()
}

/// Maracas: very short high-passed noise, 40 ms.
fn generate_maracas(sample_rate: u32, seed: u64) -> Vec<f32> {
    generate_hihat(sample_rate, seed, 0.04)
        .into_iter()
        .map(|s| s * 0.7)
        .collect()
}

/// Rimshot: short 1.7 kHz ping over a click, 30 ms.
fn generate_rimshot(sample_rate: u32) -> Vec<f32> {
    let n = samples_for(sample_rate, 0.03);
    (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            let norm = i as f64 / n as f64;
            let ping = (t * 1700.0 * 2.0 * PI).sin() * (-norm * 12.0).exp();
            let click = if i < 4 { 0.5 } else { 0.0 };
            (ping * 0.6 + click).clamp(-1.0, 1.0) as f32
        })
        .collect()
}

/// Clap: three staggered noise bursts and a filtered tail, 150 ms.
fn generate_clap(sample_rate: u32, seed: u64) -> Vec<f32> {
    let n = samples_for(sample_rate, 0.15);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut out = vec![0.0f32; n];

    let burst_len = 0.01;
    for offset in [0.0, 0.015, 0.030] {
        let start = samples_for(sample_rate, offset);
        let end = samples_for(sample_rate, offset + burst_len).min(n);
        for (i, sample) in out.iter_mut().enumerate().take(end).skip(start) {
            let local = (i - start) as f64 / (burst_len * sample_rate as f64);
            let noise: f64 = rng.gen_range(-1.0..1.0);
            *sample += (noise * (-local * 15.0).exp() * 0.7) as f32;
        }
    }

    let tail_start = samples_for(sample_rate, 0.04);
    let mut band = 0.0_f64;
    for (i, sample) in out.iter_mut().enumerate().skip(tail_start) {
        let t = (i - tail_start) as f64 / sample_rate as f64;
        let noise: f64 = rng.gen_range(-1.0..1.0);
        band += (noise - band) * (600.0 / sample_rate as f64).min(1.0);
        *sample += (band * (-t * 18.0).exp() * 0.5) as f32;
    }

    for sample in &mut out {
        *sample = sample.clamp(-1.0, 1.0);
    }
    out
}

/// Cowbell: two detuned square partials, 300 ms.
fn generate_cowbell(sample_rate: u32) -> Vec<f32> {
    let n = samples_for(sample_rate, 0.3);
    (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            let norm = i as f64 / n as f64;
            let square = |freq: f64| if (t * freq).fract() < 0.5 { 1.0 } else { -1.0 };
            let tone = (square(540.0) + square(800.0)) * 0.25;
            (tone * (-norm * 9.0).exp()) as f32
        })
        .collect()
}

/// Play the selected voice one frame per call; NaN arguments rewind it.
/// Past the end of the voice the centre line (128) is returned.
pub fn tr808(state: &mut PlaybackState, args: &mut [Expr], env: &mut Env) -> f32 {
    let drum = arg(args, 0, f32::NAN, env);
    let vol = arg(args, 1, 1.0, env);
    if drum.is_nan() || vol.is_nan() {
        state.frame = 0;
        return f32::NAN;
    }
    match env.drums().voice(to_int(drum)).get(state.frame) {
        Some(&x) => {
            state.frame += 1;
            x * vol * 127.0 + 128.0
        }
        None => 128.0,
    }
}
