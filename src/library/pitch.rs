//! Delay-line pitch shifter: `pitch(signal, shift)`.
//!
//! The input is written into a circular history at one sample per call
//! while a read head moves `shift` samples per call. When the distance
//! between the heads leaves the working window, a second read head is placed
//! at the best-matching position nearby and the output crossfades onto it.

use std::fmt;

use super::{arg, Env};
use crate::expr::Expr;

/// History length in samples.
pub const BUFFER_LEN: usize = 0x10000;

/// Crossfade length in samples.
const CROSSFADE: f32 = 50.0;
/// Largest read/write distance before the read head is moved forward.
const MAX_DISTANCE: f32 = 1200.0;
/// Correlation window, and smallest read/write distance when reading fast.
const WINDOW: f32 = 1000.0;
/// Stride of the splice-point search and correlation sum.
const STRIDE: f32 = 10.0;

pub struct PitchState {
    buf: Vec<f32>,
    /// Read head.
    read: f32,
    /// Second read head that `read` crossfades onto.
    next: f32,
    /// Write head.
    write: f32,
    /// Remaining crossfade samples.
    fade: f32,
}

impl Default for PitchState {
    fn default() -> Self {
        Self {
            buf: vec![0.0; BUFFER_LEN],
            read: 0.0,
            next: 0.0,
            write: 0.0,
            fade: 0.0,
        }
    }
}

impl fmt::Debug for PitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PitchState")
            .field("read", &self.read)
            .field("next", &self.next)
            .field("write", &self.write)
            .field("fade", &self.fade)
            .finish()
    }
}

fn wrap(pos: f32) -> f32 {
    pos.rem_euclid(BUFFER_LEN as f32)
}

impl PitchState {
    fn at(&self, i: i64) -> f32 {
        self.buf[i.rem_euclid(BUFFER_LEN as i64) as usize]
    }

    /// Cubic interpolated read at fractional position `pos`.
    fn read_at(&self, pos: f32) -> f32 {
        let i = pos.floor() as i64;
        let f = pos - i as f32;
        let a = self.at(i - 1);
        let b = self.at(i);
        let c = self.at(i + 1);
        let d = self.at(i + 2);
        let cb = c - b;
        b + f * (cb - 0.16667 * (1.0 - f) * ((d - a - 3.0 * cb) * f + (d + 2.0 * a - 3.0 * b)))
    }

    /// Normalised cross-correlation of the windows starting at `p` and `q`,
    /// taken around the byte centre line.
    fn correlation(&self, p: f32, q: f32) -> f32 {
        let (p, q) = (p.floor() as i64, q.floor() as i64);
        let (mut pq, mut pp, mut qq) = (0.0f32, 0.0f32, 0.0f32);
        let mut i = 0;
        while (i as f32) < WINDOW {
            let x = self.at(p + i) - 128.0;
            let y = self.at(q + i) - 128.0;
            pq += x * y;
            pp += x * x;
            qq += y * y;
            i += STRIDE as i64;
        }
        if pp > 0.0 && qq > 0.0 {
            pq / (pp * qq).sqrt()
        } else {
            0.0
        }
    }

    /// Position in `[lo, hi]` whose neighbourhood best matches `from`.
    fn find_splice(&self, from: f32, lo: f32, hi: f32) -> f32 {
        let mut best = lo;
        let mut best_score = f32::NEG_INFINITY;
        let mut pos = lo;
        while pos <= hi {
            let score = self.correlation(from, pos);
            if score > best_score {
                best_score = score;
                best = pos;
            }
            pos += STRIDE;
        }
        best
    }

    fn process(&mut self, x: f32, shift: f32) -> f32 {
        self.buf[self.write as usize % BUFFER_LEN] = x;
        let mut out = self.read_at(self.read);

        if self.fade > 0.0 {
            let k = self.fade / CROSSFADE;
            out = out * k + self.read_at(self.next) * (1.0 - k);
            self.fade -= 1.0;
            if self.fade == 0.0 {
                self.read = self.next;
            }
        } else {
            let distance = wrap(self.write - self.read);
            if shift < 1.0 {
                if distance > MAX_DISTANCE {
                    self.fade = CROSSFADE;
                    self.next = self.find_splice(
                        self.read,
                        self.read + MAX_DISTANCE / 2.0,
                        self.read + MAX_DISTANCE,
                    );
                }
            } else if distance < WINDOW || distance > MAX_DISTANCE * 2.0 {
                self.fade = CROSSFADE;
                self.next = self.find_splice(self.read, self.read - MAX_DISTANCE, self.read - WINDOW);
            }
        }

        self.write = wrap(self.write + 1.0);
        self.read = wrap(self.read + shift);
        self.next = wrap(self.next + shift);
        out
    }

    /// Samples between the write head and the read head.
    pub fn distance(&self) -> f32 {
        wrap(self.write - self.read)
    }
}

pub fn pitch(state: &mut PitchState, args: &mut [Expr], env: &mut Env) -> f32 {
    let x = arg(args, 0, f32::NAN, env);
    let shift = arg(args, 1, 0.0, env);
    if x.is_nan() || shift.is_nan() {
        return f32::NAN;
    }
    state.process(x, shift)
}
