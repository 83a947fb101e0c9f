//! Stateless helpers: `s`, `r`, `l`, `a`, `scale`, `hz`.

use std::f32::consts::PI;

use rand::Rng;

use super::{arg, denorm, Env};
use crate::expr::Expr;

/// Scale degrees in semitones. Out-of-range modes fall back to chromatic.
const SCALES: [&[i32]; 15] = [
    &[0, 2, 4, 5, 7, 9, 11],                   // ionian (major)
    &[0, 2, 3, 5, 7, 9, 10],                   // dorian
    &[0, 1, 3, 5, 7, 8, 10],                   // phrygian
    &[0, 2, 4, 6, 7, 9, 11],                   // lydian
    &[0, 2, 4, 5, 7, 9, 10],                   // mixolydian
    &[0, 2, 3, 5, 7, 8, 10],                   // aeolian (natural minor)
    &[0, 1, 3, 5, 6, 8, 10],                   // locrian
    &[0, 2, 3, 5, 7, 8, 11],                   // harmonic minor
    &[0, 2, 3, 5, 7, 9, 11],                   // melodic minor
    &[0, 2, 4, 7, 9],                          // major pentatonic
    &[0, 3, 5, 7, 10],                         // minor pentatonic
    &[0, 3, 5, 6, 7, 10],                      // blues
    &[0, 2, 4, 6, 8, 10],                      // whole tone
    &[0, 1, 3, 4, 6, 7, 9, 10],                // octatonic
    &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],   // chromatic
];

/// `s(x)`: sine of a byte-scaled angle, 256 units per cycle.
pub fn s(args: &mut [Expr], env: &mut Env) -> f32 {
    denorm((arg(args, 0, 0.0, env) * PI / 128.0).sin())
}

/// `r(max = 255)`: uniform noise in `[0, max)`.
pub fn r(args: &mut [Expr], env: &mut Env) -> f32 {
    let max = arg(args, 0, 255.0, env);
    env.rng().gen::<f32>() * max
}

/// `l(x)`: base-2 logarithm, 0 for 0.
pub fn l(args: &mut [Expr], env: &mut Env) -> f32 {
    let x = arg(args, 0, 0.0, env);
    if x != 0.0 {
        x.log2()
    } else {
        0.0
    }
}

/// `a(i, v0, v1, ...)`: pick `v[i]`, wrapping in both directions.
pub fn a(args: &mut [Expr], env: &mut Env) -> f32 {
    let index = arg(args, 0, f32::NAN, env);
    if index.is_nan() {
        return f32::NAN;
    }
    let len = args.len().saturating_sub(1);
    if len == 0 {
        return 0.0;
    }
    let i = (index.floor() as i64).rem_euclid(len as i64) as usize;
    arg(args, i + 1, 0.0, env)
}

/// `scale(n, mode = 0)`: semitone offset of the n-th degree of a scale.
pub fn scale(args: &mut [Expr], env: &mut Env) -> f32 {
    let note = arg(args, 0, 0.0, env);
    let mode = arg(args, 1, 0.0, env);
    if note.is_nan() || mode.is_nan() {
        return f32::NAN;
    }
    let degrees = if (0.0..SCALES.len() as f32).contains(&mode) {
        SCALES[mode as usize]
    } else {
        SCALES[SCALES.len() - 1]
    };
    let len = degrees.len() as i32;
    let n = note as i32;
    let octave = n.div_euclid(len);
    (degrees[n.rem_euclid(len) as usize] + octave * 12) as f32
}

/// `hz(n)`: frequency of the note `n` semitones away from A4.
pub fn hz(args: &mut [Expr], env: &mut Env) -> f32 {
    2f32.powf(arg(args, 0, 0.0, env) / 12.0) * 440.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{compile, eval, VariableTable};
    use crate::library::FunctionRegistry;
    use assert_approx_eq::assert_approx_eq;

    fn run(src: &str) -> f32 {
        let vars = VariableTable::new();
        let mut expr = compile(src, &vars, &FunctionRegistry::with_builtins()).unwrap();
        eval(&mut expr, &mut Env::new(8000, 7))
    }

    #[test]
    fn s_is_a_byte_sine() {
        assert_approx_eq!(run("s(0)"), 128.0);
        assert_approx_eq!(run("s(64)"), 255.0, 1e-3);
        assert_approx_eq!(run("s(192)"), 1.0, 1e-3);
    }

    #[test]
    fn r_stays_below_max() {
        let vars = VariableTable::new();
        let mut expr = compile("r(10)", &vars, &FunctionRegistry::with_builtins()).unwrap();
        let mut env = Env::new(8000, 7);
        for _ in 0..1000 {
            let v = eval(&mut expr, &mut env);
            assert!((0.0..10.0).contains(&v), "{v}");
        }
        let mut expr = compile("r()", &vars, &FunctionRegistry::with_builtins()).unwrap();
        assert!(eval(&mut expr, &mut env) < 255.0);
    }

    #[test]
    fn r_is_seeded() {
        let vars = VariableTable::new();
        let registry = FunctionRegistry::with_builtins();
        let mut a = compile("r()", &vars, &registry).unwrap();
        let mut b = compile("r()", &vars, &registry).unwrap();
        let mut env_a = Env::new(8000, 3);
        let mut env_b = Env::new(8000, 3);
        for _ in 0..16 {
            assert_eq!(eval(&mut a, &mut env_a), eval(&mut b, &mut env_b));
        }
    }

    #[test]
    fn l_is_log2_with_zero_guard() {
        assert_eq!(run("l(8)"), 3.0);
        assert_eq!(run("l(0)"), 0.0);
        assert_eq!(run("l()"), 0.0);
    }

    #[test]
    fn a_wraps_index() {
        assert_eq!(run("a(0, 10, 20, 30)"), 10.0);
        assert_eq!(run("a(2, 10, 20, 30)"), 30.0);
        assert_eq!(run("a(3, 10, 20, 30)"), 10.0);
        assert_eq!(run("a(-1, 10, 20, 30)"), 30.0);
        assert_eq!(run("a(1.7, 10, 20, 30)"), 20.0);
        assert_eq!(run("a(5)"), 0.0);
        assert!(run("a(0/0, 1, 2)").is_nan());
    }

    #[test]
    fn scale_degrees_and_octaves() {
        assert_eq!(run("scale(0)"), 0.0);
        assert_eq!(run("scale(2)"), 4.0);
        assert_eq!(run("scale(7)"), 12.0);
        assert_eq!(run("scale(-1)"), -1.0);
        assert_eq!(run("scale(2, 5)"), 3.0);
        assert_eq!(run("scale(5, 9)"), 12.0);
        assert_eq!(run("scale(3, 99)"), 3.0);
        assert_eq!(run("scale(3, -2)"), 3.0);
        assert!(run("scale(0/0)").is_nan());
    }

    #[test]
    fn hz_is_equal_tempered() {
        assert_approx_eq!(run("hz(0)"), 440.0);
        assert_approx_eq!(run("hz(12)"), 880.0, 1e-3);
        assert_approx_eq!(run("hz(-12)"), 220.0, 1e-3);
        assert_approx_eq!(run("hz(3)"), 523.2511, 1e-2);
    }
}
