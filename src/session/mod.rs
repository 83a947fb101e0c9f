//! Live session: compile on the control side, evaluate on the audio side.
//!
//! A [`Session`] is owned by the audio path and produces one sample per
//! [`Session::eval_sample`] call. Any number of [`Controller`] handles can
//! compile new programs, push MIDI notes and set `x`/`y` from other threads.
//! A compiled program is published as *pending* and installed by the audio
//! side at the next sample, or at the next beat boundary while `bpm > 0`.

pub mod voices;

use std::sync::{Arc, PoisonError, RwLock};

use arc_swap::ArcSwapOption;
use tracing::{debug, warn};

use crate::expr::{compile, eval, CompileError, Expr, VarRef, VariableTable};
use crate::library::drums::VOICES;
use crate::library::{Env, FunctionRegistry, RegistryError, SampleLoader};
use crate::midi::{apply_midi_message, parse_midi_message, MidiEvent};

pub use voices::{Voices, K};

/// Semitone steps from each natural note to the next, starting at A.
const NATURALS: [(char, i32); 7] = [
    ('A', 2),
    ('B', 1),
    ('C', 2),
    ('D', 2),
    ('E', 1),
    ('F', 2),
    ('G', 2),
];

/// Octaves of note constants (`A0` .. `G7`).
const OCTAVES: i32 = 8;

/// State reachable from both the audio side and every controller.
struct Shared {
    vars: VariableTable,
    registry: RwLock<FunctionRegistry>,
    pending: ArcSwapOption<Expr>,
    voices: Voices,
    t: VarRef,
    x: VarRef,
    y: VarRef,
    bpm: VarRef,
}

impl Shared {
    fn new() -> Self {
        let vars = VariableTable::new();
        let t = declare(&vars, "t", 0.0);
        let x = declare(&vars, "x", 0.0);
        let y = declare(&vars, "y", 0.0);
        let bpm = declare(&vars, "bpm", 0.0);
        let voices = Voices::declare(&vars);
        define_note_constants(&vars);
        for (index, name) in VOICES.iter().enumerate() {
            vars.define(name, index as f32);
        }
        Self {
            vars,
            registry: RwLock::new(FunctionRegistry::with_builtins()),
            pending: ArcSwapOption::empty(),
            voices,
            t,
            x,
            y,
            bpm,
        }
    }

    fn compile(&self, source: &str) -> Result<(), CompileError> {
        let registry = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let expr = compile(source, &self.vars, &registry)?;
        debug!(calls = expr.call_count(), "program compiled");
        self.pending.store(Some(Arc::new(expr)));
        Ok(())
    }

    fn midi(&self, event: MidiEvent) {
        match event {
            MidiEvent::NoteOn { note, velocity } => {
                if self.voices.note_on(note, velocity).is_none() {
                    debug!(note, "all voices busy, note dropped");
                }
            }
            MidiEvent::NoteOff { note } => {
                self.voices.note_off(note);
            }
            MidiEvent::Other {
                status,
                data1,
                data2,
            } => warn!(status, data1, data2, "unhandled MIDI message"),
        }
    }
}

/// Built-in names are all valid identifiers.
fn declare(vars: &VariableTable, name: &str, value: f32) -> VarRef {
    match vars.define(name, value) {
        Some(var) => var,
        None => unreachable!("invalid built-in variable name {name}"),
    }
}

/// `A0`..`G7` with `#` and `b` spellings. `A4` is 0 and octaves start at A.
fn define_note_constants(vars: &VariableTable) {
    let mut note = -4 * 12;
    for octave in 0..OCTAVES {
        for (name, step) in NATURALS {
            vars.define(&format!("{name}{octave}"), note as f32);
            vars.define(&format!("{name}#{octave}"), (note + 1) as f32);
            vars.define(&format!("{name}b{octave}"), (note - 1) as f32);
            note += step;
        }
    }
}

/// The audio side of a session.
pub struct Session {
    shared: Arc<Shared>,
    env: Env,
    current: Option<Expr>,
    frame: u64,
    last_bpm: f32,
    bpm_start: u64,
    last_sample: f32,
}

impl Session {
    pub fn new(sample_rate: u32, seed: u64) -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            env: Env::new(sample_rate, seed),
            current: None,
            frame: 0,
            last_bpm: 0.0,
            bpm_start: 0,
            last_sample: 0.0,
        }
    }

    /// A handle for compiling and sending input from other threads.
    pub fn controller(&self) -> Controller {
        Controller {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Compile `source` as the pending program.
    ///
    /// On error nothing changes: the running program, any previously pending
    /// one and the variable table are untouched.
    pub fn compile(&self, source: &str) -> Result<(), CompileError> {
        self.shared.compile(source)
    }

    pub fn vars(&self) -> &VariableTable {
        &self.shared.vars
    }

    pub fn sample_rate(&self) -> f32 {
        self.env.sample_rate()
    }

    /// Change the sample rate used by every phase and time computation.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.env.set_sample_rate(sample_rate);
    }

    pub fn set_loader(&mut self, loader: Option<Arc<dyn SampleLoader>>) {
        self.env.set_loader(loader);
    }

    pub fn register_sample_function(&self, name: &str) -> Result<(), RegistryError> {
        self.controller().register_sample_function(name)
    }

    pub fn set_xy(&self, x: f32, y: f32) {
        self.shared.x.set(x);
        self.shared.y.set(y);
    }

    pub fn midi(&self, status: u8, data1: u8, data2: u8) {
        self.controller().midi(status, data1, data2);
    }

    /// Samples produced so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Beats elapsed since the current tempo took effect.
    pub fn beat(&self) -> f64 {
        let bpm = self.shared.bpm.get() as f64;
        (self.frame - self.bpm_start) as f64 * bpm / 60.0 / self.env.sample_rate() as f64
    }

    /// Whether a pending program may be installed before this sample.
    fn at_swap_point(&self) -> bool {
        let bpm = self.shared.bpm.get();
        if bpm > 0.0 {
            let beat = self.beat();
            beat - beat.floor() <= bpm as f64 / 60.0 / self.env.sample_rate() as f64
        } else {
            true
        }
    }

    fn install_pending(&mut self) {
        let Some(next) = self.shared.pending.swap(None) else {
            return;
        };
        let bpm = self.shared.bpm.get();
        if bpm != self.last_bpm {
            self.last_bpm = bpm;
            self.bpm_start = self.frame;
        }
        let next = Arc::try_unwrap(next).unwrap_or_else(|shared| (*shared).clone());
        debug!(frame = self.frame, "program installed");
        self.current = Some(next);
    }

    /// Produce the next output sample in [-1, 1).
    ///
    /// A NaN result holds the previous sample.
    pub fn eval_sample(&mut self) -> f32 {
        if self.at_swap_point() {
            self.install_pending();
        }
        let v = match self.current.as_mut() {
            Some(expr) => eval(expr, &mut self.env),
            None => f32::NAN,
        };
        if !v.is_nan() {
            self.last_sample = ((v % 256.0) + 256.0) % 256.0 / 128.0 - 1.0;
        }
        let sr = self.env.sample_rate();
        self.shared
            .t
            .set((self.frame as f64 * 8000.0 / sr as f64).round() as f32);
        self.frame += 1;
        self.last_sample
    }

    /// Fill `out` with consecutive samples.
    pub fn render(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = self.eval_sample();
        }
    }
}

/// Control-side handle to a [`Session`]. Cheap to clone and `Send`.
#[derive(Clone)]
pub struct Controller {
    shared: Arc<Shared>,
}

impl Controller {
    pub fn compile(&self, source: &str) -> Result<(), CompileError> {
        self.shared.compile(source)
    }

    /// Whether a compiled program is waiting to be installed.
    pub fn has_pending(&self) -> bool {
        self.shared.pending.load().is_some()
    }

    pub fn vars(&self) -> &VariableTable {
        &self.shared.vars
    }

    pub fn set_xy(&self, x: f32, y: f32) {
        self.shared.x.set(x);
        self.shared.y.set(y);
    }

    /// Apply one MIDI message. Unhandled status bytes are logged.
    pub fn midi(&self, status: u8, data1: u8, data2: u8) {
        if let Some(event) = parse_midi_message(status, data1, data2, None) {
            self.shared.midi(event);
        }
    }

    /// Apply a raw message from a MIDI input port, honouring a channel
    /// filter.
    pub fn midi_message(&self, msg: &[u8], channel_filter: Option<u8>) {
        if let Some(event) = apply_midi_message(msg, channel_filter) {
            self.shared.midi(event);
        }
    }

    /// Make `name(variant, volume)` callable from programs compiled after
    /// this returns.
    pub fn register_sample_function(&self, name: &str) -> Result<(), RegistryError> {
        self.shared
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register_sample_function(name)
    }

    pub fn voices(&self) -> &Voices {
        &self.shared.voices
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("pending", &self.has_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn builtin_variables_are_declared() {
        let session = Session::new(8000, 1);
        let vars = session.vars();
        for name in ["t", "x", "y", "bpm", "k0", "v9", "A4", "C#3", "Bb2", "BD", "HH"] {
            assert!(vars.lookup(name).is_some(), "{name} missing");
        }
        assert!(vars.get("k0").unwrap().is_nan());
    }

    #[test]
    fn note_constants() {
        let session = Session::new(8000, 1);
        let vars = session.vars();
        assert_eq!(vars.get("A4"), Some(0.0));
        assert_eq!(vars.get("A#4"), Some(1.0));
        assert_eq!(vars.get("Bb4"), Some(1.0));
        assert_eq!(vars.get("B4"), Some(2.0));
        assert_eq!(vars.get("C4"), Some(3.0));
        assert_eq!(vars.get("A5"), Some(12.0));
        assert_eq!(vars.get("A0"), Some(-48.0));
        assert_eq!(vars.get("G7"), Some(46.0));
    }

    #[test]
    fn percussion_constants() {
        let session = Session::new(8000, 1);
        let vars = session.vars();
        assert_eq!(vars.get("BD"), Some(0.0));
        assert_eq!(vars.get("CB"), Some(6.0));
        assert_eq!(vars.get("HH"), Some(8.0));
    }

    #[test]
    fn silent_before_first_compile() {
        let mut session = Session::new(8000, 1);
        assert_eq!(session.eval_sample(), 0.0);
    }

    #[test]
    fn output_wraps_into_range() {
        let mut session = Session::new(8000, 1);
        session.compile("128").unwrap();
        assert_eq!(session.eval_sample(), 0.0);
        session.compile("0").unwrap();
        assert_eq!(session.eval_sample(), -1.0);
        session.compile("-64").unwrap();
        assert_eq!(session.eval_sample(), 0.5);
        session.compile("448").unwrap();
        assert_eq!(session.eval_sample(), 0.5);
    }

    #[test]
    fn nan_holds_last_sample() {
        let mut session = Session::new(8000, 1);
        session.compile("192").unwrap();
        assert_eq!(session.eval_sample(), 0.5);
        session.compile("0/0").unwrap();
        assert_eq!(session.eval_sample(), 0.5);
        assert_eq!(session.eval_sample(), 0.5);
    }

    #[test]
    fn t_counts_at_8khz() {
        let mut session = Session::new(16000, 1);
        session.compile("t").unwrap();
        for _ in 0..5 {
            session.eval_sample();
        }
        // Frames 0..=4 done, t reflects frame 4.
        assert_eq!(session.vars().get("t"), Some(2.0));
    }

    #[test]
    fn compile_error_keeps_pending_and_current() {
        let mut session = Session::new(8000, 1);
        session.compile("64").unwrap();
        assert_approx_eq!(session.eval_sample(), -0.5);
        assert!(session.compile("(1 + 2").is_err());
        assert!(!session.controller().has_pending());
        assert_approx_eq!(session.eval_sample(), -0.5);
    }

    #[test]
    fn controller_compiles_across_threads() {
        let mut session = Session::new(8000, 1);
        let controller = session.controller();
        std::thread::spawn(move || controller.compile("32").unwrap())
            .join()
            .unwrap();
        assert_approx_eq!(session.eval_sample(), -0.75);
    }

    #[test]
    fn xy_are_bound() {
        let mut session = Session::new(8000, 1);
        session.compile("x + y").unwrap();
        session.set_xy(100.0, 28.0);
        assert_eq!(session.eval_sample(), 0.0);
    }

    #[test]
    fn midi_drives_voices() {
        let session = Session::new(8000, 1);
        session.midi(0x90, 72, 64);
        assert_eq!(session.vars().get("k0"), Some(3.0));
        assert_eq!(session.vars().get("v0"), Some(0.5));
        session.midi(0xB0, 1, 2);
        session.midi(0x80, 72, 0);
        assert!(session.controller().voices().all_silent());
    }

    #[test]
    fn midi_message_honours_channel_filter() {
        let session = Session::new(8000, 1);
        let controller = session.controller();
        controller.midi_message(&[0x92, 60, 100], Some(1));
        assert!(controller.voices().all_silent());
        controller.midi_message(&[0x91, 60, 100], Some(1));
        assert!(!controller.voices().all_silent());
    }

    #[test]
    fn registered_sample_function_compiles() {
        let session = Session::new(8000, 1);
        assert!(session.compile("kick(0)").is_err());
        session.register_sample_function("kick").unwrap();
        assert!(session.compile("kick(0)").is_ok());
        assert_eq!(
            session.register_sample_function("kick"),
            Err(RegistryError::Duplicate("kick".to_string()))
        );
    }

    #[test]
    fn variables_persist_across_programs() {
        let mut session = Session::new(8000, 1);
        session.compile("n = n + 1").unwrap();
        for _ in 0..3 {
            session.eval_sample();
        }
        session.compile("n").unwrap();
        session.eval_sample();
        assert_eq!(session.vars().get("n"), Some(3.0));
    }

    #[test]
    fn beat_counts_from_tempo_start() {
        let mut session = Session::new(8000, 1);
        session.compile("bpm = 60, 0").unwrap();
        for _ in 0..4000 {
            session.eval_sample();
        }
        assert_approx_eq!(session.beat(), 0.5, 1e-9);
    }
}
