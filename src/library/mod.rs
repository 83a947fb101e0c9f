//! Built-in function library.
//!
//! Every call site in a compiled program owns a [`CallContext`] chosen by the
//! [`FunctionKind`] of its callee. Functions receive their argument
//! expressions unevaluated, so each one decides how often (and whether) to
//! evaluate them, and can inspect `(a, b)` comma pairs before doing so.

pub mod delay;
pub mod drums;
pub mod env;
pub mod filter;
pub mod math;
pub mod mix;
pub mod osc;
pub mod pitch;
pub mod sample;
pub mod seq;

use std::fmt;
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::expr::{eval, Call, Expr};

pub use drums::DrumKit;
pub use sample::SampleLoader;

/// Maximum number of entries in a [`FunctionRegistry`], built-ins included.
pub const MAX_FUNCTIONS: usize = 1024;

/// Map a bipolar value in [-1, 1] onto the 8-bit centred range (128 = 0).
pub fn denorm(x: f32) -> f32 {
    x * 127.0 + 128.0
}

/// Evaluate argument `n`, or return `default` when the call has fewer args.
pub fn arg(args: &mut [Expr], n: usize, default: f32, env: &mut Env) -> f32 {
    match args.get_mut(n) {
        Some(expr) => eval(expr, env),
        None => default,
    }
}

/// Which built-in behaviour a function name is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    S,
    R,
    L,
    A,
    Scale,
    Hz,
    Each,
    Sin,
    Tri,
    Saw,
    Sqr,
    Fm,
    Tr808,
    Loop,
    Seq,
    Env,
    Mix,
    Lpf,
    Hpf,
    Delay,
    Pitch,
    /// Playback through the host's sample loader, keyed by function name.
    Sample,
}

impl FunctionKind {
    /// Fresh, zeroed state for one call site of this kind.
    pub fn new_context(self) -> CallContext {
        match self {
            FunctionKind::S
            | FunctionKind::R
            | FunctionKind::L
            | FunctionKind::A
            | FunctionKind::Scale
            | FunctionKind::Hz => CallContext::None,
            FunctionKind::Each => CallContext::Each(Default::default()),
            FunctionKind::Sin | FunctionKind::Tri | FunctionKind::Saw | FunctionKind::Sqr => {
                CallContext::Osc(Default::default())
            }
            FunctionKind::Fm => CallContext::Fm(Default::default()),
            FunctionKind::Tr808 | FunctionKind::Sample => CallContext::Playback(Default::default()),
            FunctionKind::Loop | FunctionKind::Seq => CallContext::Seq(Default::default()),
            FunctionKind::Env => CallContext::Env(Default::default()),
            FunctionKind::Mix => CallContext::Mix(Default::default()),
            FunctionKind::Lpf | FunctionKind::Hpf => CallContext::Filter(Default::default()),
            FunctionKind::Delay => CallContext::Delay(Default::default()),
            FunctionKind::Pitch => CallContext::Pitch(Default::default()),
        }
    }
}

/// A named entry of the registry. Cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    name: Arc<str>,
    kind: FunctionKind,
}

impl Function {
    pub fn new(name: impl Into<Arc<str>>, kind: FunctionKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FunctionKind {
        self.kind
    }

    pub fn new_context(&self) -> CallContext {
        self.kind.new_context()
    }
}

/// Per-call-site running state.
#[derive(Debug)]
pub enum CallContext {
    /// Stateless functions.
    None,
    Osc(osc::OscState),
    Fm(osc::FmState),
    Seq(seq::SeqState),
    Env(env::EnvState),
    Mix(mix::MixState),
    Filter(filter::FilterState),
    Delay(delay::DelayState),
    Pitch(Box<pitch::PitchState>),
    Playback(sample::PlaybackState),
    Each(mix::EachState),
}

/// Error returned when extending a [`FunctionRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The registry already holds [`MAX_FUNCTIONS`] entries.
    Full,
    /// A function with this name is already registered.
    Duplicate(String),
    /// Names must start with a letter and contain only word characters.
    InvalidName(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Full => write!(f, "function registry is full ({MAX_FUNCTIONS} entries)"),
            RegistryError::Duplicate(name) => write!(f, "function '{name}' is already registered"),
            RegistryError::InvalidName(name) => write!(f, "'{name}' is not a valid function name"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Name → function table consulted at parse time only.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: Vec<Function>,
}

const BUILTINS: &[(&str, FunctionKind)] = &[
    ("s", FunctionKind::S),
    ("r", FunctionKind::R),
    ("l", FunctionKind::L),
    ("a", FunctionKind::A),
    ("scale", FunctionKind::Scale),
    ("hz", FunctionKind::Hz),
    ("each", FunctionKind::Each),
    ("sin", FunctionKind::Sin),
    ("tri", FunctionKind::Tri),
    ("saw", FunctionKind::Saw),
    ("sqr", FunctionKind::Sqr),
    ("fm", FunctionKind::Fm),
    ("tr808", FunctionKind::Tr808),
    ("loop", FunctionKind::Loop),
    ("seq", FunctionKind::Seq),
    ("env", FunctionKind::Env),
    ("mix", FunctionKind::Mix),
    ("lpf", FunctionKind::Lpf),
    ("hpf", FunctionKind::Hpf),
    ("delay", FunctionKind::Delay),
    ("pitch", FunctionKind::Pitch),
];

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            functions: Vec::new(),
        }
    }

    /// The registry holding every built-in function.
    pub fn with_builtins() -> Self {
        Self {
            functions: BUILTINS
                .iter()
                .map(|&(name, kind)| Function::new(name, kind))
                .collect(),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Function> {
        self.functions.iter().find(|f| f.name() == name).cloned()
    }

    /// Add a sample playback function bound to the host's sample loader.
    pub fn register_sample_function(&mut self, name: &str) -> Result<(), RegistryError> {
        self.register(Function::new(name, FunctionKind::Sample))
    }

    pub fn register(&mut self, function: Function) -> Result<(), RegistryError> {
        let valid = function
            .name()
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && function
                .name()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '#');
        if !valid {
            return Err(RegistryError::InvalidName(function.name().to_string()));
        }
        if self.lookup(function.name()).is_some() {
            return Err(RegistryError::Duplicate(function.name().to_string()));
        }
        if self.functions.len() >= MAX_FUNCTIONS {
            return Err(RegistryError::Full);
        }
        self.functions.push(function);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.iter().map(Function::name)
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Everything a function needs besides its arguments and context.
pub struct Env {
    sample_rate: f32,
    seed: u64,
    rng: ChaCha8Rng,
    drums: Arc<DrumKit>,
    loader: Option<Arc<dyn SampleLoader>>,
}

impl Env {
    pub fn new(sample_rate: u32, seed: u64) -> Self {
        let sample_rate = sample_rate.max(1);
        Self {
            sample_rate: sample_rate as f32,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            drums: Arc::new(DrumKit::generate(sample_rate, seed)),
            loader: None,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Change the sample rate. The drum kit is regenerated to match.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        let sample_rate = sample_rate.max(1);
        if sample_rate as f32 != self.sample_rate {
            self.sample_rate = sample_rate as f32;
            self.drums = Arc::new(DrumKit::generate(sample_rate, self.seed));
        }
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn drums(&self) -> &DrumKit {
        &self.drums
    }

    pub fn loader(&self) -> Option<&Arc<dyn SampleLoader>> {
        self.loader.as_ref()
    }

    pub fn set_loader(&mut self, loader: Option<Arc<dyn SampleLoader>>) {
        self.loader = loader;
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("sample_rate", &self.sample_rate)
            .field("seed", &self.seed)
            .field("loader", &self.loader.is_some())
            .finish()
    }
}

/// Run one call site for one sample.
pub fn call(call: &mut Call, env: &mut Env) -> f32 {
    let Call {
        function,
        args,
        context,
    } = call;
    let args = args.as_mut_slice();
    match (function.kind(), context) {
        (FunctionKind::S, _) => math::s(args, env),
        (FunctionKind::R, _) => math::r(args, env),
        (FunctionKind::L, _) => math::l(args, env),
        (FunctionKind::A, _) => math::a(args, env),
        (FunctionKind::Scale, _) => math::scale(args, env),
        (FunctionKind::Hz, _) => math::hz(args, env),
        (FunctionKind::Each, CallContext::Each(state)) => mix::each(state, args, env),
        (FunctionKind::Sin, CallContext::Osc(state)) => {
            osc::oscillator(osc::Waveform::Sine, state, args, env)
        }
        (FunctionKind::Tri, CallContext::Osc(state)) => {
            osc::oscillator(osc::Waveform::Triangle, state, args, env)
        }
        (FunctionKind::Saw, CallContext::Osc(state)) => {
            osc::oscillator(osc::Waveform::Saw, state, args, env)
        }
        (FunctionKind::Sqr, CallContext::Osc(state)) => {
            osc::oscillator(osc::Waveform::Square, state, args, env)
        }
        (FunctionKind::Fm, CallContext::Fm(state)) => osc::fm(state, args, env),
        (FunctionKind::Tr808, CallContext::Playback(state)) => drums::tr808(state, args, env),
        (FunctionKind::Seq, CallContext::Seq(state)) => seq::seq(state, args, env),
        (FunctionKind::Loop, CallContext::Seq(state)) => seq::looped(state, args, env),
        (FunctionKind::Env, CallContext::Env(state)) => env::envelope(state, args, env),
        (FunctionKind::Mix, CallContext::Mix(state)) => mix::mix(state, args, env),
        (FunctionKind::Lpf, CallContext::Filter(state)) => {
            filter::filter(filter::Mode::LowPass, state, args, env)
        }
        (FunctionKind::Hpf, CallContext::Filter(state)) => {
            filter::filter(filter::Mode::HighPass, state, args, env)
        }
        (FunctionKind::Delay, CallContext::Delay(state)) => delay::delay(state, args, env),
        (FunctionKind::Pitch, CallContext::Pitch(state)) => pitch::pitch(state, args, env),
        (FunctionKind::Sample, CallContext::Playback(state)) => {
            sample::sample(function.name(), state, args, env)
        }
        // Contexts are created from the kind, so this only happens if a
        // context was swapped by hand.
        _ => f32::NAN,
    }
}
