//! Polyphony slot bank bound to the `k<i>` / `v<i>` variables.

use crate::expr::{VarRef, VariableTable};

/// Number of polyphony slots.
pub const K: usize = 10;

/// One key/velocity cell pair per slot. A slot is free while both cells are
/// NaN.
#[derive(Debug, Clone)]
pub struct Voices {
    slots: Vec<(VarRef, VarRef)>,
}

impl Voices {
    /// Declare `k0..k9` and `v0..v9` in `vars`, all silent.
    pub fn declare(vars: &VariableTable) -> Self {
        let slots = (0..K)
            .filter_map(|i| {
                let key = vars.define(&format!("k{i}"), f32::NAN)?;
                let vel = vars.define(&format!("v{i}"), f32::NAN)?;
                Some((key, vel))
            })
            .collect();
        Self { slots }
    }

    /// Claim the first free slot. Returns the slot index, or `None` when
    /// every slot is busy and the note is dropped.
    pub fn note_on(&self, note: u8, velocity: u8) -> Option<usize> {
        let (index, (key, vel)) = self
            .slots
            .iter()
            .enumerate()
            .find(|(_, (key, vel))| key.get().is_nan() && vel.get().is_nan())?;
        key.set(note as f32 - 69.0);
        vel.set(velocity as f32 / 128.0);
        Some(index)
    }

    /// Free every slot holding `note`. Returns how many were freed.
    pub fn note_off(&self, note: u8) -> usize {
        let key_value = note as f32 - 69.0;
        let mut freed = 0;
        for (key, vel) in &self.slots {
            if key.get() == key_value {
                key.set(f32::NAN);
                vel.set(f32::NAN);
                freed += 1;
            }
        }
        freed
    }

    pub fn all_silent(&self) -> bool {
        self.slots
            .iter()
            .all(|(key, vel)| key.get().is_nan() && vel.get().is_nan())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
