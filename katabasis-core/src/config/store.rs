//! Persistent parameter store
//!
//! Layout of the nonvolatile page, byte offsets:
//!
//! ```text
//! 0x000 ┌──────────────────────────────┐
//!       │ entropy ring (seed windows)  │
//! 0x3e0 ├──────────────────────────────┤
//!       │ parameter words (Field::ALL) │
//! 0x3f0 │ seed cursor                  │
//! 0x3f2 │ sentinel key (0x55aa)        │
//! 0x3f4 └──────────────────────────────┘
//! ```
//!
//! A missing or mismatched sentinel means blank or corrupted storage;
//! the store rewrites every field from its compiled default, resets the
//! seed cursor, and only then writes the sentinel, so an interrupted
//! reinitialization is re-run in full on the next boot.

use super::fields::{Config, Field};
use crate::traits::NonVolatile;

/// Length of the entropy ring region at the bottom of the page.
pub const SEED_REGION_LEN: u16 = 0x3e0;
/// Start of the parameter block, directly above the ring.
pub const PARAM_BASE: u16 = SEED_REGION_LEN;
/// Seed cursor word: byte offset of the current window into the ring.
pub const SEED_CURSOR_OFFSET: u16 = PARAM_BASE + 0x10;
/// Sentinel key word.
pub const KEY_OFFSET: u16 = PARAM_BASE + 0x12;
/// Sentinel value marking the page as initialized.
pub const KEY_VALUE: u16 = 0x55aa;
/// The cursor advances one window per boot.
pub const SEED_STRIDE: u16 = 4;

/// Parameter store over a nonvolatile page.
pub struct ParamStore<NV> {
    nv: NV,
}

impl<NV: NonVolatile> ParamStore<NV> {
    pub fn new(nv: NV) -> Self {
        Self { nv }
    }

    /// Load the configuration, reinitializing blank/corrupted storage.
    ///
    /// Called once at boot.
    pub fn load(&mut self) -> Config {
        if self.nv.read_word(KEY_OFFSET) != KEY_VALUE {
            self.reinitialize();
        }
        let mut cfg = Config::compiled_defaults();
        for field in Field::ALL {
            cfg.set(field, self.nv.read_word(PARAM_BASE + field.offset()));
        }
        cfg
    }

    /// Persist a single field.
    ///
    /// The two-byte write is torn-read-safe by the [`NonVolatile`]
    /// contract (the implementation locks out the tick interrupt).
    pub fn save(&mut self, field: Field, value: u16) {
        self.nv.write_word(PARAM_BASE + field.offset(), value);
    }

    /// Rotate the entropy ring and return this boot's PRNG seed.
    ///
    /// The cursor advances by one window, wrapping when the next window
    /// would overrun the ring. The window's current contents become the
    /// seed, and a successor value is left behind so that even a ring
    /// of blank storage yields a different draw sequence next boot.
    pub fn take_seed(&mut self) -> u32 {
        let next = self.nv.read_word(SEED_CURSOR_OFFSET).saturating_add(SEED_STRIDE);
        let cursor = if next.saturating_add(SEED_STRIDE) > SEED_REGION_LEN {
            0
        } else {
            next
        };
        self.nv.write_word(SEED_CURSOR_OFFSET, cursor);

        let seed = self.nv.read_seed(cursor);
        let successor = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        self.nv.write_seed(cursor, successor);
        seed
    }

    fn reinitialize(&mut self) {
        for field in Field::ALL {
            self.nv
                .write_word(PARAM_BASE + field.offset(), field.default_value());
        }
        self.nv.write_word(SEED_CURSOR_OFFSET, 0);
        self.nv.write_word(KEY_OFFSET, KEY_VALUE);
    }
}
