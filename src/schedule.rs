//! The SEED round-key schedule with persistent, stepwise-advanced state.
//!
//! The schedule keeps the rotated key columns across calls so that driving
//! a batch forward round by round never rederives work it has already done.
//! Advancing is strictly one round at a time; a request behind the current
//! position rewinds to the loaded key material and replays.

use crate::batch::WordBatch;
use crate::sbox::{g, KC, MAX_ROUNDS};

/// Persistent key state for a batch of keys, plus the subkey pair columns
/// derived for the round the state currently sits at.
#[derive(Clone, Debug)]
pub struct KeySchedule {
    /// Key columns exactly as loaded; the rewind target.
    base: WordBatch,
    /// Rotated working columns. After round `r` has been derived these hold
    /// the input to round `r + 1`'s derivation.
    state: WordBatch,
    ks0: Vec<u32>,
    ks1: Vec<u32>,
    /// Round the subkeys are valid for. `None` until the first advance.
    round: Option<usize>,
}

impl KeySchedule {
    /// Loads a key batch. The length of `keys` must be a multiple of 16;
    /// the caller validates this.
    pub fn new(keys: &[u8]) -> KeySchedule {
        let base = WordBatch::from_bytes(keys);
        let n = base.len();

        KeySchedule {
            state: base.clone(),
            base,
            ks0: vec![0; n],
            ks1: vec![0; n],
            round: None,
        }
    }

    /// Number of keys in the batch.
    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    /// Round the current subkeys belong to, if any round has been derived.
    pub fn round(&self) -> Option<usize> {
        self.round
    }

    /// The subkey pair columns `(ks0, ks1)`, one pair per key, valid for
    /// the round reported by [`round`](Self::round).
    pub fn subkeys(&self) -> (&[u32], &[u32]) {
        (&self.ks0, &self.ks1)
    }

    /// Makes the subkeys for key-round `kr` current.
    ///
    /// Does nothing if they already are. Rewinds to the loaded key material
    /// first if `kr` lies behind the current position, then advances one
    /// round at a time.
    ///
    /// # Panics
    /// Panics if `kr >= MAX_ROUNDS`.
    pub fn advance_to(&mut self, kr: usize) {
        assert!(kr < MAX_ROUNDS);

        match self.round {
            Some(r) if r == kr => return,
            Some(r) if r > kr => self.rewind(),
            _ => {}
        }

        let first = match self.round {
            Some(r) => r + 1,
            None => 0,
        };

        for r in first..=kr {
            self.step(r);
        }

        self.round = Some(kr);
    }

    /// Drops all derived state, keeping the loaded key material.
    pub fn rewind(&mut self) {
        self.state = self.base.clone();
        self.round = None;
    }

    /// One-round advance: the pre-derivation rotation for round `r`,
    /// followed by the subkey derivation at round `r`.
    fn step(&mut self, r: usize) {
        let k1 = &mut self.state.x1;
        let k2 = &mut self.state.x2;
        let k3 = &mut self.state.x3;
        let k4 = &mut self.state.x4;

        for i in 0..k1.len() {
            if r >= 1 {
                if r % 2 == 1 {
                    // Right-rotate the (k1 || k2) pair by 8 bits.
                    let tmp = k1[i];
                    k1[i] = (k1[i] >> 8) ^ (k2[i] << 24);
                    k2[i] = (k2[i] >> 8) ^ (tmp << 24);
                } else {
                    // Left-rotate the (k3 || k4) pair by 8 bits.
                    let tmp = k3[i];
                    k3[i] = (k3[i] << 8) ^ (k4[i] >> 24);
                    k4[i] = (k4[i] << 8) ^ (tmp >> 24);
                }
            }

            let t0 = k1[i].wrapping_add(k3[i]).wrapping_sub(KC[r]);
            let t1 = k2[i].wrapping_sub(k4[i]).wrapping_add(KC[r]);

            self.ks0[i] = g(t0);
            self.ks1[i] = g(t1);
        }
    }
}
