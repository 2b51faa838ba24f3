//! The stepwise driver: drives the key schedule and the round engine up to
//! a requested (round, step) cut point over a whole batch.
//!
//! The engine persists block and key state between calls. A request farther
//! along than the previous one continues from the persisted position; a
//! request at or behind it starts the batch over. Only rounds whose
//! state-updating XOR ran advance the persisted position, so capturing an
//! early cut point never corrupts a later request.
//!
//! The per-block loops are data parallel; with `threads > 1` the batch is
//! split into contiguous chunks, one scoped worker per chunk, joined before
//! the next round.

use std::cmp;
use std::str::FromStr;

use crate::batch::WordBatch;
use crate::error::{Error, Result};
use crate::round::{self, RoundCapture};
use crate::schedule::KeySchedule;
use crate::sbox::MAX_ROUNDS;

// The number of threads used for parallel calls is capped by the host
lazy_static! {
    static ref MAX_THREADS: usize = num_cpus::get();
}

/// Cipher direction, frozen at an engine's first `execute`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

impl Direction {
    fn from_flag(decrypt: bool) -> Direction {
        if decrypt {
            Direction::Decrypt
        } else {
            Direction::Encrypt
        }
    }

    /// Key-schedule round feeding block round `r`; decryption consumes the
    /// subkeys in reverse order.
    fn key_round(self, r: usize) -> usize {
        match self {
            Direction::Encrypt => r,
            Direction::Decrypt => MAX_ROUNDS - 1 - r,
        }
    }
}

/// The named cut points inside a round, with their stable numeric IDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Both subkey words of the round, per key.
    RoundKey = 0,
    /// The pre-round right half, per block.
    Right = 1,
    /// Both subkey XOR words, per block.
    AddRoundKey = 2,
    /// Output of the first G invocation, per block.
    Gda = 3,
    /// Output of the second G invocation, per block.
    Gc = 4,
    /// Output of the third G invocation, per block.
    Gdb = 5,
    /// The full F-function value, per block.
    F = 6,
    /// The post-round state, 16 bytes per block. The ciphertext or
    /// plaintext when requested at the final round.
    Output = 7,
}

impl Step {
    /// Resolves a caller-facing numeric step ID.
    pub fn from_id(id: u32) -> Result<Step> {
        match id {
            0 => Ok(Step::RoundKey),
            1 => Ok(Step::Right),
            2 => Ok(Step::AddRoundKey),
            3 => Ok(Step::Gda),
            4 => Ok(Step::Gc),
            5 => Ok(Step::Gdb),
            6 => Ok(Step::F),
            7 => Ok(Step::Output),
            _ => Err(Error::UnknownStep(id)),
        }
    }

    /// The stable numeric ID of this step.
    pub fn id(self) -> u32 {
        self as u32
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "round_key"     => Ok(Step::RoundKey),
            "right"         => Ok(Step::Right),
            "add_round_key" => Ok(Step::AddRoundKey),
            "gda"           => Ok(Step::Gda),
            "gc"            => Ok(Step::Gc),
            "gdb"           => Ok(Step::Gdb),
            "f"             => Ok(Step::F),
            "output"        => Ok(Step::Output),
            _               => Err(String::from("Unknown step name.")),
        }
    }
}

/// One captured intermediate per batch item, in the width the step defines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutput {
    /// 32-bit values, one per block (`Gda`, `Gc`, `Gdb`).
    Words32(Vec<u32>),
    /// Packed 64-bit values (`RoundKey` per key; `Right`, `AddRoundKey`,
    /// `F` per block), high word first.
    Words64(Vec<u64>),
    /// 16 bytes per block, big-endian in alias order (`Output`).
    Blocks(Vec<u8>),
}

impl StepOutput {
    /// Number of batch items the output covers.
    pub fn rows(&self) -> usize {
        match self {
            StepOutput::Words32(v) => v.len(),
            StepOutput::Words64(v) => v.len(),
            StepOutput::Blocks(v) => v.len() / 16,
        }
    }
}

/// An instrumented SEED engine over one batch of blocks and keys.
///
/// Persisted state caches prefix computation only; it is dropped whenever a
/// request cannot reuse it, and dropping it never changes results.
pub struct SeedEngine {
    direction: Option<Direction>,
    blocks: Option<WordBatch>,
    schedule: Option<KeySchedule>,
    /// Highest round whose transformation is fully applied to the blocks.
    block_round: Option<usize>,
}

impl SeedEngine {
    pub fn new() -> SeedEngine {
        SeedEngine {
            direction: None,
            blocks: None,
            schedule: None,
            block_round: None,
        }
    }

    /// Drops all persisted batch state. Idempotent. The direction stays
    /// frozen for the lifetime of the engine.
    pub fn reset(&mut self) {
        self.blocks = None;
        self.schedule = None;
        self.block_round = None;
    }

    /// Runs the batch forward to 1-based `round` and returns the value of
    /// `step` there for every batch item.
    ///
    /// `vals` holds `N_v` 16-byte blocks, `keys` either one key (broadcast
    /// to all blocks) or one key per block. `threads` is the worker count
    /// for the per-block loops, clamped to `[1, available cores]`.
    ///
    /// Requesting `Step::Output` at round 16 is the canonical full
    /// encryption or decryption.
    pub fn execute(
        &mut self,
        vals: &[u8],
        keys: &[u8],
        round: usize,
        step: Step,
        decrypt: bool,
        threads: usize,
    ) -> Result<StepOutput> {
        if round == 0 || round > MAX_ROUNDS {
            self.reset();
            return Err(Error::RoundRange(round));
        }
        let round = round - 1;

        if vals.len() % 16 != 0 {
            self.reset();
            return Err(Error::BlockLength(vals.len()));
        }
        if keys.len() % 16 != 0 {
            self.reset();
            return Err(Error::KeyLength(keys.len()));
        }

        let n_v = vals.len() / 16;
        let n_k = keys.len() / 16;

        if n_k != 1 && n_k != n_v {
            self.reset();
            return Err(Error::KeyCount { keys: n_k, blocks: n_v });
        }

        let dir = Direction::from_flag(decrypt);
        match self.direction {
            None => self.direction = Some(dir),
            Some(d) if d != dir => {
                self.reset();
                return Err(Error::DirectionSwitch(d));
            }
            Some(_) => {}
        }

        // Persisted state belongs to one concrete batch. A differently
        // sized batch or a request at or behind the persisted position
        // starts the batch over.
        if self.blocks.as_ref().map_or(false, |b| b.len() != n_v)
            || self.schedule.as_ref().map_or(false, |s| s.len() != n_k)
            || self.block_round.map_or(false, |r| r >= round)
        {
            self.reset();
        }

        if self.blocks.is_none() {
            self.blocks = Some(WordBatch::from_bytes(vals));
        }
        if self.schedule.is_none() {
            self.schedule = Some(KeySchedule::new(keys));
        }

        let threads = cmp::max(1, cmp::min(threads, *MAX_THREADS));
        let key_stride = usize::from(n_k == n_v);

        // Full rounds strictly before the cut round
        let first = self.block_round.map_or(0, |r| r + 1);
        for r in first..round {
            self.advance_schedule(dir, r);
            self.run_round(r, key_stride, threads, RoundCapture::None);
            self.block_round = Some(r);
        }

        // The cut round
        self.advance_schedule(dir, round);

        if step == Step::RoundKey {
            let (ks0, ks1) = self.schedule.as_ref().expect("key state loaded").subkeys();
            let out = ks0
                .iter()
                .zip(ks1)
                .map(|(&hi, &lo)| (u64::from(hi) << 32) | u64::from(lo))
                .collect();
            return Ok(StepOutput::Words64(out));
        }

        if step == Step::Right {
            let blocks = self.blocks.as_ref().expect("block state loaded");
            let (a3, a4) = if round % 2 == 0 {
                (&blocks.x3, &blocks.x4)
            } else {
                (&blocks.x1, &blocks.x2)
            };
            let out = a3
                .iter()
                .zip(a4)
                .map(|(&hi, &lo)| (u64::from(hi) << 32) | u64::from(lo))
                .collect();
            return Ok(StepOutput::Words64(out));
        }

        match step {
            Step::AddRoundKey => {
                let mut out = vec![0u64; n_v];
                self.run_round(round, key_stride, threads, RoundCapture::AddRoundKey(&mut out));
                Ok(StepOutput::Words64(out))
            }
            Step::Gda => {
                let mut out = vec![0u32; n_v];
                self.run_round(round, key_stride, threads, RoundCapture::Gda(&mut out));
                Ok(StepOutput::Words32(out))
            }
            Step::Gc => {
                let mut out = vec![0u32; n_v];
                self.run_round(round, key_stride, threads, RoundCapture::Gc(&mut out));
                Ok(StepOutput::Words32(out))
            }
            Step::Gdb => {
                let mut out = vec![0u32; n_v];
                self.run_round(round, key_stride, threads, RoundCapture::Gdb(&mut out));
                Ok(StepOutput::Words32(out))
            }
            Step::F => {
                let mut out = vec![0u64; n_v];
                self.run_round(round, key_stride, threads, RoundCapture::F(&mut out));
                self.block_round = Some(round);
                Ok(StepOutput::Words64(out))
            }
            Step::Output => {
                let mut out = vec![0u8; 16 * n_v];
                self.run_round(round, key_stride, threads, RoundCapture::Output(&mut out));
                self.block_round = Some(round);
                Ok(StepOutput::Blocks(out))
            }
            Step::RoundKey | Step::Right => unreachable!(),
        }
    }

    /// Makes the subkeys for block round `r` current in the schedule.
    fn advance_schedule(&mut self, dir: Direction, r: usize) {
        let kr = dir.key_round(r);
        self.schedule.as_mut().expect("key state loaded").advance_to(kr);
    }

    /// Applies round `r` to the block columns, aliased by round parity,
    /// splitting the batch across scoped workers when `threads > 1`.
    fn run_round(&mut self, r: usize, key_stride: usize, threads: usize, capture: RoundCapture) {
        let blocks = self.blocks.as_mut().expect("block state loaded");
        let (ks0, ks1) = self.schedule.as_ref().expect("key state loaded").subkeys();

        let (a1, a2, a3, a4) = if r % 2 == 0 {
            (&mut blocks.x1, &mut blocks.x2, &blocks.x3, &blocks.x4)
        } else {
            (&mut blocks.x3, &mut blocks.x4, &blocks.x1, &blocks.x2)
        };

        let n = a1.len();
        if threads <= 1 || n < 2 * threads {
            round::apply(a1, a2, a3, a4, ks0, ks1, 0, key_stride, capture);
            return;
        }

        let chunk = (n + threads - 1) / threads;
        let workers = (n + chunk - 1) / chunk;
        let captures = capture.split(chunk, workers);

        // Start scoped worker threads over disjoint chunks of the batch
        crossbeam_utils::thread::scope(|scope| {
            let parts = a1
                .chunks_mut(chunk)
                .zip(a2.chunks_mut(chunk))
                .zip(a3.chunks(chunk).zip(a4.chunks(chunk)))
                .zip(captures);

            for (t, (((c1, c2), (c3, c4)), cap)) in parts.enumerate() {
                scope.spawn(move |_| {
                    round::apply(c1, c2, c3, c4, ks0, ks1, t * chunk, key_stride, cap);
                });
            }
        })
        .expect("Threads failed to join.");
    }
}

impl Default for SeedEngine {
    fn default() -> SeedEngine {
        SeedEngine::new()
    }
}

/// Encrypts whole blocks: the round-16 `Output` request on a fresh engine.
pub fn encrypt_blocks(vals: &[u8], keys: &[u8]) -> Result<Vec<u8>> {
    one_shot(vals, keys, false)
}

/// Decrypts whole blocks: the round-16 `Output` request on a fresh engine.
pub fn decrypt_blocks(vals: &[u8], keys: &[u8]) -> Result<Vec<u8>> {
    one_shot(vals, keys, true)
}

fn one_shot(vals: &[u8], keys: &[u8], decrypt: bool) -> Result<Vec<u8>> {
    let mut engine = SeedEngine::new();

    match engine.execute(vals, keys, MAX_ROUNDS, Step::Output, decrypt, 1)? {
        StepOutput::Blocks(out) => Ok(out),
        _ => unreachable!("Output step always yields blocks"),
    }
}
