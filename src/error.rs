//! Errors reported by the stepwise driver.
//!
//! Every error resets the engine to the state of a fresh engine of the same
//! direction before it is returned, so a caller can always retry with fixed
//! inputs.

use crate::engine::Direction;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("block buffer length {0} is not a multiple of the 16-byte block size")]
    BlockLength(usize),
    #[error("key buffer length {0} is not a multiple of the 16-byte key size")]
    KeyLength(usize),
    #[error("got {keys} keys for {blocks} blocks, expected 1 or {blocks}")]
    KeyCount { keys: usize, blocks: usize },
    #[error("unknown step id {0}")]
    UnknownStep(u32),
    #[error("round {0} is outside 1..=16")]
    RoundRange(usize),
    #[error("engine is frozen to {0:?}; switching direction needs a new engine")]
    DirectionSwitch(Direction),
}

pub type Result<T> = std::result::Result<T, Error>;
