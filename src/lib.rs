//! seedtrace is an instrumented implementation of the SEED block cipher
//! (KISA / RFC 4269) for side-channel trace analysis.
//!
//! Instead of only producing ciphertext, the engine runs a whole batch of
//! blocks and keys forward to a requested round and named intermediate step
//! and returns that intermediate for every batch item. State is persisted
//! between calls, so walking an analysis through successive cut points only
//! pays for the rounds not yet applied.
//!
//! ```
//! use seedtrace::{SeedEngine, Step};
//!
//! let plaintext = [0u8; 16];
//! let key = [0u8; 16];
//!
//! let mut engine = SeedEngine::new();
//!
//! // the first G output of round 3, for every block in the batch
//! let gda = engine.execute(&plaintext, &key, 3, Step::Gda, false, 1)?;
//!
//! // the full ciphertext, reusing the rounds already applied
//! let ciphertext = engine.execute(&plaintext, &key, 16, Step::Output, false, 1)?;
//! # Ok::<(), seedtrace::Error>(())
//! ```
//!
//! The implementation is table-based and deliberately not hardened against
//! timing side channels; it exists to be analyzed, not to protect data.

#[macro_use]
extern crate lazy_static;

pub mod batch;
pub mod engine;
pub mod error;
pub mod round;
pub mod sbox;
pub mod schedule;

pub use crate::engine::{decrypt_blocks, encrypt_blocks};
pub use crate::engine::{Direction, SeedEngine, Step, StepOutput};
pub use crate::error::{Error, Result};
