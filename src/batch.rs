//! Loading of flat byte buffers into parallel 32-bit word columns.
//!
//! A batch of 128-bit items (blocks or keys) is stored column-wise: the
//! first word of every item in `x1`, the second in `x2`, and so on. The
//! column layout keeps the per-item loops in the round and schedule engines
//! free of byte shuffling.

/// Four parallel word columns holding a batch of 128-bit items.
///
/// Item `i` occupies `(x1[i], x2[i], x3[i], x4[i])`, each word read
/// big-endian from the corresponding 4-byte group of the flat input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WordBatch {
    pub x1: Vec<u32>,
    pub x2: Vec<u32>,
    pub x3: Vec<u32>,
    pub x4: Vec<u32>,
}

impl WordBatch {
    /// Splits a flat buffer into word columns. The length of `bytes` must
    /// be a multiple of 16; the caller validates this.
    pub fn from_bytes(bytes: &[u8]) -> WordBatch {
        debug_assert_eq!(bytes.len() % 16, 0);

        let n = bytes.len() / 16;
        let mut batch = WordBatch {
            x1: Vec::with_capacity(n),
            x2: Vec::with_capacity(n),
            x3: Vec::with_capacity(n),
            x4: Vec::with_capacity(n),
        };

        for item in bytes.chunks_exact(16) {
            batch.x1.push(u32::from_be_bytes([item[0], item[1], item[2], item[3]]));
            batch.x2.push(u32::from_be_bytes([item[4], item[5], item[6], item[7]]));
            batch.x3.push(u32::from_be_bytes([item[8], item[9], item[10], item[11]]));
            batch.x4.push(u32::from_be_bytes([item[12], item[13], item[14], item[15]]));
        }

        batch
    }

    /// Number of 128-bit items in the batch.
    pub fn len(&self) -> usize {
        self.x1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x1.is_empty()
    }
}
