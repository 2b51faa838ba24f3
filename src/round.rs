//! One Feistel round over the block batch, with named cut points.
//!
//! The round never swaps halves; the driver alternates which column pair
//! plays the left half by round parity and hands the four columns in here
//! as aliases `(a1, a2, a3, a4)`. The F-function of `(a3, a4)` is XORed
//! into `(a1, a2)` in place.
//!
//! A [`RoundCapture`] names the cut point to record for every block. The
//! early cut points stop the round before the state-updating XOR; the `F`
//! and `Output` cut points record their value and complete the round, so
//! the persisted state is ready for the next one.

use crate::sbox::g;

/// The cut point recorded by [`apply`], together with the buffer that
/// receives one value per block.
pub enum RoundCapture<'a> {
    /// Run the round to completion, record nothing.
    None,
    /// Both subkey XOR words, packed `(x0 << 32) | x2`; stops the round.
    AddRoundKey(&'a mut [u64]),
    /// Output of the first G invocation; stops the round.
    Gda(&'a mut [u32]),
    /// Output of the second G invocation; stops the round.
    Gc(&'a mut [u32]),
    /// Output of the third G invocation; stops the round.
    Gdb(&'a mut [u32]),
    /// The full F-function value `(x8 << 32) | x7`; the round completes.
    F(&'a mut [u64]),
    /// The post-round state serialized big-endian in alias order, 16 bytes
    /// per block; the round completes.
    Output(&'a mut [u8]),
}

impl<'a> RoundCapture<'a> {
    /// Splits the capture buffer into per-worker parts matching a split of
    /// the block columns into `chunk`-sized pieces.
    pub fn split(self, chunk: usize, workers: usize) -> Vec<RoundCapture<'a>> {
        match self {
            RoundCapture::None => (0..workers).map(|_| RoundCapture::None).collect(),
            RoundCapture::AddRoundKey(buf) => {
                buf.chunks_mut(chunk).map(RoundCapture::AddRoundKey).collect()
            }
            RoundCapture::Gda(buf) => buf.chunks_mut(chunk).map(RoundCapture::Gda).collect(),
            RoundCapture::Gc(buf) => buf.chunks_mut(chunk).map(RoundCapture::Gc).collect(),
            RoundCapture::Gdb(buf) => buf.chunks_mut(chunk).map(RoundCapture::Gdb).collect(),
            RoundCapture::F(buf) => buf.chunks_mut(chunk).map(RoundCapture::F).collect(),
            RoundCapture::Output(buf) => {
                buf.chunks_mut(chunk * 16).map(RoundCapture::Output).collect()
            }
        }
    }
}

/// The F-function of one block: `(c, d)` is the right half, `(k0, k1)` the
/// subkey pair. Returns `(x8, x7)`, the two words XORed into the left half.
#[inline(always)]
fn feistel_f(c: u32, d: u32, k0: u32, k1: u32) -> (u32, u32) {
    let x0 = c ^ k0;
    let x2 = (d ^ k1) ^ x0;
    let x3 = g(x2);
    let x5 = g(x3.wrapping_add(x0));
    let x7 = g(x5.wrapping_add(x3));
    (x5.wrapping_add(x7), x7)
}

/// Applies one round to the aliased columns, recording the requested cut
/// point per block.
///
/// Subkeys are indexed `(key_base + i) * key_stride`: stride 1 pairs each
/// block with its own key, stride 0 broadcasts the single key at index 0.
/// `key_base` is the absolute index of the first block in these slices, so
/// workers operating on a chunk of the batch pass their chunk offset.
pub fn apply(
    a1: &mut [u32],
    a2: &mut [u32],
    a3: &[u32],
    a4: &[u32],
    ks0: &[u32],
    ks1: &[u32],
    key_base: usize,
    key_stride: usize,
    capture: RoundCapture,
) {
    match capture {
        RoundCapture::None => {
            for i in 0..a1.len() {
                let ki = (key_base + i) * key_stride;
                let (x8, x7) = feistel_f(a3[i], a4[i], ks0[ki], ks1[ki]);
                a1[i] ^= x8;
                a2[i] ^= x7;
            }
        }
        RoundCapture::AddRoundKey(out) => {
            for i in 0..a1.len() {
                let ki = (key_base + i) * key_stride;
                let x0 = a3[i] ^ ks0[ki];
                let x2 = (a4[i] ^ ks1[ki]) ^ x0;
                out[i] = (u64::from(x0) << 32) | u64::from(x2);
            }
        }
        RoundCapture::Gda(out) => {
            for i in 0..a1.len() {
                let ki = (key_base + i) * key_stride;
                let x0 = a3[i] ^ ks0[ki];
                let x2 = (a4[i] ^ ks1[ki]) ^ x0;
                out[i] = g(x2);
            }
        }
        RoundCapture::Gc(out) => {
            for i in 0..a1.len() {
                let ki = (key_base + i) * key_stride;
                let x0 = a3[i] ^ ks0[ki];
                let x2 = (a4[i] ^ ks1[ki]) ^ x0;
                let x3 = g(x2);
                out[i] = g(x3.wrapping_add(x0));
            }
        }
        RoundCapture::Gdb(out) => {
            for i in 0..a1.len() {
                let ki = (key_base + i) * key_stride;
                let x0 = a3[i] ^ ks0[ki];
                let x2 = (a4[i] ^ ks1[ki]) ^ x0;
                let x3 = g(x2);
                let x5 = g(x3.wrapping_add(x0));
                out[i] = g(x5.wrapping_add(x3));
            }
        }
        RoundCapture::F(out) => {
            for i in 0..a1.len() {
                let ki = (key_base + i) * key_stride;
                let (x8, x7) = feistel_f(a3[i], a4[i], ks0[ki], ks1[ki]);
                out[i] = (u64::from(x8) << 32) | u64::from(x7);
                a1[i] ^= x8;
                a2[i] ^= x7;
            }
        }
        RoundCapture::Output(out) => {
            for (i, block) in out.chunks_exact_mut(16).enumerate() {
                let ki = (key_base + i) * key_stride;
                let (x8, x7) = feistel_f(a3[i], a4[i], ks0[ki], ks1[ki]);
                a1[i] ^= x8;
                a2[i] ^= x7;

                block[0..4].copy_from_slice(&a1[i].to_be_bytes());
                block[4..8].copy_from_slice(&a2[i].to_be_bytes());
                block[8..12].copy_from_slice(&a3[i].to_be_bytes());
                block[12..16].copy_from_slice(&a4[i].to_be_bytes());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // First round of the standard's zero-key test vector: plaintext
    // 000102030405060708090a0b0c0d0e0f under subkeys (7c8f8c7e, c737a22c).
    const V: [u32; 4] = [0x00010203, 0x04050607, 0x08090a0b, 0x0c0d0e0f];
    const KS: (u32, u32) = (0x7c8f8c7e, 0xc737a22c);

    #[test]
    fn full_round_updates_left_half_in_place() {
        let mut a1 = vec![V[0]];
        let mut a2 = vec![V[1]];
        let a3 = vec![V[2]];
        let a4 = vec![V[3]];

        apply(&mut a1, &mut a2, &a3, &a4, &[KS.0], &[KS.1], 0, 0, RoundCapture::None);

        assert_eq!(a1[0], 0x8081bc57);
        assert_eq!(a2[0], 0xc4ea8a1f);
    }

    #[test]
    fn early_cut_points_leave_state_untouched() {
        let mut a1 = vec![V[0]];
        let mut a2 = vec![V[1]];
        let a3 = vec![V[2]];
        let a4 = vec![V[3]];

        let mut ark = vec![0u64; 1];
        let mut gda = vec![0u32; 1];
        let mut gc = vec![0u32; 1];
        let mut gdb = vec![0u32; 1];

        apply(&mut a1, &mut a2, &a3, &a4, &[KS.0], &[KS.1], 0, 0,
              RoundCapture::AddRoundKey(&mut ark));
        apply(&mut a1, &mut a2, &a3, &a4, &[KS.0], &[KS.1], 0, 0,
              RoundCapture::Gda(&mut gda));
        apply(&mut a1, &mut a2, &a3, &a4, &[KS.0], &[KS.1], 0, 0,
              RoundCapture::Gc(&mut gc));
        apply(&mut a1, &mut a2, &a3, &a4, &[KS.0], &[KS.1], 0, 0,
              RoundCapture::Gdb(&mut gdb));

        assert_eq!(ark[0], 0x74868675bfbc2a56);
        assert_eq!(gda[0], 0x3f7f11ef);
        assert_eq!(gc[0], 0xbf91323c);
        assert_eq!(gdb[0], 0xc0ef8c18);

        // the state-updating XOR never ran
        assert_eq!((a1[0], a2[0]), (V[0], V[1]));
    }

    #[test]
    fn f_cut_point_records_and_completes() {
        let mut a1 = vec![V[0]];
        let mut a2 = vec![V[1]];
        let a3 = vec![V[2]];
        let a4 = vec![V[3]];
        let mut f = vec![0u64; 1];

        apply(&mut a1, &mut a2, &a3, &a4, &[KS.0], &[KS.1], 0, 0,
              RoundCapture::F(&mut f));

        assert_eq!(f[0], 0x8080be54c0ef8c18);
        assert_eq!((a1[0], a2[0]), (0x8081bc57, 0xc4ea8a1f));
    }

    #[test]
    fn output_packs_updated_state_big_endian_in_alias_order() {
        let mut a1 = vec![V[0]];
        let mut a2 = vec![V[1]];
        let a3 = vec![V[2]];
        let a4 = vec![V[3]];
        let mut out = vec![0u8; 16];

        apply(&mut a1, &mut a2, &a3, &a4, &[KS.0], &[KS.1], 0, 0,
              RoundCapture::Output(&mut out));

        let mut expected = Vec::new();
        expected.extend_from_slice(&a1[0].to_be_bytes());
        expected.extend_from_slice(&a2[0].to_be_bytes());
        expected.extend_from_slice(&a3[0].to_be_bytes());
        expected.extend_from_slice(&a4[0].to_be_bytes());

        assert_eq!(out, expected);
        assert_eq!(&out[0..4], &[0x80, 0x81, 0xbc, 0x57]);
    }

    #[test]
    fn broadcast_stride_reuses_the_single_subkey() {
        let mut a1 = vec![V[0]; 3];
        let mut a2 = vec![V[1]; 3];
        let a3 = vec![V[2]; 3];
        let a4 = vec![V[3]; 3];

        apply(&mut a1, &mut a2, &a3, &a4, &[KS.0], &[KS.1], 0, 0, RoundCapture::None);

        assert_eq!(a1, vec![0x8081bc57; 3]);
        assert_eq!(a2, vec![0xc4ea8a1f; 3]);
    }
}
