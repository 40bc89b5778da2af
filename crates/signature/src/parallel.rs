//! Parallel signature generation for basis data already resident in memory.
//!
//! Unlike [`crate::generate_file_signature`], which streams a basis reader
//! sequentially, this module fans block hashing out across `rayon`'s global
//! thread pool. It requires random access to the basis bytes, so callers
//! must already have the whole file (or an mmap) in a slice.

use checksums::strong::{Md4, Md5, Seeded, StrongDigest};
use checksums::RollingChecksum;
use rayon::prelude::*;

use crate::generate::{BlockSum, Signature, SignatureAlgorithm};
use crate::layout::SignatureLayout;

/// Computes a [`Signature`] over `data` by hashing each block in parallel.
///
/// `data.len()` must equal the file length `layout` was derived from;
/// otherwise block boundaries (and in particular the final block's length)
/// will not line up with `layout`.
#[must_use]
pub fn generate_signature_from_slice(
    data: &[u8],
    layout: SignatureLayout,
    algorithm: SignatureAlgorithm,
    seed: [u8; 4],
) -> Signature {
    let block_length = layout.block_length().get() as usize;
    let digest_length = layout.digest_length() as usize;
    let block_count = layout.block_count() as usize;

    let blocks = (0..block_count)
        .into_par_iter()
        .map(|index| {
            let start = index * block_length;
            let end = if index + 1 == block_count {
                data.len()
            } else {
                start + block_length
            };
            hash_block(&data[start..end], algorithm, seed, digest_length)
        })
        .collect();

    Signature::new(blocks)
}

fn hash_block(chunk: &[u8], algorithm: SignatureAlgorithm, seed: [u8; 4], digest_length: usize) -> BlockSum {
    let mut rolling = RollingChecksum::new();
    rolling.update_from_block(chunk);

    let digest = match algorithm {
        SignatureAlgorithm::Md4 => Seeded::<Md4>::digest(seed, chunk).as_ref().to_vec(),
        SignatureAlgorithm::Md5 => Seeded::<Md5>::digest(seed, chunk).as_ref().to_vec(),
    };

    BlockSum::new(
        rolling.value(),
        digest[..digest_length.min(digest.len())].to_vec(),
        chunk.len() as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{calculate_signature_layout, SignatureLayoutParams};
    use crate::generate::generate_file_signature;
    use std::io::Cursor;
    use std::num::{NonZeroU32, NonZeroU8};

    fn layout_for(file_len: u64, block_len: u32) -> SignatureLayout {
        calculate_signature_layout(SignatureLayoutParams::new(
            file_len,
            NonZeroU32::new(block_len),
            NonZeroU8::new(16).unwrap(),
        ))
        .unwrap()
    }

    #[test]
    fn matches_sequential_generation() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let layout = layout_for(data.len() as u64, 64);

        let sequential =
            generate_file_signature(Cursor::new(data.clone()), layout, SignatureAlgorithm::Md5, [5; 4])
                .unwrap();
        let parallel = generate_signature_from_slice(&data, layout, SignatureAlgorithm::Md5, [5; 4]);

        assert_eq!(sequential.blocks(), parallel.blocks());
    }

    #[test]
    fn handles_short_final_block() {
        let data: Vec<u8> = (0..10u8).collect();
        let layout = layout_for(10, 4);
        let sig = generate_signature_from_slice(&data, layout, SignatureAlgorithm::Md5, [0; 4]);
        assert_eq!(sig.blocks().len(), 3);
        assert_eq!(sig.blocks()[2].len(), 2);
    }

    #[test]
    fn empty_slice_produces_no_blocks() {
        let layout = layout_for(0, 700);
        let sig = generate_signature_from_slice(&[], layout, SignatureAlgorithm::Md5, [0; 4]);
        assert!(sig.blocks().is_empty());
    }
}
