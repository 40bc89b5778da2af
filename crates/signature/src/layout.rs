//! Block-size and digest-length selection for a file signature.

use std::num::{NonZeroU32, NonZeroU8};

/// Default block length for files at or below the square threshold.
pub const DEFAULT_BLOCK_LENGTH: u32 = 700;

/// Largest block length this implementation will ever choose or accept.
pub const MAX_BLOCK_LENGTH: u32 = 1 << 17;

/// Smallest strong-digest length a signature may use.
pub const MIN_DIGEST_LENGTH: u8 = 2;

/// Largest strong-digest length a signature may use (full MD4/MD5 width).
pub const MAX_DIGEST_LENGTH: u8 = 16;

/// Inputs to [`calculate_signature_layout`].
#[derive(Debug, Clone, Copy)]
pub struct SignatureLayoutParams {
    file_len: u64,
    block_len_override: Option<NonZeroU32>,
    digest_len: NonZeroU8,
}

impl SignatureLayoutParams {
    /// Builds layout parameters for a file of `file_len` bytes.
    ///
    /// `block_len_override`, when present, forces the block length instead
    /// of deriving it from `file_len`. `digest_len` requests a strong-digest
    /// truncation length; it is clamped into `[2, 16]` by
    /// [`calculate_signature_layout`].
    #[must_use]
    pub const fn new(
        file_len: u64,
        block_len_override: Option<NonZeroU32>,
        digest_len: NonZeroU8,
    ) -> Self {
        Self {
            file_len,
            block_len_override,
            digest_len,
        }
    }
}

/// Error produced while deriving a [`SignatureLayout`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum SignatureLayoutError {
    /// An explicit block length override exceeded [`MAX_BLOCK_LENGTH`].
    #[error("block length {0} exceeds the maximum of {MAX_BLOCK_LENGTH}")]
    BlockLengthTooLarge(u32),
}

/// Resolved block layout for computing or consuming a file's signature.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SignatureLayout {
    block_length: NonZeroU32,
    block_count: u64,
    remainder: u32,
    digest_length: u8,
}

impl SignatureLayout {
    /// Length in bytes of every block except (possibly) the last.
    #[must_use]
    pub const fn block_length(&self) -> NonZeroU32 {
        self.block_length
    }

    /// Total number of blocks, including a short final block.
    #[must_use]
    pub const fn block_count(&self) -> u64 {
        self.block_count
    }

    /// Length in bytes of the final block. Equal to `block_length` when the
    /// file divides evenly; `0` only when the file itself is empty.
    #[must_use]
    pub const fn remainder(&self) -> u32 {
        self.remainder
    }

    /// Truncation length, in bytes, applied to each block's strong digest.
    #[must_use]
    pub const fn digest_length(&self) -> u8 {
        self.digest_length
    }
}

/// Derives a [`SignatureLayout`] for a file of the given length.
///
/// Block length follows upstream rsync's `sum_sizes_sqroot` heuristic when
/// no override is supplied: files at or below `700 * 700` bytes use the
/// default 700-byte block; larger files scale the block length so that the
/// resulting block count grows roughly with the square root of the file
/// size, via the same bit-doubling search upstream performs (rather than a
/// plain floating-point `sqrt`, which would not reproduce its boundaries
/// bit-for-bit).
///
/// # Errors
///
/// Returns [`SignatureLayoutError::BlockLengthTooLarge`] if an explicit
/// override exceeds [`MAX_BLOCK_LENGTH`].
pub fn calculate_signature_layout(
    params: SignatureLayoutParams,
) -> Result<SignatureLayout, SignatureLayoutError> {
    let block_length = match params.block_len_override {
        Some(forced) => {
            if forced.get() > MAX_BLOCK_LENGTH {
                return Err(SignatureLayoutError::BlockLengthTooLarge(forced.get()));
            }
            forced.get()
        }
        None => sum_sizes_sqroot(params.file_len).min(MAX_BLOCK_LENGTH),
    };

    let (block_count, remainder) = if params.file_len == 0 {
        (0, 0)
    } else {
        let count = params.file_len.div_ceil(u64::from(block_length));
        let rem = params.file_len % u64::from(block_length);
        let remainder = if rem == 0 { block_length } else { rem as u32 };
        (count, remainder)
    };

    let digest_length = params
        .digest_len
        .get()
        .clamp(MIN_DIGEST_LENGTH, MAX_DIGEST_LENGTH);

    Ok(SignatureLayout {
        // Never 0: either an override validated non-zero by `NonZeroU32`,
        // or `sum_sizes_sqroot`, which never returns 0.
        block_length: NonZeroU32::new(block_length).expect("block length is never zero"),
        block_count,
        remainder,
        digest_length,
    })
}

/// Upstream rsync's `sum_sizes_sqroot`: finds, via binary search over bit
/// positions rather than floating-point `sqrt`, the largest block length
/// `b` such that `b * b <= len`, then floors it at [`DEFAULT_BLOCK_LENGTH`].
fn sum_sizes_sqroot(len: u64) -> u32 {
    if len <= u64::from(DEFAULT_BLOCK_LENGTH) * u64::from(DEFAULT_BLOCK_LENGTH) {
        return DEFAULT_BLOCK_LENGTH;
    }

    let mut probe: u64 = 1;
    let mut remaining = len;
    while {
        remaining >>= 2;
        remaining != 0
    } {
        probe <<= 1;
    }

    let mut block_length: u64 = 0;
    loop {
        block_length |= probe;
        if len < block_length * block_length {
            block_length &= !probe;
        }
        probe >>= 1;
        if probe == 0 {
            break;
        }
    }

    if block_length < u64::from(DEFAULT_BLOCK_LENGTH) {
        block_length = u64::from(DEFAULT_BLOCK_LENGTH);
    }

    u32::try_from(block_length).unwrap_or(MAX_BLOCK_LENGTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(file_len: u64, digest_len: u8) -> SignatureLayoutParams {
        SignatureLayoutParams::new(file_len, None, NonZeroU8::new(digest_len).unwrap())
    }

    fn params_with_block(file_len: u64, block_len: u32, digest_len: u8) -> SignatureLayoutParams {
        SignatureLayoutParams::new(
            file_len,
            NonZeroU32::new(block_len),
            NonZeroU8::new(digest_len).unwrap(),
        )
    }

    #[test]
    fn small_files_use_default_block_length() {
        for size in [1u64, 10, 100, 699, 700, 490_000] {
            let layout = calculate_signature_layout(params(size, 16)).unwrap();
            assert_eq!(layout.block_length().get(), DEFAULT_BLOCK_LENGTH);
        }
    }

    #[test]
    fn exact_block_length_multiple_has_no_remainder_shortfall() {
        let layout = calculate_signature_layout(params(1400, 16)).unwrap();
        assert_eq!(layout.block_length().get(), 700);
        assert_eq!(layout.block_count(), 2);
        assert_eq!(layout.remainder(), 700);
    }

    #[test]
    fn partial_final_block_reports_its_own_length() {
        let layout = calculate_signature_layout(params(750, 16)).unwrap();
        assert_eq!(layout.block_length().get(), 700);
        assert_eq!(layout.block_count(), 2);
        assert_eq!(layout.remainder(), 50);
    }

    #[test]
    fn empty_file_has_no_blocks() {
        let layout = calculate_signature_layout(params(0, 16)).unwrap();
        assert_eq!(layout.block_count(), 0);
        assert_eq!(layout.remainder(), 0);
    }

    #[test]
    fn block_length_grows_with_file_size_beyond_threshold() {
        let small = calculate_signature_layout(params(490_001, 16)).unwrap();
        let large = calculate_signature_layout(params(100_000_000, 16)).unwrap();
        assert!(large.block_length().get() > small.block_length().get());
    }

    #[test]
    fn block_length_never_decreases_as_file_size_grows() {
        let sizes = [1_000u64, 10_000, 100_000, 1_000_000, 10_000_000, 100_000_000];
        let mut prev = 0;
        for size in sizes {
            let layout = calculate_signature_layout(params(size, 16)).unwrap();
            assert!(layout.block_length().get() >= prev);
            prev = layout.block_length().get();
        }
    }

    #[test]
    fn block_length_never_exceeds_protocol_maximum() {
        let layout = calculate_signature_layout(params(1u64 << 40, 16)).unwrap();
        assert!(layout.block_length().get() <= MAX_BLOCK_LENGTH);
    }

    #[test]
    fn forced_block_length_is_honoured_exactly() {
        let layout = calculate_signature_layout(params_with_block(1000, 1, 16)).unwrap();
        assert_eq!(layout.block_length().get(), 1);
        assert_eq!(layout.block_count(), 1000);
        assert_eq!(layout.remainder(), 1);
    }

    #[test]
    fn forced_block_length_above_maximum_is_rejected() {
        let err =
            calculate_signature_layout(params_with_block(1_000_000, MAX_BLOCK_LENGTH + 1, 16))
                .unwrap_err();
        assert_eq!(err, SignatureLayoutError::BlockLengthTooLarge(MAX_BLOCK_LENGTH + 1));
    }

    #[test]
    fn digest_length_is_clamped_into_valid_range() {
        let layout = calculate_signature_layout(params(100, 1)).unwrap();
        assert_eq!(layout.digest_length(), MIN_DIGEST_LENGTH);

        let layout = calculate_signature_layout(params(100, 200)).unwrap();
        assert_eq!(layout.digest_length(), MAX_DIGEST_LENGTH);
    }
}
