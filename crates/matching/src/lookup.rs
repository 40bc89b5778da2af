//! Hash table over a basis file's block-sum list, keyed by the low 16 bits
//! of each block's rolling checksum.
//!
//! Rolling-sum collisions (both within the low-16-bit bucket and, more
//! rarely, across the full 32-bit value) are expected; callers resolve them
//! by strong-digest comparison against the matched candidate.

use rustc_hash::FxHashMap;

use signature::BlockSum;

/// The block-sum fields a lookup bucket needs, factored out so tests can
/// exercise collision handling without depending on [`BlockSum`]'s
/// crate-private constructor.
pub(crate) trait BlockInfo {
    fn rolling_sum(&self) -> u32;
    fn strong_digest(&self) -> &[u8];
    fn len(&self) -> u32;
}

impl BlockInfo for BlockSum {
    fn rolling_sum(&self) -> u32 {
        BlockSum::rolling_sum(self)
    }

    fn strong_digest(&self) -> &[u8] {
        BlockSum::strong_digest(self)
    }

    fn len(&self) -> u32 {
        BlockSum::len(self)
    }
}

/// Looks up candidate basis blocks by rolling-checksum bucket.
pub(crate) struct BlockLookup<'a, B: BlockInfo> {
    blocks: &'a [B],
    buckets: FxHashMap<u16, Vec<usize>>,
}

impl<'a, B: BlockInfo> BlockLookup<'a, B> {
    /// Builds a lookup table over `blocks`, preserving their original order
    /// within each bucket's chain.
    pub(crate) fn build(blocks: &'a [B]) -> Self {
        let mut buckets: FxHashMap<u16, Vec<usize>> = FxHashMap::default();
        for (index, block) in blocks.iter().enumerate() {
            let key = (block.rolling_sum() & 0xFFFF) as u16;
            buckets.entry(key).or_default().push(index);
        }
        Self { blocks, buckets }
    }

    /// Finds the first (in original block order) basis block whose rolling
    /// sum matches `rolling_value`, whose length equals `window.len()`, and
    /// whose strong digest matches `window`'s, computed via `strong_digest`.
    pub(crate) fn find_match(
        &self,
        rolling_value: u32,
        window: &[u8],
        mut strong_digest: impl FnMut(&[u8]) -> Vec<u8>,
    ) -> Option<u64> {
        let key = (rolling_value & 0xFFFF) as u16;
        let candidates = self.buckets.get(&key)?;

        let mut computed_digest: Option<Vec<u8>> = None;
        for &index in candidates {
            let block = &self.blocks[index];
            if block.rolling_sum() != rolling_value || block.len() as usize != window.len() {
                continue;
            }
            let digest = computed_digest.get_or_insert_with(|| strong_digest(window));
            if block.strong_digest() == digest.as_slice() {
                return Some(index as u64);
            }
        }
        None
    }
}
