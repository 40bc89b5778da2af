//! Strong checksum implementations used to confirm rolling-checksum matches
//! and to verify whole-file integrity after reconstruction.
//!
//! The wire protocol negotiates MD4 (protocol &lt; 30) or MD5 (protocol &gt;= 30)
//! as the strong checksum, and mixes the session's checksum seed into every
//! digest. [`Seeded`] wraps either algorithm to apply that mixing consistently
//! for both per-block and whole-file digests.

mod md4;
mod md5;

pub use md4::Md4;
pub use md5::Md5;

/// Trait implemented by strong checksum algorithms used to confirm block matches.
///
/// Implementors provide a streaming interface: callers feed data
/// incrementally via [`Self::update`] and then obtain the final digest
/// through [`Self::finalize`]. The associated [`DIGEST_LEN`](Self::DIGEST_LEN)
/// constant exposes the byte width of the resulting hash so higher layers can
/// size buffers without hard-coding algorithm-specific knowledge.
///
/// # Examples
///
/// ```
/// use checksums::strong::{Md5, StrongDigest};
///
/// let mut hasher = Md5::new();
/// hasher.update(b"example");
/// let digest = hasher.finalize();
/// assert_eq!(digest.as_ref().len(), Md5::DIGEST_LEN);
/// ```
pub trait StrongDigest: Sized {
    /// Type used to parameterise a new digest instance.
    type Seed: Default;

    /// Type returned when finalising the digest.
    type Digest: AsRef<[u8]> + Copy;

    /// Length of the final digest in bytes.
    const DIGEST_LEN: usize;

    /// Creates a new hasher with an empty state.
    fn new() -> Self {
        Self::with_seed(Default::default())
    }

    /// Creates a new hasher using the provided seed value.
    fn with_seed(seed: Self::Seed) -> Self;

    /// Feeds additional bytes into the digest state.
    fn update(&mut self, data: &[u8]);

    /// Finalises the digest and returns the resulting hash.
    fn finalize(self) -> Self::Digest;

    /// Convenience helper that hashes `data` in a single call.
    fn digest(data: &[u8]) -> Self::Digest {
        Self::digest_with_seed(Default::default(), data)
    }

    /// Convenience helper that hashes `data` using an explicit seed value.
    fn digest_with_seed(seed: Self::Seed, data: &[u8]) -> Self::Digest {
        let mut hasher = Self::with_seed(seed);
        hasher.update(data);
        hasher.finalize()
    }
}

/// Mixes a session's 4-byte checksum seed into a strong digest.
///
/// The seed is prepended to the data stream before any other bytes, matching
/// the order in which the handshake's negotiated seed is folded into both the
/// per-block strong digests (used to confirm a rolling-checksum match) and the
/// whole-file digest (used to verify a completed transfer).
#[derive(Clone, Debug)]
pub struct Seeded<D> {
    inner: D,
}

impl<D> Seeded<D>
where
    D: StrongDigest<Seed = ()>,
{
    /// Creates a seeded hasher, folding `seed` in ahead of any data.
    #[must_use]
    pub fn new(seed: [u8; 4]) -> Self {
        let mut inner = D::new();
        inner.update(&seed);
        Self { inner }
    }

    /// Feeds additional bytes into the digest state.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalises the digest and returns the resulting hash.
    #[must_use]
    pub fn finalize(self) -> D::Digest {
        self.inner.finalize()
    }

    /// Convenience helper that hashes `data` with `seed` mixed in, in a single call.
    #[must_use]
    pub fn digest(seed: [u8; 4], data: &[u8]) -> D::Digest {
        let mut hasher = Self::new(seed);
        hasher.update(data);
        hasher.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::{Md4, Md5, Seeded, StrongDigest};

    #[test]
    fn md5_trait_round_trip_matches_inherent_api() {
        let input = b"trait-check";

        let mut via_trait = Md5::new();
        via_trait.update(input);
        let trait_digest = via_trait.finalize();

        assert_eq!(trait_digest.as_ref(), Md5::digest(input).as_ref());
    }

    #[test]
    fn md4_trait_digest_matches_inherent_helper() {
        let input = b"weak-md4";

        let digest = Md4::digest(input);
        assert_eq!(
            digest.as_ref(),
            <Md4 as StrongDigest>::digest(input).as_ref()
        );
    }

    #[test]
    fn seeded_digest_differs_from_unseeded() {
        let data = b"block contents";

        let plain = Md5::digest(data);
        let seeded = Seeded::<Md5>::digest([1, 2, 3, 4], data);

        assert_ne!(plain.as_ref(), seeded.as_ref());
    }

    #[test]
    fn seeded_digest_is_deterministic_for_same_seed() {
        let data = b"repeatable block";
        let seed = [9, 8, 7, 6];

        let first = Seeded::<Md4>::digest(seed, data);
        let second = Seeded::<Md4>::digest(seed, data);

        assert_eq!(first.as_ref(), second.as_ref());
    }

    #[test]
    fn seeded_digest_changes_with_seed() {
        let data = b"seed sensitivity";

        let a = Seeded::<Md4>::digest([0, 0, 0, 0], data);
        let b = Seeded::<Md4>::digest([0, 0, 0, 1], data);

        assert_ne!(a.as_ref(), b.as_ref());
    }

    #[test]
    fn seeded_streaming_matches_one_shot() {
        let seed = [5, 4, 3, 2];
        let data = b"streamed in two chunks";

        let mut streamed = Seeded::<Md5>::new(seed);
        streamed.update(&data[..4]);
        streamed.update(&data[4..]);

        assert_eq!(
            streamed.finalize().as_ref(),
            Seeded::<Md5>::digest(seed, data).as_ref()
        );
    }
}
