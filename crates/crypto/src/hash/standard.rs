use std::marker::PhantomData;

use super::{Digest, HashAlgorithm, Hasher};

/// A [`Hasher`] backed by any RustCrypto digest implementation.
pub struct StandardHasher<D> {
    algorithm: HashAlgorithm,
    _marker: PhantomData<fn() -> D>,
}

impl<D> StandardHasher<D>
where
    D: digest::Digest,
{
    pub(crate) fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            _marker: PhantomData,
        }
    }

    fn fold(&self, salt: Option<&[u8]>, parts: &[&[u8]]) -> Digest {
        let mut hasher = D::new();
        if let Some(salt) = salt {
            hasher.update(salt);
        }
        for part in parts {
            hasher.update(part);
        }
        Digest::new(hasher.finalize().to_vec())
    }
}

impl<D> Hasher for StandardHasher<D>
where
    D: digest::Digest + Send + Sync,
{
    fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    fn output_bits(&self) -> u16 {
        (<D as digest::Digest>::output_size() * 8) as u16
    }

    fn digest(&self, parts: &[&[u8]]) -> Digest {
        self.fold(None, parts)
    }

    fn salted(&self, salt: &[u8], parts: &[&[u8]]) -> Digest {
        self.fold(Some(salt), parts)
    }
}
