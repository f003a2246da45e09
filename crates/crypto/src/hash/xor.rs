use super::{Digest, HashAlgorithm, Hasher};

/// An 8-bit folding hash for tests.
///
/// Every byte of every part is XOR-folded into a single output byte, so
/// interior hashes reduce to `left ^ right` and fixtures stay computable by
/// hand. The salt is ignored. Not collision resistant; test code only.
pub struct XorHasher;

impl Hasher for XorHasher {
    fn algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::Xor
    }

    fn output_bits(&self) -> u16 {
        8
    }

    fn digest(&self, parts: &[&[u8]]) -> Digest {
        let mut acc = 0u8;
        for part in parts {
            for byte in *part {
                acc ^= byte;
            }
        }
        Digest::new(vec![acc])
    }

    fn salted(&self, _salt: &[u8], parts: &[&[u8]]) -> Digest {
        self.digest(parts)
    }
}
