/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Cryptographic primitives.
//!
//! The definitions and re-exports in this module provide the **cryptographic hash** used to address
//! blocks and to check their proof-of-work. Hashes are provided by the [`sha2`] crate.

use super::data_types::{CryptoHash, HASH_LEN};

// re-exports below.
pub use sha2::Digest;
pub use sha2::Sha256 as CryptoHasher;

/// Finish `hasher` and truncate its 32-byte digest into a [`CryptoHash`].
pub(crate) fn finalize(hasher: CryptoHasher) -> CryptoHash {
    let digest = hasher.finalize();
    let mut bytes = [0u8; HASH_LEN];
    bytes.copy_from_slice(&digest[..HASH_LEN]);
    CryptoHash::new(bytes)
}

/// Count the number of leading zero bits in `bytes`, reading each byte from its most significant bit.
pub fn leading_zero_bits(bytes: &[u8]) -> u32 {
    let mut count = 0;
    for &byte in bytes {
        if byte == 0 {
            count += 8;
        } else {
            count += byte.leading_zeros();
            break;
        }
    }
    count
}
