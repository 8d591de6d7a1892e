//! Handles the creation and verification of (Ethereum) Signatures.

use crate::types::{Address, Hash, Signature};
use sha3::{Digest, Keccak256};

mod k256;
pub use self::k256::{Error, Signer};

#[cfg(test)]
mod tests;

/// Add the `\x19Ethereum Signed Message\n<length>` prefix to hash.
///
/// Signatures are made over this prefixed hash so a state signature can never
/// be replayed as a transaction signature.
fn hash_to_eth_signed_msg_hash(hash: Hash) -> Hash {
    // Packed encoding => We can't use the serializer
    let mut hasher = Keccak256::new();
    hasher.update(b"\x19Ethereum Signed Message:\n32");
    hasher.update(hash.0);
    Hash(hasher.finalize().into())
}

/// Recover the address that produced `sig` over `msg`.
///
/// Does not need a private key, this is what the adjudicator uses.
pub fn recover_signer(msg: Hash, sig: Signature) -> Result<Address, Error> {
    self::k256::recover(msg, sig)
}

/// Check that `sig` over `msg` was produced by `expected`.
pub fn verify(msg: Hash, sig: Signature, expected: Address) -> bool {
    matches!(recover_signer(msg, sig), Ok(addr) if addr == expected)
}
