//! Signer using the k256 Rust crate (implementation of ecdsa in Rust).

use crate::types::{Address, Hash, Signature};
use k256::{
    ecdsa::{
        recoverable,
        signature::{hazmat::PrehashSigner, Signature as k256Signature},
        SigningKey, VerifyingKey,
    },
    elliptic_curve::sec1::ToEncodedPoint,
};
use sha3::{Digest, Keccak256};

use super::hash_to_eth_signed_msg_hash;

pub use k256::ecdsa::Error;

#[derive(Debug)]
pub struct Signer {
    key: SigningKey,
    addr: Address,
}

impl From<VerifyingKey> for Address {
    fn from(key: VerifyingKey) -> Self {
        // The uncompressed SEC1 point is always 65 bytes: a 0x04 tag followed
        // by x and y. The address is the last 20 bytes of the Keccak-256 hash
        // of x || y.
        let point = key.to_encoded_point(false);
        let hash: [u8; 32] = Keccak256::digest(&point.as_bytes()[1..]).into();

        let mut addr = Address([0; 20]);
        addr.0.copy_from_slice(&hash[32 - 20..]);
        addr
    }
}

impl Signer {
    /// Generate a fresh key from `rng`.
    pub fn new<R: rand::Rng + rand::CryptoRng>(rng: &mut R) -> Self {
        Self::from_key(SigningKey::random(rng))
    }

    /// Load a key from its 32 byte secret scalar.
    pub fn from_bytes(secret: &[u8; 32]) -> Result<Self, Error> {
        Ok(Self::from_key(SigningKey::from_bytes(secret)?))
    }

    fn from_key(key: SigningKey) -> Self {
        let addr = key.verifying_key().into();
        Self { key, addr }
    }

    pub fn address(&self) -> Address {
        self.addr
    }

    pub fn sign_eth(&self, msg: Hash) -> Signature {
        // "\x19Ethereum Signed Message:\n32" format
        let hash = hash_to_eth_signed_msg_hash(msg);

        // Signing a 32 byte prehash with a valid key cannot fail.
        let sig: recoverable::Signature = match self.key.sign_prehash(&hash.0) {
            Ok(sig) => sig,
            Err(_) => unreachable!("prehash has the size of the curve order"),
        };

        // This Signature type already has the layout we need: 65 bytes
        // containing r, s and v in this order. v is shifted by 27 like in the
        // EVM.
        let mut sig_bytes = [0u8; 65];
        sig_bytes.copy_from_slice(sig.as_bytes());
        sig_bytes[64] += 27;

        Signature(sig_bytes)
    }

    pub fn recover_signer(&self, msg: Hash, eth_sig: Signature) -> Result<Address, Error> {
        recover(msg, eth_sig)
    }
}

pub(super) fn recover(msg: Hash, eth_sig: Signature) -> Result<Address, Error> {
    // "\x19Ethereum Signed Message:\n32" format
    let hash = hash_to_eth_signed_msg_hash(msg);

    // Undo adding the 27, to go back to the format expected below
    let mut sig_bytes: [u8; 65] = eth_sig.0;
    sig_bytes[64] = sig_bytes[64].checked_sub(27).ok_or_else(Error::new)?;

    let sig = recoverable::Signature::from_bytes(&sig_bytes)?;

    let verifying_key = sig.recover_verifying_key_from_digest_bytes(&hash.0.into())?;
    Ok(verifying_key.into())
}
