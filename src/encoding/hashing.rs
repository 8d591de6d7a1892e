use super::{to_writer, Error, Writer};
use crate::types::Hash;

use serde::Serialize;
use sha3::{Digest, Keccak256};

/// Feeds encoded words straight into the hasher, so hashing never
/// materializes the encoding.
struct HashingWriter(Keccak256);

impl Writer for HashingWriter {
    fn write(&mut self, slot: &[u8]) {
        self.0.update(slot);
    }
}

/// Keccak-256 of the canonical encoding of `value`.
///
/// Channel ids, states and withdrawal authorizations are identified by this
/// hash, so every participant has to arrive at the same bytes.
pub fn to_hash<T>(value: &T) -> Result<Hash, Error>
where
    T: Serialize,
{
    let mut writer = HashingWriter(Keccak256::new());
    to_writer(value, &mut writer)?;
    Ok(Hash(writer.0.finalize().into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encoding::to_vec, types::U256};

    #[test]
    fn hash_matches_hash_of_encoding() {
        let value = (U256::from(7u64), true, 3u8);
        let bytes = to_vec(&value).unwrap();
        assert_eq!(bytes.len(), 3 * 32);
        assert_eq!(
            to_hash(&value).unwrap(),
            Hash(Keccak256::digest(&bytes).into())
        );
    }
}
