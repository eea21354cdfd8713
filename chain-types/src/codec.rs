use committable::Commitment;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::ids::Hash256;

/// The wire encoding every persisted record and request uses. Grounded in
/// the teacher's use of `bincode` for compact binary encodings alongside
/// `serde`-derived types.
pub trait StoreCodec: Serialize + DeserializeOwned {
    fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).expect("in-memory types are always encodable")
    }

    fn decode(bytes: &[u8]) -> bincode::Result<Self> {
        bincode::deserialize(bytes)
    }
}

impl<T: Serialize + DeserializeOwned> StoreCodec for T {}

/// Narrows a `committable::Commitment<T>` down to the `Hash256` every table
/// in this crate keys and references by, the way the teacher narrows a
/// `Commitment<Leaf2<TYPES>>` to raw bytes before signing
/// (`proposed_leaf.commit().as_ref()`).
pub fn commitment_to_hash256<T>(commitment: Commitment<T>) -> Hash256 {
    let bytes = commitment.as_ref();
    let mut out = [0u8; 32];
    out.copy_from_slice(bytes);
    Hash256(out)
}
