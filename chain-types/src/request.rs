use committable::{Commitment, Committable, RawCommitmentBuilder};
use serde::{Deserialize, Serialize};

use crate::codec::commitment_to_hash256;
use crate::ids::{Address, Amount, Epoch, Hash256};

/// Fields common to every governance request (spec §6).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeader {
    pub origin: Address,
    pub previous: Hash256,
    pub sequence: u64,
    pub fee: Amount,
    pub epoch_num: Epoch,
    /// Must cite the account's current `governance_subchain_head` (spec
    /// §4.G) — this chains all governance-touching requests per account
    /// and prevents replay and intra-epoch duplicates.
    pub governance_subchain_prev: Hash256,
}

/// A single candidate's allocation within an `ElectionVote` request.
/// `sub_vote` is this candidate's share of the voter's `TOTAL_VOTE_UNITS`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteAllocation {
    pub candidate: Address,
    pub sub_vote: u8,
}

/// Type-specific fields for each governance request type (spec §4.G / §6).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestBody {
    StartRepresenting { stake: Amount },
    StopRepresenting,
    AnnounceCandidacy {
        stake: Amount,
        bls_key: Hash256,
        ecies_key: Hash256,
    },
    RenounceCandidacy,
    ElectionVote { votes: Vec<VoteAllocation> },
    Proxy { lock_proxy: Amount, rep: Address },
    Stake { amount: Amount },
    Unstake,
}

impl RequestBody {
    pub fn kind_name(&self) -> &'static str {
        match self {
            RequestBody::StartRepresenting { .. } => "StartRepresenting",
            RequestBody::StopRepresenting => "StopRepresenting",
            RequestBody::AnnounceCandidacy { .. } => "AnnounceCandidacy",
            RequestBody::RenounceCandidacy => "RenounceCandidacy",
            RequestBody::ElectionVote { .. } => "ElectionVote",
            RequestBody::Proxy { .. } => "Proxy",
            RequestBody::Stake { .. } => "Stake",
            RequestBody::Unstake => "Unstake",
        }
    }
}

/// A full governance request, as it arrives from the (excluded) consensus
/// pipeline: `{type, origin, previous, sequence, fee, epoch_num,
/// governance_subchain_prev, signature}` plus type-specific fields (spec
/// §6). `type` is folded into `body`'s variant tag; signature verification
/// itself is out of scope (spec §1) — `signature` is carried only so the
/// hash computation below can show it is deliberately excluded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub header: RequestHeader,
    pub body: RequestBody,
    pub signature: Vec<u8>,
}

impl Committable for Request {
    /// Commits over the serialized header and body, excluding `signature`
    /// (spec §6: "Hashes are computed over the serialized body excluding the
    /// signature").
    fn commit(&self) -> Commitment<Self> {
        RawCommitmentBuilder::new("Request")
            .var_size_bytes(&bincode::serialize(&self.header).expect("RequestHeader is always encodable"))
            .var_size_bytes(&bincode::serialize(&self.body).expect("RequestBody is always encodable"))
            .finalize()
    }

    fn tag() -> String {
        "GOVERNANCE_REQUEST".into()
    }
}

impl Request {
    /// Hash over the serialized body, excluding `signature` (spec §6).
    pub fn hash(&self) -> Hash256 {
        commitment_to_hash256(self.commit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_ignores_signature() {
        let header = RequestHeader {
            origin: Address([1; 32]),
            previous: Hash256::ZERO,
            sequence: 1,
            fee: Amount(1),
            epoch_num: Epoch(1),
            governance_subchain_prev: Hash256::ZERO,
        };
        let a = Request {
            header: header.clone(),
            body: RequestBody::Unstake,
            signature: vec![1, 2, 3],
        };
        let b = Request {
            header,
            body: RequestBody::Unstake,
            signature: vec![9, 9, 9, 9],
        };
        assert_eq!(a.hash(), b.hash());
    }
}
