//! Wire and domain types shared by every module.
//!
//! Group elements follow `threshold_bls::party_i`'s convention of aliasing the BLS12-381 group
//! element/scalar types rather than hiding them behind a newtype, since this crate is committed
//! to a single concrete curve rather than a generic one.

use curv::elliptic::curves::bls12_381::g1::{FE as FE1, GE as GE1};
use curv::elliptic::curves::bls12_381::g2::{FE as FE2, GE as GE2};
use serde::{Deserialize, Serialize};

/// A point in G1 (used for proposer identity keys, encrypted DKG shares, and BLS signature shares).
pub type PointG1 = GE1;
/// A scalar over G1's field (equivalently G2's, since BLS12-381 has a single scalar field).
pub type ScalarG1 = FE1;
/// A point in G2 (used for DKG commitments and the fixed generator `H`).
pub type PointG2 = GE2;
pub type ScalarG2 = FE2;

/// Epoch index. `e = 0` is genesis.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct EpochId(pub u64);

/// Index of a proposer within an epoch's proposer group, `i < n_e`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct ProposerId(pub u32);

impl EpochId {
    pub fn next(self) -> EpochId {
        EpochId(self.0 + 1)
    }
}

/// 20-byte account/contract address, matching the chain's address width.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Address(pub [u8; 20]);

/// Non-interactive DLEQ proof that `log_A(U) = log_H(V)` across the G1/G2 bases.
///
/// Ported from `threshold_bls::utilities::ECDDHProof`, which is the special case of this proof
/// where the two bases live in groups of equal order (true for BLS12-381's G1 and G2).
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct DleqProof {
    pub a1: PointG1,
    pub a2: PointG2,
    pub z: curv::BigInt,
}

/// A DKG bundle submitted by proposer `i` for epoch `e`.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct DkgBundle {
    pub epoch: EpochId,
    pub proposer: ProposerId,
    pub enshare: Vec<PointG1>,
    pub commit: Vec<PointG2>,
    pub proof: Vec<DleqProof>,
}

/// A single BLS signature share on `M(e)` submitted by proposer `i`.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SigShare {
    pub epoch: EpochId,
    pub proposer: ProposerId,
    pub gsigshare: PointG1,
}

/// The committed randomness for an epoch.
#[derive(Clone, PartialEq, Debug)]
pub struct RandomnessRecord {
    pub epoch: EpochId,
    pub r: curv::BigInt,
}
