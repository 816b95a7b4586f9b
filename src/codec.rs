//! Canonical, length-prefixed, deterministic encoding for DKG bundles and signature shares.
//! Field order is fixed: `(e, i, enshare, commit, proof)` for a bundle, `(e, i, gsigshare)` for a
//! share.
//!
//! Point encoding piggybacks on curv-kzen's own compressed representation
//! (`ECPoint::pk_to_key_slice` / `ECPoint::from_bytes`, the same pair the CLI demo used to move
//! points across the wire) rather than re-deriving compression ourselves; everything else
//! (counts, lengths, integers) is framed by hand so truncation and trailing-byte errors are
//! distinguishable, which a bare `parity_scale_codec` derive on foreign point types cannot give us.

use crate::types::{DkgBundle, DleqProof, EpochId, PointG1, PointG2, ProposerId, SigShare};
use curv::arithmetic::traits::Converter;
use curv::elliptic::curves::traits::ECPoint;
use curv::BigInt;
use thiserror::Error;

/// Decode failures, kept distinguishable so callers can tell truncation from corruption.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("buffer truncated: expected {expected} more byte(s), found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("{0} trailing byte(s) left after decoding a complete payload")]
    TrailingBytes(usize),
    #[error("declared length {length} is not plausible for the remaining {remaining} byte(s)")]
    InvalidLength { length: u32, remaining: usize },
    #[error("malformed curve point encoding")]
    MalformedPoint,
}

type DecodeResult<'a, T> = Result<(T, &'a [u8]), CodecError>;

fn take<'a>(buf: &'a [u8], n: usize) -> Result<(&'a [u8], &'a [u8]), CodecError> {
    if buf.len() < n {
        Err(CodecError::Truncated {
            expected: n - buf.len(),
            found: buf.len(),
        })
    } else {
        Ok(buf.split_at(n))
    }
}

fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn read_u32(buf: &[u8]) -> DecodeResult<'_, u32> {
    let (head, tail) = take(buf, 4)?;
    let mut arr = [0u8; 4];
    arr.copy_from_slice(head);
    Ok((u32::from_be_bytes(arr), tail))
}

fn write_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn read_u64(buf: &[u8]) -> DecodeResult<'_, u64> {
    let (head, tail) = take(buf, 8)?;
    let mut arr = [0u8; 8];
    arr.copy_from_slice(head);
    Ok((u64::from_be_bytes(arr), tail))
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_u32(out, bytes.len() as u32);
    out.extend_from_slice(bytes);
}

fn read_bytes(buf: &[u8]) -> DecodeResult<'_, Vec<u8>> {
    let (len, tail) = read_u32(buf)?;
    if len as usize > tail.len() {
        return Err(CodecError::InvalidLength {
            length: len,
            remaining: tail.len(),
        });
    }
    let (head, tail) = take(tail, len as usize)?;
    Ok((head.to_vec(), tail))
}

fn write_point_g1(out: &mut Vec<u8>, p: &PointG1) {
    write_bytes(out, &p.pk_to_key_slice());
}

fn read_point_g1(buf: &[u8]) -> DecodeResult<'_, PointG1> {
    let (bytes, tail) = read_bytes(buf)?;
    let point = PointG1::from_bytes(&bytes).map_err(|_| CodecError::MalformedPoint)?;
    Ok((point, tail))
}

fn write_point_g2(out: &mut Vec<u8>, p: &PointG2) {
    write_bytes(out, &p.pk_to_key_slice());
}

fn read_point_g2(buf: &[u8]) -> DecodeResult<'_, PointG2> {
    let (bytes, tail) = read_bytes(buf)?;
    let point = PointG2::from_bytes(&bytes).map_err(|_| CodecError::MalformedPoint)?;
    Ok((point, tail))
}

fn write_scalar(out: &mut Vec<u8>, s: &BigInt) {
    write_bytes(out, &s.to_bytes());
}

fn read_scalar(buf: &[u8]) -> DecodeResult<'_, BigInt> {
    let (bytes, tail) = read_bytes(buf)?;
    Ok((BigInt::from_bytes(&bytes), tail))
}

fn write_dleq_proof(out: &mut Vec<u8>, proof: &DleqProof) {
    write_point_g1(out, &proof.a1);
    write_point_g2(out, &proof.a2);
    write_scalar(out, &proof.z);
}

fn read_dleq_proof(buf: &[u8]) -> DecodeResult<'_, DleqProof> {
    let (a1, buf) = read_point_g1(buf)?;
    let (a2, buf) = read_point_g2(buf)?;
    let (z, buf) = read_scalar(buf)?;
    Ok((DleqProof { a1, a2, z }, buf))
}

fn write_vec<T>(out: &mut Vec<u8>, items: &[T], write_one: impl Fn(&mut Vec<u8>, &T)) {
    write_u32(out, items.len() as u32);
    for item in items {
        write_one(out, item);
    }
}

fn read_vec<'a, T>(
    buf: &'a [u8],
    read_one: impl Fn(&'a [u8]) -> DecodeResult<'a, T>,
) -> DecodeResult<'a, Vec<T>> {
    let (count, mut buf) = read_u32(buf)?;
    if count as usize > buf.len() {
        return Err(CodecError::InvalidLength {
            length: count,
            remaining: buf.len(),
        });
    }
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (item, rest) = read_one(buf)?;
        items.push(item);
        buf = rest;
    }
    Ok((items, buf))
}

/// Encodes a DKG bundle as `(e, i, enshare, commit, proof)`.
pub fn encode_dkg_bundle(bundle: &DkgBundle) -> Vec<u8> {
    let mut out = Vec::new();
    write_u64(&mut out, bundle.epoch.0);
    write_u32(&mut out, bundle.proposer.0);
    write_vec(&mut out, &bundle.enshare, write_point_g1);
    write_vec(&mut out, &bundle.commit, write_point_g2);
    write_vec(&mut out, &bundle.proof, write_dleq_proof);
    out
}

pub fn decode_dkg_bundle(buf: &[u8]) -> Result<DkgBundle, CodecError> {
    let (epoch, buf) = read_u64(buf)?;
    let (proposer, buf) = read_u32(buf)?;
    let (enshare, buf) = read_vec(buf, read_point_g1)?;
    let (commit, buf) = read_vec(buf, read_point_g2)?;
    let (proof, buf) = read_vec(buf, read_dleq_proof)?;
    if !buf.is_empty() {
        return Err(CodecError::TrailingBytes(buf.len()));
    }
    Ok(DkgBundle {
        epoch: EpochId(epoch),
        proposer: ProposerId(proposer),
        enshare,
        commit,
        proof,
    })
}

/// Encodes a signature share as `(e, i, gsigshare)`.
pub fn encode_sig_share(share: &SigShare) -> Vec<u8> {
    let mut out = Vec::new();
    write_u64(&mut out, share.epoch.0);
    write_u32(&mut out, share.proposer.0);
    write_point_g1(&mut out, &share.gsigshare);
    out
}

pub fn decode_sig_share(buf: &[u8]) -> Result<SigShare, CodecError> {
    let (epoch, buf) = read_u64(buf)?;
    let (proposer, buf) = read_u32(buf)?;
    let (gsigshare, buf) = read_point_g1(buf)?;
    if !buf.is_empty() {
        return Err(CodecError::TrailingBytes(buf.len()));
    }
    Ok(SigShare {
        epoch: EpochId(epoch),
        proposer: ProposerId(proposer),
        gsigshare,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use curv::elliptic::curves::traits::ECScalar;
    use crate::types::{ScalarG1, ScalarG2};

    fn sample_bundle(n: usize) -> DkgBundle {
        let enshare: Vec<PointG1> = (0..n)
            .map(|_| PointG1::generator() * &ScalarG1::new_random())
            .collect();
        let commit: Vec<PointG2> = (0..n)
            .map(|_| PointG2::generator() * &ScalarG2::new_random())
            .collect();
        let proof: Vec<DleqProof> = (0..n)
            .map(|_| DleqProof {
                a1: PointG1::generator() * &ScalarG1::new_random(),
                a2: PointG2::generator() * &ScalarG2::new_random(),
                z: ScalarG1::new_random().to_big_int(),
            })
            .collect();
        DkgBundle {
            epoch: EpochId(7),
            proposer: ProposerId(2),
            enshare,
            commit,
            proof,
        }
    }

    #[test]
    fn round_trips_a_bundle_with_several_proposers() {
        let bundle = sample_bundle(5);
        let bytes = encode_dkg_bundle(&bundle);
        let decoded = decode_dkg_bundle(&bytes).unwrap();
        assert_eq!(bundle, decoded);
    }

    #[test]
    fn round_trips_an_empty_bundle() {
        let bundle = sample_bundle(0);
        let bytes = encode_dkg_bundle(&bundle);
        let decoded = decode_dkg_bundle(&bytes).unwrap();
        assert_eq!(bundle, decoded);
    }

    #[test]
    fn round_trips_a_single_proposer_bundle() {
        let bundle = sample_bundle(1);
        let bytes = encode_dkg_bundle(&bundle);
        let decoded = decode_dkg_bundle(&bytes).unwrap();
        assert_eq!(bundle, decoded);
    }

    #[test]
    fn round_trips_a_sig_share() {
        let share = SigShare {
            epoch: EpochId(3),
            proposer: ProposerId(1),
            gsigshare: PointG1::generator() * &ScalarG1::new_random(),
        };
        let bytes = encode_sig_share(&share);
        let decoded = decode_sig_share(&bytes).unwrap();
        assert_eq!(share, decoded);
    }

    #[test]
    fn rejects_truncated_input() {
        let bundle = sample_bundle(2);
        let mut bytes = encode_dkg_bundle(&bundle);
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            decode_dkg_bundle(&bytes),
            Err(CodecError::Truncated { .. }) | Err(CodecError::InvalidLength { .. })
        ));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let bundle = sample_bundle(1);
        let mut bytes = encode_dkg_bundle(&bundle);
        bytes.push(0xFF);
        assert_eq!(
            decode_dkg_bundle(&bytes),
            Err(CodecError::TrailingBytes(1))
        );
    }

    #[test]
    fn rejects_implausible_declared_length() {
        let mut bytes = Vec::new();
        write_u64(&mut bytes, 0);
        write_u32(&mut bytes, 0);
        write_u32(&mut bytes, u32::MAX); // enshare count, far exceeding remaining bytes
        assert!(matches!(
            decode_dkg_bundle(&bytes),
            Err(CodecError::InvalidLength { .. })
        ));
    }
}
