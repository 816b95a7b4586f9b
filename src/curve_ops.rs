//! Pairing-friendly curve primitives: DLEQ proof generation/verification, the Reed-Solomon
//! commitment dual-check, and the bilinear-pairing equality test.
//!
//! DLEQ is a direct port of `threshold_bls::utilities::ECDDHProof`, generalized from its
//! `{g1,h1,g2,h2}` naming to `{a,h,u,v}` and re-anchored on Keccak256 rather than `HSha256`, since
//! the beacon's Fiat-Shamir transcripts must match the EVM-style chain it settles on. The pairing
//! check is a direct port of `basic_bls::BLSSignature::verify`.

use crate::types::{DleqProof, PointG1, PointG2, ScalarG1, ScalarG2};
use curv::arithmetic::traits::{Converter, Modulo};
use curv::elliptic::curves::bls12_381::Pair;
use curv::elliptic::curves::traits::{ECPoint, ECScalar};
use curv::BigInt;
use ff_zeroize::Field;
use pairing_plus::bls12_381::Fq12;
use sha3::{Digest, Keccak256};
use zeroize::Zeroize;

/// The canonical G2 generator, used as the fixed base `H` throughout the beacon.
pub fn fixed_h() -> PointG2 {
    PointG2::generator()
}

/// The canonical G1 generator `G`.
pub fn fixed_g() -> PointG1 {
    PointG1::generator()
}

fn keccak_challenge(parts: &[&[u8]]) -> BigInt {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    BigInt::from_bytes(hasher.finalize().as_slice())
}

fn g1_transcript_bytes(p: &PointG1) -> Vec<u8> {
    p.bytes_compressed_to_big_int().to_bytes()
}

fn g2_transcript_bytes(p: &PointG2) -> Vec<u8> {
    p.bytes_compressed_to_big_int().to_bytes()
}

/// Proves `log_a(u) = log_h(v) = x`, witness `x` known to the prover.
///
/// `a` and `u` live in G1; `h` and `v` live in G2 (true for BLS12-381, since `|G1| = |G2|`, exactly
/// the special case `ECDDHProof` documents).
pub fn prove_dleq(x: &BigInt, a: &PointG1, h: &PointG2, u: &PointG1, v: &PointG2) -> DleqProof {
    let mut s1: ScalarG1 = ECScalar::new_random();
    let a1 = a * &s1;
    let s = s1.to_big_int();
    let mut s2: ScalarG2 = ECScalar::from(&s);
    let a2 = h * &s2;

    let e = keccak_challenge(&[
        &g1_transcript_bytes(a),
        &g1_transcript_bytes(u),
        &g2_transcript_bytes(h),
        &g2_transcript_bytes(v),
        &g1_transcript_bytes(&a1),
        &g2_transcript_bytes(&a2),
    ]);
    let z = s + e * x;

    s1.zeroize();
    s2.zeroize();
    DleqProof { a1, a2, z }
}

/// Verifies a DLEQ proof that `log_a(u) = log_h(v)`.
pub fn verify_dleq(proof: &DleqProof, a: &PointG1, h: &PointG2, u: &PointG1, v: &PointG2) -> bool {
    let e = keccak_challenge(&[
        &g1_transcript_bytes(a),
        &g1_transcript_bytes(u),
        &g2_transcript_bytes(h),
        &g2_transcript_bytes(v),
        &g1_transcript_bytes(&proof.a1),
        &g2_transcript_bytes(&proof.a2),
    ]);

    let z1: ScalarG1 = ECScalar::from(&proof.z);
    let z2: ScalarG2 = ECScalar::from(&proof.z);
    let lhs1 = a * &z1;
    let lhs2 = h * &z2;

    let e1: ScalarG1 = ECScalar::from(&e);
    let e2: ScalarG2 = ECScalar::from(&e);
    let rhs1 = &proof.a1 + &(u * &e1);
    let rhs2 = &proof.a2 + &(v * &e2);

    lhs1 == rhs1 && lhs2 == rhs2
}

/// Maps a proposer's public key and index to the Reed-Solomon evaluation point `x_j`: `x_j = Keccak256(PK_j ‖ be32(j)) mod q`.
pub fn evaluation_point(pk: &PointG1, j: u32) -> BigInt {
    let x = keccak_challenge(&[&g1_transcript_bytes(pk), &j.to_be_bytes()]);
    BigInt::mod_add(&x, &BigInt::zero(), &ScalarG2::q())
}

/// Checks that `commitments[0..n)`, evaluated at `xs[0..n)`, lie on a single polynomial of degree
/// `≤ degree` over G2.
///
/// Implemented as a Fiat-Shamir random-linear-combination dual-code check rather than primal
/// interpolation (per the Open Question resolution in `DESIGN.md`): a vector of evaluations lies on
/// a degree-`≤d` polynomial iff it is orthogonal to every vector in the dual code, which for
/// evaluation points `x_0..x_{n-1}` is spanned by `lambda_j = b_j · x_j^i` for `i` in
/// `0..(n-d-1)`, where `b_j` is `j`'s barycentric weight `1 / prod_{m≠j}(x_j - x_m)`. A single
/// random combination of that basis (via a geometric sum in a Fiat-Shamir challenge `α`) catches
/// any off-code vector with probability `1 - d/q`.
pub fn verify_reed_solomon(commitments: &[PointG2], xs: &[BigInt], degree: usize) -> bool {
    let n = commitments.len();
    if xs.len() != n {
        return false;
    }
    if n == 0 {
        return true;
    }
    if degree + 1 >= n {
        // The code is the whole ambient space; every vector is trivially on-code.
        return true;
    }
    let q = ScalarG2::q();
    let redundancy = n - degree - 1;

    let mut transcript: Vec<Vec<u8>> = Vec::with_capacity(2 * n);
    for c in commitments {
        transcript.push(g2_transcript_bytes(c));
    }
    for x in xs {
        transcript.push(x.to_bytes());
    }
    let refs: Vec<&[u8]> = transcript.iter().map(|v| v.as_slice()).collect();
    let alpha = BigInt::mod_add(&keccak_challenge(&refs), &BigInt::zero(), &q);

    let identity = PointG2::generator() * &ScalarG2::zero();
    let mut acc = identity.clone();
    for j in 0..n {
        let mut denom = BigInt::one();
        for m in 0..n {
            if m == j {
                continue;
            }
            let diff = BigInt::mod_sub(&xs[j], &xs[m], &q);
            if diff == BigInt::zero() {
                // Duplicate evaluation points can never come from distinct proposer keys; reject.
                return false;
            }
            denom = BigInt::mod_mul(&denom, &diff, &q);
        }
        let denom_inv = BigInt::mod_inv(&denom, &q);

        let base = BigInt::mod_mul(&alpha, &xs[j], &q);
        let mut geo_sum = BigInt::zero();
        let mut pow = BigInt::one();
        for _ in 0..redundancy {
            geo_sum = BigInt::mod_add(&geo_sum, &pow, &q);
            pow = BigInt::mod_mul(&pow, &base, &q);
        }
        let lambda_j = BigInt::mod_mul(&denom_inv, &geo_sum, &q);
        let scalar: ScalarG2 = ECScalar::from(&lambda_j);
        acc = acc + &commitments[j] * &scalar;
    }

    acc == identity
}

/// Checks `e(g1_a, g2_a) == e(g1_b, g2_b)` by comparing canonical `GT` encodings, ported from
/// `basic_bls::BLSSignature::verify`.
pub fn pairing_equal(g1_a: &PointG1, g2_a: &PointG2, g1_b: &PointG1, g2_b: &PointG2) -> bool {
    let product = Pair::efficient_pairing_mul(g1_a, g2_a, g1_b, &(-g2_b.clone()));
    product.e == Fq12::one()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dleq_proof_round_trips() {
        let x = ScalarG1::new_random().to_big_int();
        let a = fixed_g();
        let h = fixed_h();
        let u = &a * &ECScalar::from(&x);
        let v = &h * &ECScalar::from(&x);

        let proof = prove_dleq(&x, &a, &h, &u, &v);
        assert!(verify_dleq(&proof, &a, &h, &u, &v));
    }

    #[test]
    fn dleq_proof_rejects_mismatched_witness() {
        let x = ScalarG1::new_random().to_big_int();
        let y = ScalarG1::new_random().to_big_int();
        let a = fixed_g();
        let h = fixed_h();
        let u = &a * &ECScalar::from(&x);
        let v = &h * &ECScalar::from(&y);

        let proof = prove_dleq(&x, &a, &h, &u, &v);
        assert!(!verify_dleq(&proof, &a, &h, &u, &v));
    }

    fn commit_for_poly(coeffs: &[BigInt], x: &BigInt, q: &BigInt) -> PointG2 {
        let mut acc = BigInt::zero();
        let mut pow = BigInt::one();
        for c in coeffs {
            acc = BigInt::mod_add(&acc, &BigInt::mod_mul(c, &pow, q), q);
            pow = BigInt::mod_mul(&pow, x, q);
        }
        let scalar: ScalarG2 = ECScalar::from(&acc);
        PointG2::generator() * &scalar
    }

    #[test]
    fn reed_solomon_accepts_a_degree_valid_vector() {
        let q = ScalarG2::q();
        let coeffs: Vec<BigInt> = (0..3).map(|_| ScalarG2::new_random().to_big_int()).collect(); // degree 2
        let xs: Vec<BigInt> = (1..=6u32).map(BigInt::from).collect();
        let commitments: Vec<PointG2> = xs.iter().map(|x| commit_for_poly(&coeffs, x, &q)).collect();
        assert!(verify_reed_solomon(&commitments, &xs, 2));
    }

    #[test]
    fn reed_solomon_rejects_a_tampered_vector() {
        let q = ScalarG2::q();
        let coeffs: Vec<BigInt> = (0..3).map(|_| ScalarG2::new_random().to_big_int()).collect();
        let xs: Vec<BigInt> = (1..=6u32).map(BigInt::from).collect();
        let mut commitments: Vec<PointG2> =
            xs.iter().map(|x| commit_for_poly(&coeffs, x, &q)).collect();
        commitments[1] = PointG2::generator() * &ScalarG2::new_random();
        assert!(!verify_reed_solomon(&commitments, &xs, 2));
    }

    #[test]
    fn pairing_equal_matches_a_genuine_bls_signature() {
        // sigma = sk * H(m), pk = sk * H2_generator; checks e(sigma, H2) == e(H(m), pk).
        let sk: ScalarG2 = ECScalar::new_random();
        let pk = fixed_h() * &sk;
        let sk1: ScalarG1 = ECScalar::from(&sk.to_big_int());
        let msg_point = PointG1::hash_to_curve(b"epoch-digest");
        let sigma = &msg_point * &sk1;

        assert!(pairing_equal(&sigma, &fixed_h(), &msg_point, &pk));
    }

    #[test]
    fn pairing_equal_rejects_a_scaled_signature() {
        let sk: ScalarG2 = ECScalar::new_random();
        let pk = fixed_h() * &sk;
        let sk1: ScalarG1 = ECScalar::from(&sk.to_big_int());
        let msg_point = PointG1::hash_to_curve(b"epoch-digest");
        let sigma = &msg_point * &sk1;

        let two: ScalarG1 = ECScalar::from(&BigInt::from(2));
        let tampered = &sigma * &two;
        assert!(!pairing_equal(&tampered, &fixed_h(), &msg_point, &pk));
    }
}
