//! Static helpers (§4.H): scriptnum/LE32/LE64 codecs, bitmask arithmetic,
//! cross-view constraint generation, and folding of hashes/EC checks that
//! are only ever invoked when every input is already statically known.
//!
//! The hash folding functions use `sha2`/`ripemd` directly; the EC shape
//! probe uses `secp256k1`. None of these crates are touched anywhere a
//! value might still be symbolic — callers are expected to have checked
//! `SymValue::is_static()` (or the narrower `as_bytes()`/`as_scriptnum_int()`
//! accessors, which already fail closed on non-static values) first.

use crate::solver::{Expr, Sort};
use crate::value::{SymValue, View};

/// Minimal scriptnum encoding of `v` (sign-magnitude, little-endian, high
/// bit of the last byte is the sign). `0` encodes as the empty byte string.
pub fn encode_scriptnum(v: i128) -> Vec<u8> {
    if v == 0 {
        return Vec::new();
    }
    let neg = v < 0;
    let mut abs = v.unsigned_abs();
    let mut out = Vec::new();
    while abs > 0 {
        out.push((abs & 0xff) as u8);
        abs >>= 8;
    }
    if out.last().map(|b| b & 0x80 != 0).unwrap_or(false) {
        out.push(if neg { 0x80 } else { 0x00 });
    } else if neg {
        *out.last_mut().unwrap() |= 0x80;
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScriptnumError {
    #[error("scriptnum encoding exceeds the {0}-byte limit")]
    TooLong(usize),
    #[error("scriptnum encoding is not minimally encoded")]
    NotMinimal,
}

/// Decode a scriptnum byte string, enforcing the `max_size`-byte limit.
/// Does not enforce minimal encoding; callers that need `minimaldata`
/// enforcement call `check_minimal_encoding` separately so the two failure
/// codes stay distinguishable.
pub fn decode_scriptnum(bytes: &[u8], max_size: usize) -> Result<i128, ScriptnumError> {
    if bytes.len() > max_size {
        return Err(ScriptnumError::TooLong(max_size));
    }
    if bytes.is_empty() {
        return Ok(0);
    }
    let mut result: i128 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        result |= (b as i128) << (8 * i);
    }
    let last = bytes.len() - 1;
    if bytes[last] & 0x80 != 0 {
        result &= !(0x80i128 << (8 * last));
        result = -result;
    }
    Ok(result)
}

/// Whether `bytes` is the unique minimal scriptnum encoding of its value
/// (no redundant trailing zero byte, except when needed purely to hold the
/// sign bit).
pub fn is_minimally_encoded(bytes: &[u8]) -> bool {
    match bytes.last() {
        None => true,
        Some(&last) => {
            if last & 0x7f == 0 && (bytes.len() == 1 || bytes[bytes.len() - 2] & 0x80 == 0) {
                false
            } else {
                true
            }
        }
    }
}

/// Little-endian fixed-width decode (`LE32`/`LE64` families), signed.
pub fn decode_le_signed(bytes: &[u8]) -> Result<i128, ScriptnumError> {
    match bytes.len() {
        4 => {
            let mut a = [0u8; 4];
            a.copy_from_slice(bytes);
            Ok(i32::from_le_bytes(a) as i128)
        }
        8 => {
            let mut a = [0u8; 8];
            a.copy_from_slice(bytes);
            Ok(i64::from_le_bytes(a) as i128)
        }
        n => Err(ScriptnumError::TooLong(n)),
    }
}

pub fn encode_le32_signed(v: i32) -> Vec<u8> {
    v.to_le_bytes().to_vec()
}

pub fn encode_le64_signed(v: i64) -> Vec<u8> {
    v.to_le_bytes().to_vec()
}

/// Decompose a 32-bit bitmask into its contiguous 1-runs, each as
/// `(start_bit, width)`. Used by the Elements 64-bit arithmetic opcodes'
/// bitmask arguments, which must statically decompose into disjoint runs.
pub fn decompose_bitmask_runs(mask: u64) -> Vec<(u32, u32)> {
    let mut runs = Vec::new();
    let mut bit = 0u32;
    while bit < 64 {
        if mask & (1u64 << bit) != 0 {
            let start = bit;
            let mut width = 0u32;
            while bit < 64 && mask & (1u64 << bit) != 0 {
                width += 1;
                bit += 1;
            }
            runs.push((start, width));
        } else {
            bit += 1;
        }
    }
    runs
}

/// Cross-view consistency constraints installed the first time a new view
/// is materialized on a value that already has other views (§4.A). These
/// link the newly requested view's solver variable to the existing ones'
/// so the solver cannot pick mutually-inconsistent valuations across views
/// of the same underlying bytes.
///
/// When `is_static` is true, no linking constraints are needed: the value's
/// concrete representation already determines every view, and accessors
/// (`as_bytes`/`as_scriptnum_int`/`as_le64`) compute them directly.
pub fn cross_view_constraints(value: &SymValue, new_view: View, is_static: bool) -> Vec<Expr> {
    if is_static {
        return Vec::new();
    }
    let mut out = Vec::new();

    for existing in value.views() {
        if existing == new_view {
            continue;
        }
        match (existing, new_view) {
            (View::ByteSeq, View::Length) | (View::Length, View::ByteSeq) => {
                let bytes_var = Expr::var(value.var_name(View::ByteSeq), Sort::Bytes);
                let len_var = Expr::var(value.var_name(View::Length), Sort::Int);
                out.push(Expr::Eq(Box::new(len_var), Box::new(Expr::Length(Box::new(bytes_var)))));
            }
            (View::ByteSeq, View::ScriptNum { .. }) | (View::ScriptNum { .. }, View::ByteSeq) => {
                // The byte <-> scriptnum relationship is enforced through an
                // uninterpreted decode function; exact bit-level sign/
                // magnitude decoding is left unconstrained beyond agreement
                // with `scriptnum_decode(bytes)`, matching how non-static
                // scriptnum values are treated everywhere except the
                // minimal-encoding check (a separate, opcode-site assertion).
                let bytes_var = Expr::var(value.var_name(View::ByteSeq), Sort::Bytes);
                let num_var = Expr::var(value.var_name(View::ScriptNum { max_size: 4 }), Sort::Int);
                out.push(Expr::Eq(
                    Box::new(num_var),
                    Box::new(Expr::UfApply { name: "scriptnum_decode".into(), args: vec![bytes_var], ret: Sort::Int }),
                ));
            }
            (View::ByteSeq, View::Int64) | (View::Int64, View::ByteSeq) => {
                let bytes_var = Expr::var(value.var_name(View::ByteSeq), Sort::Bytes);
                let i64_var = Expr::var(value.var_name(View::Int64), Sort::BitVec64);
                out.push(Expr::Eq(
                    Box::new(i64_var),
                    Box::new(Expr::UfApply { name: "le64_decode".into(), args: vec![bytes_var], ret: Sort::BitVec64 }),
                ));
            }
            _ => {}
        }
    }
    out
}

/// HASH folding for statically-known inputs (§4.F hashing family).
pub fn fold_sha256(data: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut h = Sha256::new();
    h.update(data);
    h.finalize().into()
}

pub fn fold_sha1(data: &[u8]) -> [u8; 20] {
    use sha1::{Digest, Sha1};
    let mut h = Sha1::new();
    h.update(data);
    h.finalize().into()
}

pub fn fold_ripemd160(data: &[u8]) -> [u8; 20] {
    use ripemd::{Digest, Ripemd160};
    let mut h = Ripemd160::new();
    h.update(data);
    h.finalize().into()
}

pub fn fold_hash160(data: &[u8]) -> [u8; 20] {
    fold_ripemd160(&fold_sha256(data))
}

pub fn fold_hash256(data: &[u8]) -> [u8; 32] {
    fold_sha256(&fold_sha256(data))
}

const SHA256_IV: [u32; 8] =
    [0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19];

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Sha256ContextError {
    #[error("SHA-256 context is shorter than the minimum 40 bytes")]
    TooShort,
    #[error("SHA-256 context is longer than the maximum 103 bytes")]
    TooLong,
    #[error("SHA-256 context fields are inconsistent")]
    Invalid,
}

/// The running state of a streaming SHA-256 computation, wire-encoded as
/// 32 bytes of midstate, 8 bytes little-endian bit count, and up to 63
/// bytes of buffered tail (not yet long enough to compress).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sha256Context {
    pub midstate: [u32; 8],
    pub bits: u64,
    pub tail: Vec<u8>,
}

impl Sha256Context {
    pub fn initial(data: &[u8]) -> Self {
        Sha256Context { midstate: SHA256_IV, bits: (data.len() as u64) * 8, tail: data.to_vec() }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(40 + self.tail.len());
        for word in self.midstate {
            out.extend_from_slice(&word.to_be_bytes());
        }
        out.extend_from_slice(&self.bits.to_le_bytes());
        out.extend_from_slice(&self.tail);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Sha256ContextError> {
        if bytes.len() < 40 {
            return Err(Sha256ContextError::TooShort);
        }
        if bytes.len() > 103 {
            return Err(Sha256ContextError::TooLong);
        }
        let mut midstate = [0u32; 8];
        for (i, word) in midstate.iter_mut().enumerate() {
            let mut w = [0u8; 4];
            w.copy_from_slice(&bytes[i * 4..i * 4 + 4]);
            *word = u32::from_be_bytes(w);
        }
        let mut bits_raw = [0u8; 8];
        bits_raw.copy_from_slice(&bytes[32..40]);
        let bits = u64::from_le_bytes(bits_raw);
        let tail = bytes[40..].to_vec();
        if bits & 7 != 0 {
            return Err(Sha256ContextError::Invalid);
        }
        if tail.len() as u64 != (bits / 8) % 64 {
            return Err(Sha256ContextError::Invalid);
        }
        if bits < 64 * 8 && midstate != SHA256_IV {
            return Err(Sha256ContextError::Invalid);
        }
        Ok(Sha256Context { midstate, bits, tail })
    }

    /// Absorb `data`, compressing every full 64-byte block formed by
    /// `tail ++ data` and leaving the remainder buffered.
    pub fn update(&mut self, data: &[u8]) {
        self.tail.extend_from_slice(data);
        self.bits += (data.len() as u64) * 8;
        let mut state = sha2::digest::generic_array::GenericArray::from(self.midstate);
        while self.tail.len() >= 64 {
            let block = sha2::digest::generic_array::GenericArray::clone_from_slice(&self.tail[..64]);
            sha2::compress256(&mut state, std::slice::from_ref(&block));
            self.tail.drain(..64);
        }
        self.midstate = state.into();
    }

    /// Absorb a final chunk of `data` and produce the completed digest,
    /// applying standard SHA-256 padding against the context's running bit
    /// count rather than just the final block's length.
    pub fn finalize(&self, data: &[u8]) -> [u8; 32] {
        let mut ctx = self.clone();
        ctx.update(data);
        let total_bits = ctx.bits;
        let mut buf = ctx.tail.clone();
        buf.push(0x80);
        while buf.len() % 64 != 56 {
            buf.push(0x00);
        }
        buf.extend_from_slice(&total_bits.to_be_bytes());
        let mut state = sha2::digest::generic_array::GenericArray::from(ctx.midstate);
        for block in buf.chunks_exact(64) {
            let block = sha2::digest::generic_array::GenericArray::clone_from_slice(block);
            sha2::compress256(&mut state, std::slice::from_ref(&block));
        }
        let words: [u32; 8] = state.into();
        let mut out = [0u8; 32];
        for (i, w) in words.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&w.to_be_bytes());
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PubkeyShapeError {
    #[error("pubkey has an invalid length")]
    InvalidLength,
    #[error("pubkey is not a valid secp256k1 point encoding")]
    InvalidEncoding,
}

/// Probe that a statically-known byte string decodes as a valid
/// compressed/uncompressed (or, for x-only, Tapscript) secp256k1 public key.
/// This never touches a symbolic value: `CHECKSIG`-family handlers call it
/// only after `SymValue::as_bytes()` has already succeeded.
pub fn probe_pubkey_shape(bytes: &[u8], x_only: bool) -> Result<(), PubkeyShapeError> {
    if x_only {
        if bytes.len() != 32 {
            return Err(PubkeyShapeError::InvalidLength);
        }
        let mut prefixed = vec![0x02u8];
        prefixed.extend_from_slice(bytes);
        secp256k1::PublicKey::from_slice(&prefixed).map_err(|_| PubkeyShapeError::InvalidEncoding)?;
        return Ok(());
    }
    match bytes.len() {
        33 | 65 => {
            secp256k1::PublicKey::from_slice(bytes).map_err(|_| PubkeyShapeError::InvalidEncoding)?;
            Ok(())
        }
        _ => Err(PubkeyShapeError::InvalidLength),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scriptnum_roundtrip_small_values() {
        for v in [-500i128, -1, 0, 1, 127, 128, 32767, 8388607] {
            let enc = encode_scriptnum(v);
            let dec = decode_scriptnum(&enc, 5).unwrap();
            assert_eq!(v, dec, "roundtrip failed for {v}");
        }
    }

    #[test]
    fn zero_encodes_as_empty() {
        assert_eq!(encode_scriptnum(0), Vec::<u8>::new());
        assert_eq!(decode_scriptnum(&[], 4).unwrap(), 0);
    }

    #[test]
    fn negative_zero_decodes_to_zero() {
        assert_eq!(decode_scriptnum(&[0x80], 4).unwrap(), 0);
    }

    #[test]
    fn oversized_scriptnum_is_rejected() {
        let bytes = [1u8, 2, 3, 4, 5];
        assert_eq!(decode_scriptnum(&bytes, 4), Err(ScriptnumError::TooLong(4)));
    }

    #[test]
    fn minimal_encoding_check_flags_redundant_zero() {
        assert!(!is_minimally_encoded(&[0x01, 0x00]));
        assert!(is_minimally_encoded(&[0x01, 0x80]));
        assert!(is_minimally_encoded(&[0xff, 0x00]));
    }

    #[test]
    fn bitmask_runs_decompose_contiguous_bits() {
        assert_eq!(decompose_bitmask_runs(0b0000_1111), vec![(0, 4)]);
        assert_eq!(decompose_bitmask_runs(0b1100_0011), vec![(0, 2), (6, 2)]);
        assert_eq!(decompose_bitmask_runs(0), Vec::new());
    }

    #[test]
    fn hash160_is_ripemd_of_sha256() {
        let data = b"scriptsym";
        let expect = fold_ripemd160(&fold_sha256(data));
        assert_eq!(fold_hash160(data), expect);
    }

    #[test]
    fn le64_roundtrip() {
        for v in [-1i64, 0, 1, i64::MAX, i64::MIN] {
            let enc = encode_le64_signed(v);
            let dec = decode_le_signed(&enc).unwrap();
            assert_eq!(v as i128, dec);
        }
    }

    #[test]
    fn sha256_context_finalize_matches_plain_sha256() {
        let ctx = Sha256Context::initial(b"hello ");
        let digest = ctx.finalize(b"world");
        assert_eq!(digest, fold_sha256(b"hello world"));
    }

    #[test]
    fn sha256_context_encode_decode_roundtrips() {
        let mut ctx = Sha256Context::initial(b"abc");
        ctx.update(&vec![0u8; 61]);
        let encoded = ctx.encode();
        assert!(encoded.len() >= 40 && encoded.len() <= 103);
        let decoded = Sha256Context::decode(&encoded).unwrap();
        assert_eq!(ctx, decoded);
    }

    #[test]
    fn sha256_context_rejects_undersized_buffer() {
        assert_eq!(Sha256Context::decode(&[0u8; 39]), Err(Sha256ContextError::TooShort));
    }
}
