//! Low-level binary helpers the wire protocol needs: inflating gzipped
//! payloads, building and ordering decimal `long`s, and block padding.
//!
//! Longs travel through the rest of the client as decimal strings, so every
//! conversion here goes through arbitrary-precision integers and never
//! compares two longs as text.

use std::io::Read;

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::ToPrimitive;

use crate::errors::DecodeError;

// ─── Compression ──────────────────────────────────────────────────────────────

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Inflate a gzip (or bare zlib) payload such as `gzip_packed` contents.
///
/// The framing is chosen by the gzip magic; anything else is read as zlib.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::new();
    if data.starts_with(&GZIP_MAGIC) {
        flate2::read::GzDecoder::new(data).read_to_end(&mut out)?;
    } else {
        flate2::read::ZlibDecoder::new(data).read_to_end(&mut out)?;
    }
    Ok(out)
}

/// Like [`decompress`] but decodes the result as UTF-8 text.
pub fn decompress_to_string(data: &[u8]) -> Result<String, DecodeError> {
    Ok(String::from_utf8(decompress(data)?)?)
}

// ─── Longs ────────────────────────────────────────────────────────────────────

/// Build `high * 2^32 + low` and render it in base 10.
pub fn long_from_parts(high: u32, low: u32) -> String {
    ((BigUint::from(high) << 32u32) + BigUint::from(low)).to_str_radix(10)
}

fn parse_long(s: &str) -> Result<BigInt, DecodeError> {
    BigInt::parse_bytes(s.trim().as_bytes(), 10).ok_or_else(|| DecodeError::InvalidLong(s.to_owned()))
}

/// Split a decimal long back into `(high, low)` words.
///
/// Negative values are read as signed 64-bit and reinterpreted as unsigned.
pub fn long_to_parts(s: &str) -> Result<(u32, u32), DecodeError> {
    let n = parse_long(s)?;
    let bits = match n.sign() {
        Sign::Minus => n.to_i64().map(|v| v as u64),
        _ => n.to_u64(),
    }
    .ok_or_else(|| DecodeError::InvalidLong(s.to_owned()))?;
    Ok(((bits >> 32) as u32, bits as u32))
}

/// Serialize a decimal long as 8 little-endian bytes.
pub fn long_to_bytes(s: &str) -> Result<[u8; 8], DecodeError> {
    let (high, low) = long_to_parts(s)?;
    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&low.to_le_bytes());
    out[4..].copy_from_slice(&high.to_le_bytes());
    Ok(out)
}

/// Sort decimal longs by numeric value.
pub fn sort_longs_numerically<S: AsRef<str>>(longs: &[S]) -> Result<Vec<String>, DecodeError> {
    let mut parsed = longs
        .iter()
        .map(|s| parse_long(s.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    parsed.sort();
    Ok(parsed.into_iter().map(|n| n.to_str_radix(10)).collect())
}

// ─── Padding ──────────────────────────────────────────────────────────────────

/// How [`pad_to_block`] fills a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PadOptions {
    /// Block size to align to; `0` disables padding.
    pub block_size: usize,
    /// Pad with zero bytes instead of random filler.
    pub zeroes: bool,
    /// Add a whole block even when the input is already aligned.
    pub full: bool,
    /// Put the padding in front of the data.
    pub prepend: bool,
}

impl Default for PadOptions {
    fn default() -> Self {
        Self { block_size: 16, zeroes: false, full: false, prepend: false }
    }
}

impl PadOptions {
    /// Default options with a different block size.
    pub fn block(block_size: usize) -> Self {
        Self { block_size, ..Self::default() }
    }
}

/// Pad `bytes` up to a multiple of `opts.block_size`.
///
/// Random filler is never secret material; if the OS source fails the
/// filler silently degrades to zeroes.
pub fn pad_to_block(bytes: &[u8], opts: PadOptions) -> Vec<u8> {
    if opts.block_size == 0 {
        return bytes.to_vec();
    }
    let need = opts.block_size - (bytes.len() % opts.block_size);
    if need == opts.block_size && !opts.full {
        return bytes.to_vec();
    }

    let mut padding = vec![0u8; need];
    if !opts.zeroes && getrandom::getrandom(&mut padding).is_err() {
        tracing::warn!("[binary] OS randomness unavailable, padding with zeroes");
        padding.fill(0);
    }

    let mut out = Vec::with_capacity(bytes.len() + need);
    if opts.prepend {
        out.extend_from_slice(&padding);
        out.extend_from_slice(bytes);
    } else {
        out.extend_from_slice(bytes);
        out.extend_from_slice(&padding);
    }
    out
}
