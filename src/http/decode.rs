//! Response `Content-Encoding` decoding.
//!
//! Each backend advertises the codings it can undo via `Accept-Encoding`;
//! the modern engine adds Brotli on top of the baseline gzip/deflate.

use crate::base::neterror::NetError;
use bytes::Bytes;
use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use std::io::Read;

/// Buffer size handed to the Brotli decompressor.
const BROTLI_BUFFER: usize = 4096;

/// Response codings a backend is able to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeSupport {
    pub gzip: bool,
    pub deflate: bool,
    pub brotli: bool,
}

impl DecodeSupport {
    /// What a baseline URL connection handles.
    pub const BASELINE: DecodeSupport = DecodeSupport {
        gzip: true,
        deflate: false,
        brotli: false,
    };

    /// Baseline plus the engine's extra codecs.
    pub const FULL: DecodeSupport = DecodeSupport {
        gzip: true,
        deflate: true,
        brotli: true,
    };

    /// Value for the `Accept-Encoding` request header.
    pub fn accept_encoding(&self) -> &'static str {
        match (self.gzip, self.deflate, self.brotli) {
            (true, true, true) => "gzip, deflate, br",
            (true, true, false) => "gzip, deflate",
            (true, false, true) => "gzip, br",
            (true, false, false) => "gzip",
            (false, true, true) => "deflate, br",
            (false, true, false) => "deflate",
            (false, false, true) => "br",
            (false, false, false) => "identity",
        }
    }

    pub fn supports(&self, coding: &str) -> bool {
        match coding {
            "gzip" | "x-gzip" => self.gzip,
            "deflate" => self.deflate,
            "br" => self.brotli,
            "identity" | "" => true,
            _ => false,
        }
    }
}

/// Undo a single content coding.
pub fn decode(coding: &str, data: &[u8]) -> Result<Bytes, NetError> {
    let mut out = Vec::with_capacity(data.len() * 4);
    match coding {
        "gzip" | "x-gzip" => {
            GzDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|_| NetError::ContentDecodingFailed)?;
        }
        "deflate" => {
            // RFC 9110 says zlib-wrapped; some servers send raw deflate anyway.
            if ZlibDecoder::new(data).read_to_end(&mut out).is_err() {
                out.clear();
                DeflateDecoder::new(data)
                    .read_to_end(&mut out)
                    .map_err(|_| NetError::ContentDecodingFailed)?;
            }
        }
        "br" => {
            brotli::Decompressor::new(data, BROTLI_BUFFER)
                .read_to_end(&mut out)
                .map_err(|_| NetError::ContentDecodingFailed)?;
        }
        "identity" | "" => return Ok(Bytes::copy_from_slice(data)),
        _ => return Err(NetError::ContentDecodingFailed),
    }
    Ok(Bytes::from(out))
}

/// Decode a `Content-Encoding` header value, which may list several codings
/// applied in order. Returns `None` when any coding is unsupported, leaving
/// the body untouched for the caller.
pub fn decode_all(
    header: &str,
    data: Bytes,
    support: DecodeSupport,
) -> Result<Option<Bytes>, NetError> {
    let codings: Vec<String> = header
        .split(',')
        .map(|c| c.trim().to_ascii_lowercase())
        .filter(|c| !c.is_empty())
        .collect();

    if codings.iter().any(|c| !support.supports(c)) {
        return Ok(None);
    }

    let mut body = data;
    for coding in codings.iter().rev() {
        body = decode(coding, &body)?;
    }
    Ok(Some(body))
}
