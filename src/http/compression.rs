//! Outbound request body compression.
//!
//! Requests go out Brotli-compressed until the active endpoint reports it
//! cannot read them, after which every later request uses zlib deflate.
//! That downgrade is stored in preferences and never reverts on its own.

use crate::base::neterror::NetError;
use crate::prefs::{PreferenceStore, KEY_BROTLI};
use crate::transport::Connection;
use brotli::enc::backward_references::BrotliEncoderMode;
use brotli::enc::BrotliEncoderParams;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;

/// Codec applied to request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentCoding {
    Brotli,
    Deflate,
}

impl ContentCoding {
    /// `Content-Encoding` token.
    pub fn header_value(self) -> &'static str {
        match self {
            ContentCoding::Brotli => "br",
            ContentCoding::Deflate => "deflate",
        }
    }
}

/// Encoder tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Brotli quality, 0..=11.
    pub brotli_quality: u32,
    /// Brotli window (log2), 10..=24.
    pub brotli_window: u32,
    /// zlib level, 0..=9.
    pub deflate_level: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            brotli_quality: 5,
            brotli_window: 22,
            deflate_level: 9,
        }
    }
}

impl CompressionConfig {
    pub fn brotli_quality(mut self, quality: u32) -> Self {
        self.brotli_quality = quality;
        self
    }

    pub fn deflate_level(mut self, level: u32) -> Self {
        self.deflate_level = level;
        self
    }
}

/// Compress `data` with `coding`.
pub fn encode(
    coding: ContentCoding,
    data: &[u8],
    config: &CompressionConfig,
) -> Result<Vec<u8>, NetError> {
    match coding {
        ContentCoding::Brotli => {
            let mut params = BrotliEncoderParams::default();
            params.quality = config.brotli_quality.min(11) as i32;
            params.lgwin = config.brotli_window.clamp(10, 24) as i32;
            params.mode = BrotliEncoderMode::BROTLI_MODE_TEXT;
            let mut input = data;
            let mut out = Vec::with_capacity(data.len() / 2 + 16);
            brotli::BrotliCompress(&mut input, &mut out, &params)
                .map_err(|_| NetError::ContentEncodingFailed)?;
            Ok(out)
        }
        ContentCoding::Deflate => {
            let level = Compression::new(config.deflate_level.min(9));
            let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2 + 16), level);
            encoder
                .write_all(data)
                .map_err(|_| NetError::ContentEncodingFailed)?;
            encoder.finish().map_err(|_| NetError::ContentEncodingFailed)
        }
    }
}

/// The persisted "still allowed to send Brotli" flag.
#[derive(Clone)]
pub struct CompressionPreference {
    prefs: Arc<dyn PreferenceStore>,
}

impl std::fmt::Debug for CompressionPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressionPreference")
            .field("current", &self.current())
            .finish()
    }
}

impl CompressionPreference {
    pub fn new(prefs: Arc<dyn PreferenceStore>) -> Self {
        Self { prefs }
    }

    pub fn current(&self) -> ContentCoding {
        if self.prefs.get_bool(KEY_BROTLI).unwrap_or(true) {
            ContentCoding::Brotli
        } else {
            ContentCoding::Deflate
        }
    }

    /// Switch to Deflate for good. Returns true if this call changed it.
    pub fn downgrade(&self) -> Result<bool, NetError> {
        if self.current() == ContentCoding::Deflate {
            return Ok(false);
        }
        self.prefs.set_bool(KEY_BROTLI, false)?;
        tracing::debug!("request compression downgraded to deflate");
        Ok(true)
    }
}

/// Writes compressed request bodies onto connections.
#[derive(Debug, Clone)]
pub struct CompressionNegotiator {
    preference: CompressionPreference,
    config: CompressionConfig,
}

impl CompressionNegotiator {
    pub fn new(preference: CompressionPreference, config: CompressionConfig) -> Self {
        Self { preference, config }
    }

    pub fn preference(&self) -> &CompressionPreference {
        &self.preference
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// Compress `body` with the preferred codec and write it as the request
    /// body: exact `Content-Length`, no redirects, a single write.
    pub fn write_compressed(
        &self,
        connection: &Connection,
        body: &str,
    ) -> Result<ContentCoding, NetError> {
        let coding = self.preference.current();
        let payload = encode(coding, body.as_bytes(), &self.config)?;

        connection.set_header("Content-Encoding", coding.header_value())?;
        connection.set_follow_redirects(false)?;
        connection.set_fixed_length_streaming(payload.len() as u64)?;
        connection.write_body(&payload)?;

        tracing::trace!(
            url = %connection.url(),
            encoding = coding.header_value(),
            len = payload.len(),
            "compressed request body"
        );
        Ok(coding)
    }
}
