//! Adapters for the general-purpose compressors the output streams are
//! handed to.

use std::fmt::Debug;
use std::io::{Read, Write};

use anyhow::Context;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use log::debug;

const BUFFER_SIZE: usize = 4096;
const DEFAULT_BROTLI_WINDOW_BITS: u32 = 22;
const MIN_BROTLI_WINDOW_BITS: u32 = 10;
const MAX_BROTLI_WINDOW_BITS: u32 = 24;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    pub const MIN: CompressionLevel = CompressionLevel(1);
    pub const MAX: CompressionLevel = CompressionLevel(9);

    #[must_use]
    pub const fn new(value: u8) -> Self {
        assert!(value >= 1);
        assert!(value <= 9);

        Self(value)
    }

    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(7)
    }
}

pub trait CompressionBackend: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Compresses `data`; `period_hint` is the expected distance between
    /// repeats, if known.
    fn compress(
        &self,
        data: &[u8],
        level: CompressionLevel,
        period_hint: Option<usize>,
    ) -> anyhow::Result<Vec<u8>>;

    fn decompress(&self, data: &[u8]) -> anyhow::Result<Vec<u8>>;
}

#[derive(Debug, Copy, Clone, Default)]
pub struct BrotliBackend;

impl BrotliBackend {
    fn quality(level: CompressionLevel) -> u32 {
        level.get() as u32 + 2
    }

    fn window_bits(period_hint: Option<usize>) -> u32 {
        match period_hint {
            Some(period) => (usize::BITS - period.leading_zeros() + 1)
                .clamp(MIN_BROTLI_WINDOW_BITS, MAX_BROTLI_WINDOW_BITS),
            None => DEFAULT_BROTLI_WINDOW_BITS,
        }
    }
}

impl CompressionBackend for BrotliBackend {
    fn name(&self) -> &'static str {
        "brotli"
    }

    fn compress(
        &self,
        data: &[u8],
        level: CompressionLevel,
        period_hint: Option<usize>,
    ) -> anyhow::Result<Vec<u8>> {
        let mut compressed = Vec::new();
        {
            let mut writer = brotli::enc::writer::CompressorWriter::new(
                &mut compressed,
                BUFFER_SIZE,
                Self::quality(level),
                Self::window_bits(period_hint),
            );
            writer
                .write_all(data)
                .context("Could not compress data with Brotli")?;
        }

        debug!(
            "Compressed {} bytes into {} bytes with Brotli",
            data.len(),
            compressed.len()
        );
        Ok(compressed)
    }

    fn decompress(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut decompressed = Vec::new();
        let mut reader = brotli::Decompressor::new(data, BUFFER_SIZE);
        reader
            .read_to_end(&mut decompressed)
            .context("Could not decompress Brotli data")?;

        Ok(decompressed)
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct DeflateBackend;

impl CompressionBackend for DeflateBackend {
    fn name(&self) -> &'static str {
        "deflate"
    }

    fn compress(
        &self,
        data: &[u8],
        level: CompressionLevel,
        _period_hint: Option<usize>,
    ) -> anyhow::Result<Vec<u8>> {
        let mut encoder =
            DeflateEncoder::new(Vec::new(), flate2::Compression::new(level.get() as u32));
        encoder
            .write_all(data)
            .context("Could not compress data with Deflate")?;
        let compressed = encoder
            .finish()
            .context("Could not compress data with Deflate")?;

        debug!(
            "Compressed {} bytes into {} bytes with Deflate",
            data.len(),
            compressed.len()
        );
        Ok(compressed)
    }

    fn decompress(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut decompressed = Vec::new();
        let mut reader = DeflateDecoder::new(data);
        reader
            .read_to_end(&mut decompressed)
            .context("Could not decompress Deflate data")?;

        Ok(decompressed)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum BackendKind {
    #[default]
    Brotli,
    Deflate,
}

impl BackendKind {
    pub const VALUES: [BackendKind; 2] = [BackendKind::Brotli, BackendKind::Deflate];

    #[must_use]
    pub fn backend(&self) -> Box<dyn CompressionBackend> {
        match self {
            BackendKind::Brotli => Box::new(BrotliBackend),
            BackendKind::Deflate => Box::new(DeflateBackend),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Brotli => "brotli",
            BackendKind::Deflate => "deflate",
        }
    }
}
