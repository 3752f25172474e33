// src/compression/mod.rs
//! Compression for package archives
//!
//! pacman accepts `.pkg.tar.{gz,xz,zst,bz2}`. The encoder wraps any writer
//! and must be finished explicitly so trailers reach the file.

use clap::ValueEnum;
use serde::Deserialize;
use std::io::{self, Write};

/// Supported archive compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    /// Gzip compression (.gz)
    Gz,
    /// XZ/LZMA compression (.xz)
    Xz,
    /// Zstandard compression (.zst)
    #[default]
    Zstd,
    /// Bzip2 compression (.bz2)
    Bz2,
}

impl CompressionMethod {
    /// File suffix used after `.pkg.tar.`
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Gz => "gz",
            Self::Xz => "xz",
            Self::Zstd => "zst",
            Self::Bz2 => "bz2",
        }
    }

    /// Get a human-readable name for this method
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gz => "gzip",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
            Self::Bz2 => "bzip2",
        }
    }
}

impl std::fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A compressing writer for one of the supported methods
pub enum Encoder<W: Write> {
    Gz(flate2::write::GzEncoder<W>),
    Xz(xz2::write::XzEncoder<W>),
    Zstd(zstd::Encoder<'static, W>),
    Bz2(bzip2::write::BzEncoder<W>),
}

impl<W: Write> Encoder<W> {
    /// Wrap `writer` in an encoder for `method`
    pub fn new(writer: W, method: CompressionMethod) -> io::Result<Self> {
        Ok(match method {
            CompressionMethod::Gz => Self::Gz(flate2::write::GzEncoder::new(
                writer,
                flate2::Compression::default(),
            )),
            CompressionMethod::Xz => Self::Xz(xz2::write::XzEncoder::new(writer, 6)),
            CompressionMethod::Zstd => Self::Zstd(zstd::Encoder::new(writer, 19)?),
            CompressionMethod::Bz2 => Self::Bz2(bzip2::write::BzEncoder::new(
                writer,
                bzip2::Compression::default(),
            )),
        })
    }

    /// Flush the trailer and return the inner writer
    pub fn finish(self) -> io::Result<W> {
        match self {
            Self::Gz(e) => e.finish(),
            Self::Xz(e) => e.finish(),
            Self::Zstd(e) => e.finish(),
            Self::Bz2(e) => e.finish(),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Gz(e) => e.write(buf),
            Self::Xz(e) => e.write(buf),
            Self::Zstd(e) => e.write(buf),
            Self::Bz2(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Gz(e) => e.flush(),
            Self::Xz(e) => e.flush(),
            Self::Zstd(e) => e.flush(),
            Self::Bz2(e) => e.flush(),
        }
    }
}
