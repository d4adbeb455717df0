//! Core type definitions for compression streams.

use crate::error::Error;

/// Direction of a compression stream, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// The stream accepts plaintext writes and emits compressed bytes.
    Compress,
    /// The stream reads compressed bytes and yields plaintext.
    Decompress,
}

impl Mode {
    /// Get the mode name as a string.
    pub fn name(self) -> &'static str {
        match self {
            Mode::Compress => "compress",
            Mode::Decompress => "decompress",
        }
    }
}

/// Dynamic construction path for mode values originating outside the type
/// system (configuration files, FFI). Unknown discriminants are rejected.
impl TryFrom<i32> for Mode {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self, Error> {
        match value {
            0 => Ok(Mode::Compress),
            1 => Ok(Mode::Decompress),
            other => Err(Error::invalid_argument(
                "mode",
                format!("{other} is not a recognized compression mode"),
            )),
        }
    }
}

/// Compression level presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionLevel {
    /// Favor compression ratio over speed.
    #[default]
    Optimal,

    /// Favor speed over ratio.
    Fastest,

    /// No compression, framing only.
    NoCompression,
}

impl CompressionLevel {
    /// Convert to the numeric level used for backend tuning.
    pub fn to_level(self) -> u32 {
        match self {
            CompressionLevel::Optimal => 6,
            CompressionLevel::Fastest => 1,
            CompressionLevel::NoCompression => 0,
        }
    }

    /// Create from a numeric level.
    pub fn from_level(level: u32) -> Self {
        match level {
            0 => CompressionLevel::NoCompression,
            1..=3 => CompressionLevel::Fastest,
            _ => CompressionLevel::Optimal,
        }
    }
}

/// Codec backend selection.
///
/// The backend is an explicit construction parameter, never process-wide
/// state, so streams with different backends coexist freely. Both backends
/// produce interchangeable DEFLATE streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Backend {
    /// zlib-style codec bridged through `flate2`.
    #[default]
    Zlib,

    /// Self-contained implementation with no native lineage.
    Rust,
}

impl Backend {
    /// Get the backend name as a string.
    pub fn name(self) -> &'static str {
        match self {
            Backend::Zlib => "zlib",
            Backend::Rust => "rust",
        }
    }
}
