//! # Strix Core
//!
//! Core traits, types, and error taxonomy for the Strix streaming
//! compression engine.
//!
//! ## Core pieces
//!
//! - [`ByteStream`] - the capability surface the engine consumes and exposes
//! - [`StreamCompress`] / [`StreamDecompress`] - incremental codec contracts
//! - [`Backend`] - explicit, construction-time codec backend selection
//! - [`Error`] - the engine's single error taxonomy
//!
//! ## Example
//!
//! ```ignore
//! use strix_core::{Backend, CompressionLevel, Mode};
//! use strix_stream::DeflateStream;
//!
//! let stream = DeflateStream::new(inner, Mode::Decompress)?;
//! ```

pub mod error;
pub mod stream;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use stream::{ByteStream, Flush};
pub use traits::{StreamCompress, StreamDecompress};
pub use types::{Backend, CompressionLevel, Mode};
