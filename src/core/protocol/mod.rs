//! Chunk wire protocol: records, parsing, checksums, errors.

pub mod checksum;
pub mod chunk;
pub mod error;
pub mod parser;

pub use chunk::{Chunk, ChunkBitmap, WireChunk};
pub use error::{ChunkError, EncodeError, InvalidField, ParseError, ReconstructError};
pub use parser::parse;
