//! Reassembly pipeline: transport codec, producer split, stream assembler.

pub mod assembler;
pub mod sender;
pub mod transport;

pub use assembler::{
    ChunkResult, ChunkStatus, Progress, Reconstruction, SharedAssembler, StreamAssembler,
};
pub use sender::{split_payload, split_payload_with, SplitOptions};
