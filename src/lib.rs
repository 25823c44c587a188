//! Reassembly of byte streams transferred as a sequence of scanned 2D barcodes.
//!
//! A producer splits a payload into base64 fragments, each wrapped in a small
//! JSON chunk record and rendered as one symbol. The consumer feeds every
//! decoded symbol into a [`core::pipeline::StreamAssembler`], which tracks
//! any number of interleaved streams and rebuilds each payload once all of
//! its chunks have been seen, in any order and with any number of repeats.

pub mod core;
pub mod utils;
