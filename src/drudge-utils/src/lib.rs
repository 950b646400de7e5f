//! Sequential glue used around drudge worker pools.
//!
//! Nothing in here spawns threads. These helpers prepare job streams
//! before they enter a pool and persist results after they leave it.

#![deny(rust_2018_idioms, rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod batch;
pub mod hash;
pub mod lines;
pub mod timing;
