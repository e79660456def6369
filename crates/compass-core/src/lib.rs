//! Core of the course retrieval engine: domain types, configuration, and the
//! structure-aware chunker.
//!
//! Index and embedding collaborators plug in through [`traits`].

pub mod boundary;
pub mod chunker;
pub mod config;
pub mod corpus;
pub mod error;
pub mod traits;
pub mod types;

pub use chunker::{chunk_text, Chunker, ChunkingConfig, TextSpan};
pub use error::{Error, Result};
