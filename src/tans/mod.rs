//! Table-based asymmetric numeral system (tANS) entropy coder.
//!
//! The coder is split into table construction ([`tables`]) and the symbol
//! stream codec ([`coder`]). Tables are built once — at dictionary load or
//! adaptive rebuild — and shared read-only by the per-packet hot loops.

pub mod coder;
pub mod tables;

pub use coder::{tans_decode, tans_encode, TansTables};
pub use tables::{build_codec_pair, CodecPair, DecodeEntry, DecodeTable, EncodeTable};

/// Table log of the high-resolution tables (4096 states).
pub const TABLE_LOG_12: u32 = 12;
/// Table log of the compact tables (1024 states).
pub const TABLE_LOG_10: u32 = 10;
