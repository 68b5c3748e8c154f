//! Byte-level wire protocol for the evolve-server coordinator: a worker's
//! fixed 96-byte request frame, the server's variable-length data frame,
//! and the big-endian length prefix wrapping both.

pub mod command;
pub mod frame;
pub mod session;

pub use command::Command;
pub use frame::{DataFrame, DataKind, Payload, RequestFrame, DATA_HEADER_LEN, REQUEST_FRAME_LEN};
pub use session::{decode_length_prefix, encode_length_prefix, LENGTH_PREFIX_LEN};
