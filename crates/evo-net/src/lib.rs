//! The session server: an accept loop plus one read/write task pair per
//! TCP session, feeding the genome-request and score queues that the GA
//! loop drains.

pub mod queue;
pub mod server;

pub use queue::{GenomeRequest, Queues, ScoreReport};
pub use server::{serve, SharedState};
