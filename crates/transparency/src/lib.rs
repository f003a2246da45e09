//! The twin Merkle-tree engine at the core of veritree.
//!
//! Two authenticated data structures cooperate over one store:
//!
//! * [`history::HistoryTree`] — a perfect binary Merkle tree over the event
//!   sequence, indexed by insertion version. It proves membership of an
//!   event in a commitment and consistency between two commitments.
//! * [`hyper::HyperTree`] — a fixed-depth sparse Merkle tree keyed by event
//!   digest. It proves membership by key, returning the version at which
//!   the event was inserted.
//!
//! Both engines share the same machinery: a pruner builds a short-lived
//! [`visit::Pruned`] tree for each operation, eliding subtrees whose hashes
//! are already known, and a chain of [`visit::Visitor`]s walks it bottom-up
//! to produce a root hash, an audit path, and a batch of durable mutations
//! the caller persists atomically.

#![warn(rust_2018_idioms, unused_lifetimes)]
#![warn(unused_qualifications)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod cache;
mod error;
pub mod history;
pub mod hyper;
mod metrics;
mod position;
pub mod visit;

pub use error::TreeError;
pub use position::TreePosition;
