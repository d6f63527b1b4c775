#![deny(missing_docs)]
#![doc = "Core records, tables and error types shared by CAMD stability campaigns."]

pub mod composition;
pub mod entries;
pub mod errors;
/// Canonical hashing helpers.
pub mod hash;
pub mod rng;
pub mod schema;
/// Canonical JSON serde helpers.
pub mod serde;
pub mod tables;

pub use composition::Composition;
pub use entries::{
    CandidateEntry, EntrySource, EvaluationOutcome, EvaluationResult, EvaluationStatus,
    Prediction, SeedEntry,
};
pub use errors::{CampError, ErrorInfo};
pub use hash::stable_hash_string;
pub use schema::SchemaVersion;
pub use rng::{derive_substream_seed, RngHandle};
pub use tables::{ensure_disjoint, feature_width, CandidateTable, SeedTable};
