//! Domain model (policy, classification, outcomes, errors, ...).
//!
//! I/O を持たない型だけを置く。

pub mod classifier;
pub mod errors;
pub mod object;
pub mod outcome;
pub mod policy;
pub mod state;

pub use self::classifier::{
    Classification, ExpirationClassifier, SkipReason, format_timestamp_suffix,
};
pub use self::errors::{BackendError, ReclaimError, SweepError};
pub use self::object::{BucketCandidate, ObjectRef};
pub use self::outcome::{BucketOutcome, BucketReport, SweepResult};
pub use self::policy::{DEFAULT_LIFESPAN, DEFAULT_WORKER_COUNT, Policy, PolicyBuilder, PolicyError};
pub use self::state::BucketState;
