//! Scoring service, configuration store, and HTTP routes.

pub mod router;
pub mod scoring;
pub mod store;

pub use router::{scoring_router, BatchRequest};
pub use scoring::{
    CompanyRollup, ConfigIssueView, RollupRequest, ScoringService, ScoringServiceError,
    SnapshotSummary,
};
pub use store::{ConfigStore, InMemoryConfigStore, StoreError};
