//! # featmodel-version
//!
//! Copy-on-write versioning of feature models.
//!
//! A version's rows are never edited in place. Every change clones the
//! source version into a new DRAFT ([`clone::stage_clone`]), applies exactly
//! one change to the staged rows and commits the result in one step. The
//! only in-place writes are lifecycle transitions and the snapshot written
//! once at publish.
//!
//! ```text
//!            publish                 archive
//!   DRAFT ─────────────► PUBLISHED ◄─────────► ARCHIVED
//!     │     (gated)                  restore
//!     └─ discard_draft
//! ```
//!
//! [`VersionManager`] is the entry point; [`VersionStore`] is the plain
//! value it operates on.

pub mod clone;
pub mod edit;
pub mod manager;
pub mod snapshot;
pub mod store;

pub use clone::{IdMap, stage_clone};
pub use edit::{
    ConstraintUpdate, FeatureUpdate, GroupUpdate, NewConstraint, NewFeature, NewGroup,
};
pub use manager::{EditOutcome, VersionManager};
pub use snapshot::{build_snapshot, content_digest, verify_snapshot};
pub use store::{StoreError, StoredVersion, VersionStore};
