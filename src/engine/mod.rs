//! Resource reconciliation engine
//!
//! Generic over the resource kind: every kind plugs in a [`ResourceApi`]
//! implementation and a [`ResourceKind`] describing its identity fields and
//! comparison rules.
//!
//! # Module Structure
//!
//! - [`selector`] - Picks the most specific lookup strategy the known fields allow
//! - [`identity`] - Typed composite identity and its opaque string encoding
//! - [`pager`] - Lazy pagination of collection endpoints
//! - [`resolver`] - Finds one remote object by id or secondary key
//! - [`equivalence`] - Field comparators and drift detection
//! - [`writer`] - Adopt-or-create, update and delete on top of the above

pub mod api;
pub mod equivalence;
pub mod error;
pub mod identity;
pub mod pager;
pub mod resolver;
pub mod selector;
pub mod writer;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{DesiredState, Detail, Page, PageMarker, ResourceApi, Summary};
pub use equivalence::Equivalence;
pub use error::{ApiError, ReconcileError};
pub use identity::{CompositeIdentity, IdentitySchema, Scope};
pub use selector::{select_method, LookupStrategy};
pub use writer::{
    CreateOutcome, DeleteOutcome, ReconciledWriter, Resolved, ResourceKind, UpdateOutcome,
};
