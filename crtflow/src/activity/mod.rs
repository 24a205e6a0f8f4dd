//! Activity records: the persisted trace of every pipeline run.
//!
//! An [`Activity`] is created when Collect begins work for a type and is
//! resumed by the Refine and Transfer stages; its [`ActivityStatus`] moves
//! through an explicit transition graph enforced by the repository.

mod model;
mod store;

pub use model::{Activity, ActivityId, ActivityStatus, Extra};
pub use store::{ActivityRepository, MemoryActivityRepository};
