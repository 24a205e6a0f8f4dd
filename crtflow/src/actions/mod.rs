//! Stage executors.
//!
//! All three executors share one skeleton: check the enabled toggle,
//! resolve the plugin, resolve or create the activity, invoke the plugin
//! inside a failure boundary, then persist records, merge extra, and
//! update status. The per-stage variance is the plugin kind and the
//! activity-selection policy.

mod collect;
mod refine;
mod transfer;

pub use collect::CollectAction;
pub use refine::RefineAction;
pub use transfer::TransferAction;

use crate::activity::{ActivityRepository, ActivityStatus, Extra};
use crate::errors::PluginError;
use std::sync::Arc;
use tracing::error;

/// Records a plugin failure onto its activity: the error lands in the
/// extra bag and the status moves to `Failed`.
///
/// The activity record is the durable trace of the failure even if the
/// caller never inspects the returned error, so recording problems are
/// logged rather than allowed to mask the original cause.
pub(crate) async fn record_plugin_failure(
    activities: &Arc<dyn ActivityRepository>,
    err: &PluginError,
) {
    let Some(activity_id) = err.activity_id else {
        return;
    };
    if let Err(store_err) = activities
        .merge_extra(activity_id, Extra::from_value(err.to_value()))
        .await
    {
        error!(
            activity_id = %activity_id,
            error = %store_err,
            "Failed to record plugin failure into activity extra"
        );
    }
    if let Err(store_err) = activities
        .update_status(activity_id, ActivityStatus::Failed)
        .await
    {
        error!(
            activity_id = %activity_id,
            error = %store_err,
            "Failed to mark activity as failed"
        );
    }
}
