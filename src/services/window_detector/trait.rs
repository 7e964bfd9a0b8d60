use crate::config::Config;
use crate::error::Result;
use crate::services::app_context::AppContext;
use std::sync::Arc;

/// Trait for focus trackers that can run in different modes
#[async_trait::async_trait]
pub trait FocusTrackerTrait {
    /// Run the focus tracker
    async fn run(self: Box<Self>) -> Result<()>;
}

/// Factory function to create an appropriate focus tracker based on the dry_run flag
pub fn create_focus_tracker(
    config: Arc<Config>,
    app_context: Arc<dyn AppContext>,
    dry_run: bool,
) -> Result<Box<dyn FocusTrackerTrait + Send>> {
    if dry_run {
        Ok(Box::new(super::dry_window_detector::DryRunFocusTracker::new(
            app_context,
        )))
    } else {
        Ok(Box::new(super::window_detector::RealFocusTracker::new(
            config,
            app_context,
        )?))
    }
}
