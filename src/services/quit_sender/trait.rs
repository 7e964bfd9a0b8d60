use crate::error::Result;
use crate::events::{ProcessRef, Trigger};
use std::sync::Arc;

/// Platform side of the confirm step: focus the locked target, then send it the quit shortcut.
///
/// Self-echo bookkeeping is not done here; the gesture state machine opens and
/// closes that window around the calls.
#[async_trait::async_trait]
pub trait QuitEventSender: Send + Sync {
    /// Bring the target's window to the foreground
    async fn activate(&self, target: &ProcessRef) -> Result<()>;

    /// Synthesize the trigger combination (modifier down, key down, key up, modifier up)
    async fn send_quit_shortcut(&self, target: &ProcessRef) -> Result<()>;
}

/// Factory function to create an appropriate quit sender based on the dry_run flag
pub fn create_quit_sender(trigger: Trigger, dry_run: bool) -> Result<Arc<dyn QuitEventSender>> {
    if dry_run {
        Ok(Arc::new(super::dry_quit_sender::DryRunQuitSender::new(trigger)))
    } else {
        Ok(Arc::new(super::uinput_sender::UinputQuitSender::new(trigger)?))
    }
}
