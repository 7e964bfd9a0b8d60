use crate::config::Config;
use crate::error::Result;
use crate::events::{RawEvent, Trigger, Verdict};
use crate::services::settings::DelayConfigProvider;
use std::sync::Arc;

/// Receiver of the raw event stream. Called on the hook thread; must not block.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: RawEvent) -> Verdict;

    /// Internal consistency of the handler, checked by the watchdog
    fn is_healthy(&self) -> bool {
        true
    }

    /// Drop any in-flight state before the hook is restarted
    fn reset(&self) {}
}

/// Capability interface of the OS input hook
pub trait InputHook: Send + Sync {
    /// Start delivering events to `handler`. Starting a started hook is a no-op.
    fn start(&self, handler: Arc<dyn EventHandler>) -> Result<()>;

    /// Stop delivering events and release the device
    fn stop(&self);

    /// Locally tracked flag: `start` succeeded and `stop` was not called
    fn is_started(&self) -> bool;

    /// OS-level liveness: the hook is still actually receiving events
    fn is_enabled(&self) -> bool;
}

/// Factory function to create an appropriate input hook based on the dry_run flag
pub fn create_input_hook(
    config: Arc<Config>,
    trigger: Trigger,
    delay: Arc<dyn DelayConfigProvider>,
    dry_run: bool,
) -> Result<Arc<dyn InputHook>> {
    if dry_run {
        Ok(Arc::new(super::dry_input_hook::DryRunInputHook::new(trigger, delay)))
    } else {
        Ok(Arc::new(super::evdev_hook::EvdevInputHook::new(config)))
    }
}
