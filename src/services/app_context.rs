use crate::events::ProcessRef;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// AppContext provides the focused-application snapshot for the gesture core.
///
/// Responsibilities (strict):
/// - Cache the application owning the active window with a cheap read on the hook thread.
/// - Answer whether a previously captured process is still alive.
/// - Do NOT make any gating decisions; this belongs to the target policy.
pub trait AppContext: Send + Sync {
    fn frontmost(&self) -> Option<ProcessRef>;
    fn update(&self, app: Option<ProcessRef>);
    fn is_running(&self, target: &ProcessRef) -> bool;
}

/// Default implementation backed by the focus tracker's last observation.
pub struct DefaultAppContext {
    frontmost: RwLock<Option<ProcessRef>>,
    changes: AtomicU64,
}

impl Default for DefaultAppContext {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultAppContext {
    pub fn new() -> Self {
        Self {
            frontmost: RwLock::new(None),
            changes: AtomicU64::new(0),
        }
    }

    /// Сколько раз менялось активное приложение
    pub fn change_count(&self) -> u64 {
        self.changes.load(Ordering::Relaxed)
    }
}

impl AppContext for DefaultAppContext {
    fn frontmost(&self) -> Option<ProcessRef> {
        self.frontmost.read().clone()
    }

    fn update(&self, app: Option<ProcessRef>) {
        let mut current = self.frontmost.write();
        let changed = match (current.as_ref(), app.as_ref()) {
            (Some(old), Some(new)) => !old.same_window(new),
            (None, None) => false,
            _ => true,
        };
        if changed {
            *current = app;
            self.changes.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn is_running(&self, target: &ProcessRef) -> bool {
        // Без pid проверить нельзя: считаем живым
        match target.pid {
            Some(pid) => Path::new(&format!("/proc/{}", pid)).exists(),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_tracks_changes_only() {
        let ctx = DefaultAppContext::new();
        assert!(ctx.frontmost().is_none());

        let app = ProcessRef::new("NVIM - FILE").with_app_id("kitty");
        ctx.update(Some(app.clone()));
        ctx.update(Some(app.clone()));
        assert_eq!(ctx.frontmost(), Some(app));
        assert_eq!(ctx.change_count(), 1);

        ctx.update(None);
        assert!(ctx.frontmost().is_none());
        assert_eq!(ctx.change_count(), 2);
    }

    #[test]
    fn liveness_uses_proc() {
        let ctx = DefaultAppContext::new();
        let me = ProcessRef::new("self").with_pid(std::process::id());
        assert!(ctx.is_running(&me));

        let unknown = ProcessRef::new("no pid");
        assert!(ctx.is_running(&unknown));

        let gone = ProcessRef::new("gone").with_pid(u32::MAX);
        assert!(!ctx.is_running(&gone));
    }
}
