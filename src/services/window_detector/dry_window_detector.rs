use crate::error::Result;
use crate::events::ProcessRef;
use crate::services::app_context::AppContext;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::info;

use super::r#trait::FocusTrackerTrait;

pub struct DryRunFocusTracker {
    app_context: Arc<dyn AppContext>,
}

impl DryRunFocusTracker {
    pub fn new(app_context: Arc<dyn AppContext>) -> Self {
        Self { app_context }
    }

    async fn run_impl(self) -> Result<()> {
        info!("Dry-run режим - FocusTracker работает в режиме эмуляции");

        let fake_apps = [
            ("Terminal - dry_run", "kitty"),
            ("Browser - dry_run", "firefox"),
            ("Editor - dry_run", "code"),
            ("Game - dry_run", "steam"),
        ];

        let mut app_index = 0;
        let mut interval = interval(Duration::from_secs(10));

        loop {
            interval.tick().await;

            let (title, app_id) = fake_apps[app_index];
            // pid собственного процесса, чтобы цель считалась живой
            let fake_app = ProcessRef::new(title)
                .with_app_id(app_id)
                .with_pid(std::process::id())
                .with_window_id(format!("dry-{}", app_index));

            info!("Dry-run: эмулируем смену активного приложения на: {}", fake_app);
            self.app_context.update(Some(fake_app));

            app_index = (app_index + 1) % fake_apps.len();
        }
    }
}

#[async_trait::async_trait]
impl FocusTrackerTrait for DryRunFocusTracker {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
