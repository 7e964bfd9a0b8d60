use crate::error::Result;
use crate::events::{ProcessRef, Trigger};
use tracing::info;

use super::r#trait::QuitEventSender;

pub struct DryRunQuitSender {
    trigger: Trigger,
}

impl DryRunQuitSender {
    pub fn new(trigger: Trigger) -> Self {
        info!("Инициализация DryRunQuitSender");
        Self { trigger }
    }
}

#[async_trait::async_trait]
impl QuitEventSender for DryRunQuitSender {
    async fn activate(&self, target: &ProcessRef) -> Result<()> {
        info!("[DRY RUN] Активация окна {}", target);
        Ok(())
    }

    async fn send_quit_shortcut(&self, target: &ProcessRef) -> Result<()> {
        info!("[DRY RUN] Отправка {} приложению {}", self.trigger, target);
        Ok(())
    }
}
