use crate::error::{Result, SlowQuitError};
use crate::events::{ProcessRef, Trigger, VirtualKeyEvent};
use crate::services::keycode_map::KeycodeMap;
use crate::services::window_detector::activate_window;
use crate::services::VirtualDevice;
use crate::slowquit_error;
use tracing::{debug, info};

use super::r#trait::QuitEventSender;

pub struct UinputQuitSender {
    trigger: Trigger,
    device: VirtualDevice,
}

impl UinputQuitSender {
    pub fn new(trigger: Trigger) -> Result<Self> {
        info!("Инициализация UinputQuitSender для {}", trigger);
        Ok(Self {
            trigger,
            device: VirtualDevice::new("SlowQuit Quit Sender", false)?,
        })
    }

    fn shortcut_sequence(&self) -> [VirtualKeyEvent; 4] {
        let modifier = KeycodeMap::modifier_keycode(self.trigger.modifier);
        [
            VirtualKeyEvent::press(modifier),
            VirtualKeyEvent::press(self.trigger.key),
            VirtualKeyEvent::release(self.trigger.key),
            VirtualKeyEvent::release(modifier),
        ]
    }
}

#[async_trait::async_trait]
impl QuitEventSender for UinputQuitSender {
    async fn activate(&self, target: &ProcessRef) -> Result<()> {
        let target = target.clone();
        // Утилиты окон запускаются как внешние процессы, не держим ими рабочий поток
        tokio::task::spawn_blocking(move || activate_window(&target))
            .await
            .map_err(|e| SlowQuitError::Internal(format!("Задача активации окна прервана: {}", e)))?
    }

    async fn send_quit_shortcut(&self, target: &ProcessRef) -> Result<()> {
        debug!("Синтез {} для {}", self.trigger, target);
        self.device
            .send_batch(&self.shortcut_sequence())
            .map_err(|e| slowquit_error!(synthesis, "{}: {}", self.device.name(), e))
    }
}
