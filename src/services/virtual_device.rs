use crate::error::{Result, SlowQuitError};
use crate::events::VirtualKeyEvent;
use crate::debug_if_enabled;
use parking_lot::Mutex;
use tracing::info;

/// Виртуальная клавиатура uinput: проброс пропущенных событий и синтез сочетаний
pub struct VirtualDevice {
    device: Mutex<Option<uinput::Device>>,
    device_name: String,
    dry_run: bool,
}

impl VirtualDevice {
    pub fn new(device_name: &str, dry_run: bool) -> Result<Self> {
        info!("Инициализация VirtualDevice '{}' (dry_run: {})", device_name, dry_run);

        let device = if dry_run {
            None
        } else {
            Some(Self::create_virtual_device(device_name)?)
        };

        Ok(Self {
            device: Mutex::new(device),
            device_name: device_name.to_string(),
            dry_run,
        })
    }

    fn create_virtual_device(device_name: &str) -> Result<uinput::Device> {
        info!("Создание виртуального устройства uinput '{}'", device_name);

        let virtual_device = uinput::default()?
            .name(device_name)?
            .event(uinput::event::Keyboard::All)?
            .create()
            .map_err(|e| SlowQuitError::Internal(format!("Не удалось создать виртуальное устройство '{}': {}", device_name, e)))?;

        info!("Виртуальное устройство '{}' создано успешно", device_name);
        Ok(virtual_device)
    }

    pub fn name(&self) -> &str {
        &self.device_name
    }

    pub fn send_event(&self, event: VirtualKeyEvent) -> Result<()> {
        self.send_batch(&[event])
    }

    /// Отправить несколько событий одной пачкой с одной синхронизацией
    pub fn send_batch(&self, events: &[VirtualKeyEvent]) -> Result<()> {
        if self.dry_run {
            info!("[DRY RUN] {}: {:?}", self.device_name, events);
            return Ok(());
        }

        let mut guard = self.device.lock();
        let Some(device) = guard.as_mut() else {
            return Err(SlowQuitError::Internal("Виртуальное устройство недоступно".to_string()));
        };

        for event in events {
            let keycode = event.key_code.value() as i32;
            let value = event.state.value();

            // EV_KEY
            if let Err(e) = device.write(1, keycode, value) {
                return Err(SlowQuitError::Internal(format!("Не удалось отправить событие клавиши {}: {}", keycode, e)));
            }

            // EV_SYN после каждого изменения, иначе композитор склеит нажатие и отпускание
            if let Err(e) = device.write(0, 0, 0) {
                return Err(SlowQuitError::Internal(format!("Не удалось синхронизировать события: {}", e)));
            }
        }

        debug_if_enabled!("{} событий отправлено через {}", events.len(), self.device_name);
        Ok(())
    }
}

impl Drop for VirtualDevice {
    fn drop(&mut self) {
        if !self.dry_run {
            info!("Закрытие виртуального устройства '{}'", self.device_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::KeyCode;

    #[test]
    fn dry_run_device_accepts_events() {
        let device = VirtualDevice::new("test", true).unwrap();
        assert_eq!(device.name(), "test");
        assert!(device.send_event(VirtualKeyEvent::press(KeyCode::new(16))).is_ok());
        assert!(device
            .send_batch(&[
                VirtualKeyEvent::press(KeyCode::new(29)),
                VirtualKeyEvent::release(KeyCode::new(29)),
            ])
            .is_ok());
    }
}
