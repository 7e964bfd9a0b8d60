use crate::error::{SlowQuitError, Result};
use crate::slowquit_error;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Префикс имени собственных uinput устройств, их нельзя захватывать
const OWN_DEVICE_PREFIX: &str = "SlowQuit";

pub struct DeviceFinder;

impl DeviceFinder {
    /// Найти клавиатуру: явный путь из конфигурации или автопоиск при "auto"
    pub fn find_keyboard_device(device_path: &str) -> Result<PathBuf> {
        if device_path != "auto" {
            let path = PathBuf::from(device_path);
            return if path.exists() {
                info!("Используется указанное устройство: {:?}", path);
                Ok(path)
            } else {
                SlowQuitError::device_not_found(format!("Указанное устройство не найдено: {:?}", path))
            };
        }

        Self::auto_find_keyboard()
    }

    fn auto_find_keyboard() -> Result<PathBuf> {
        info!("Начинаем автопоиск клавиатурного устройства...");

        if let Ok(device) = Self::find_by_id() {
            info!("Найдено устройство по ID: {:?}", device);
            return Ok(device);
        }

        if let Ok(device) = Self::find_by_event_devices() {
            info!("Найдено устройство среди event устройств: {:?}", device);
            return Ok(device);
        }

        Err(slowquit_error!(
            device_not_found,
            "Не удалось найти подходящее клавиатурное устройство. \
             Убедитесь, что пользователь добавлен в группу 'input'"
        ))
    }

    fn find_by_id() -> Result<PathBuf> {
        let by_id_dir = Path::new("/dev/input/by-id");
        if !by_id_dir.exists() {
            debug!("Директория /dev/input/by-id не существует");
            return SlowQuitError::device_not_found("Директория by-id не найдена");
        }

        let entries = fs::read_dir(by_id_dir)
            .map_err(|e| slowquit_error!(permission, "Нет доступа к /dev/input/by-id: {}", e))?;

        let mut keyboards = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("").to_string();

            if !name.contains("event") || !(name.contains("kbd") || name.contains("keyboard")) {
                continue;
            }
            if name.to_lowercase().contains("mouse") {
                debug!("Исключаем как мышь: {}", name);
                continue;
            }
            if !Self::is_device_accessible(&path) {
                warn!("Устройство {:?} недоступно", path);
                continue;
            }
            if Self::is_keyboard_device(&path) {
                let priority = Self::priority(&name);
                info!("Добавлена клавиатура: {} (приоритет: {})", name, priority);
                keyboards.push((path, priority));
            }
        }

        keyboards.sort_by(|a, b| b.1.cmp(&a.1));
        match keyboards.into_iter().next() {
            Some((keyboard, _)) => Ok(keyboard),
            None => SlowQuitError::device_not_found("Клавиатурное устройство не найдено в by-id"),
        }
    }

    fn priority(name: &str) -> u32 {
        if name.ends_with("event-kbd") {
            100
        } else if name.to_lowercase().contains("keyboard") {
            50
        } else {
            10
        }
    }

    fn find_by_event_devices() -> Result<PathBuf> {
        let entries = fs::read_dir("/dev/input")
            .map_err(|e| slowquit_error!(permission, "Нет доступа к /dev/input: {}", e))?;

        let mut event_devices = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_event = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("event"))
                .unwrap_or(false);
            if is_event {
                event_devices.push(path);
            }
        }
        event_devices.sort();

        event_devices
            .into_iter()
            .find(|path| Self::is_keyboard_device(path) && Self::is_device_accessible(path))
            .ok_or_else(|| {
                slowquit_error!(device_not_found, "Не найдено доступное клавиатурное устройство среди event устройств")
            })
    }

    /// Клавиатура должна уметь сочетание выхода: буквы и Ctrl
    fn is_keyboard_device(device_path: &Path) -> bool {
        let device = match evdev::Device::open(device_path) {
            Ok(device) => device,
            Err(e) => {
                debug!("Не удалось открыть устройство {:?}: {}", device_path, e);
                return false;
            }
        };

        let name = device.name().unwrap_or("Unknown");
        if name.starts_with(OWN_DEVICE_PREFIX) {
            debug!("Пропускаем собственное устройство {:?} ({})", device_path, name);
            return false;
        }

        let lowered = name.to_lowercase();
        if ["mouse", "touchpad", "trackpoint"].iter().any(|word| lowered.contains(word)) {
            debug!("Исключаем устройство как мышь/тачпад: {:?} ({})", device_path, name);
            return false;
        }

        let has_keys = device.supported_keys().map_or(false, |keys| {
            keys.contains(evdev::KeyCode::KEY_Q)
                && keys.contains(evdev::KeyCode::KEY_LEFTCTRL)
                && keys.contains(evdev::KeyCode::KEY_ENTER)
                && keys.iter().count() > 20
        });

        if has_keys {
            info!("Устройство {:?} подходит как клавиатура ({})", device_path, name);
        } else {
            debug!("Устройство {:?} не подходит как клавиатура ({})", device_path, name);
        }
        has_keys
    }

    fn is_device_accessible(device_path: &Path) -> bool {
        match fs::File::open(device_path) {
            Ok(_) => true,
            Err(e) => {
                debug!("Устройство {:?} недоступно: {}", device_path, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_explicit_path_is_device_not_found() {
        let result = DeviceFinder::find_keyboard_device("/non/existent/path");
        assert!(matches!(result, Err(SlowQuitError::DeviceNotFound(_))));
    }

    #[test]
    fn kbd_links_rank_first() {
        assert!(
            DeviceFinder::priority("usb-Vendor_Board-event-kbd")
                > DeviceFinder::priority("usb-Vendor_Keyboard-if01-event")
        );
        assert_eq!(DeviceFinder::priority("platform-i8042-serio-0-event"), 10);
    }
}
