use crate::error::Result;
use crate::slowquit_error;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::{info, warn};

/// Проверить доступ к устройствам ввода и uinput
pub fn check_permissions() -> Result<()> {
    info!("Проверка прав доступа...");

    check_input_devices_access()?;
    check_uinput_access()?;
    check_not_root();

    info!("Проверка прав доступа завершена успешно");
    Ok(())
}

fn check_input_devices_access() -> Result<()> {
    let input_dir = "/dev/input";

    if !Path::new(input_dir).exists() {
        return Err(slowquit_error!(permission, "Директория {} не существует", input_dir));
    }

    fs::read_dir(input_dir).map_err(|e| {
        slowquit_error!(
            permission,
            "Нет доступа к {}: {}. Добавьте пользователя в группу 'input'",
            input_dir,
            e
        )
    })?;

    info!("Доступ к {} подтвержден", input_dir);
    Ok(())
}

fn check_uinput_access() -> Result<()> {
    let uinput_device = "/dev/uinput";

    if !Path::new(uinput_device).exists() {
        // Без uinput нечем пробрасывать пропущенные события и отправлять выход
        return Err(slowquit_error!(
            permission,
            "{} не существует. Загрузите модуль: sudo modprobe uinput",
            uinput_device
        ));
    }

    let metadata = fs::metadata(uinput_device).map_err(|e| {
        slowquit_error!(permission, "Не удалось проверить права доступа к {}: {}", uinput_device, e)
    })?;

    if !mode_allows_access(metadata.permissions().mode()) {
        return Err(slowquit_error!(
            permission,
            "Нет прав доступа к {}. Добавьте пользователя в группу 'uinput' или 'input'",
            uinput_device
        ));
    }

    info!("Доступ к {} подтвержден", uinput_device);
    Ok(())
}

/// Доступ для группы или остальных (обычно 660 или 666)
fn mode_allows_access(mode: u32) -> bool {
    mode & 0o006 != 0 || mode & 0o060 != 0
}

fn check_not_root() {
    match std::env::var("USER") {
        Ok(user) if user == "root" => {
            warn!("⚠️  SlowQuit запущен от имени root!");
            warn!("   Рекомендуется добавить пользователя в группы 'input' и 'uinput':");
            warn!("   sudo usermod -a -G input,uinput $USER");
            warn!("   sudo modprobe uinput");
            warn!("   (затем перезайдите в систему)");
        }
        Ok(user) => info!("SlowQuit запущен от имени пользователя: {}", user),
        Err(_) => warn!("Не удалось определить пользователя"),
    }
}
