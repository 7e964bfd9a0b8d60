//! FocusTracker service: responsibility and boundaries
//!
//! This module and its submodules are responsible ONLY for finding the application
//! that owns the active window (title/class/pid/window id depending on the tool),
//! publishing it into AppContext, and bringing a given window back to the front.
//! It MUST NOT contain any gesture or gating logic. All hold-to-quit decisions are
//! made exclusively by the gesture state machine.

mod dry_window_detector;
mod kdotool;
mod xdotool;
mod wmctrl;
mod sway;
mod window_detector;
mod r#trait;

pub use self::r#trait::{FocusTrackerTrait, create_focus_tracker};

use crate::error::{Result, SlowQuitError};
use crate::events::ProcessRef;
use std::collections::HashMap;
use std::process::Command;
use tracing::debug;

use self::kdotool::KdotoolDetector;
use self::sway::SwayDetector;
use self::wmctrl::WmctrlDetector;
use self::xdotool::XdotoolDetector;

/// Переменные окружения пользовательской сессии, если сервис запущен через sudo
fn build_env_overrides() -> HashMap<String, String> {
    let mut env_vars = HashMap::new();

    if std::env::var("USER").unwrap_or_default() == "root" {
        if let Ok(sudo_user) = std::env::var("SUDO_USER") {
            if let Ok(output) = Command::new("id").args(["-u", &sudo_user]).output() {
                if let Ok(uid_str) = String::from_utf8(output.stdout) {
                    let uid = uid_str.trim();
                    let user_runtime_dir = format!("/run/user/{}", uid);
                    let dbus_address = format!("unix:path={}/bus", user_runtime_dir);

                    debug!("Подставляем переменные окружения для пользователя {}: uid={}", sudo_user, uid);
                    env_vars.insert("DBUS_SESSION_BUS_ADDRESS".to_string(), dbus_address);
                    env_vars.insert("XDG_RUNTIME_DIR".to_string(), user_runtime_dir);
                    env_vars.insert("USER".to_string(), sudo_user);
                }
            }
        }
    }

    if let Ok(display_var) = std::env::var("DISPLAY") {
        env_vars.insert("DISPLAY".to_string(), display_var);
    }

    env_vars
}

/// Команда утилиты окон; под sudo выполняется от имени пользователя сессии
fn tool_command(program: &str, args: &[&str]) -> Command {
    let mut cmd = match std::env::var("SUDO_USER") {
        Ok(sudo_user) => {
            let mut cmd = Command::new("sudo");
            cmd.args(["-E", "-u", &sudo_user, program]);
            cmd.args(args);
            cmd
        }
        Err(_) => {
            let mut cmd = Command::new(program);
            cmd.args(args);
            cmd
        }
    };

    for (key, value) in build_env_overrides() {
        cmd.env(key, value);
    }

    cmd
}

/// Запустить утилиту и вернуть обрезанный stdout
fn run_tool(program: &str, args: &[&str]) -> Result<String> {
    let output = tool_command(program, args)
        .output()
        .map_err(|e| SlowQuitError::ServiceUnavailable(format!("{} не найден: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SlowQuitError::Internal(format!(
            "{} {} вернул ошибку: {}",
            program,
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Вывести окно цели на передний план первой сработавшей утилитой
pub fn activate_window(target: &ProcessRef) -> Result<()> {
    let mut last_error = None;

    if std::env::var("SWAYSOCK").is_ok() {
        match SwayDetector::new().activate(target) {
            Ok(()) => return Ok(()),
            Err(e) => last_error = Some(e),
        }
    }

    let attempts: [fn(&ProcessRef) -> Result<()>; 3] = [
        |t| KdotoolDetector::new().activate(t),
        |t| XdotoolDetector::new().activate(t),
        |t| WmctrlDetector::new().activate(t),
    ];

    for attempt in attempts {
        match attempt(target) {
            Ok(()) => return Ok(()),
            Err(e) => {
                debug!("Активация {} не удалась: {}", target, e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        SlowQuitError::ServiceUnavailable("Нет утилиты для активации окна".to_string())
    }))
}
