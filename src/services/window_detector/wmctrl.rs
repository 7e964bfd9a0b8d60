use crate::events::ProcessRef;
use crate::error::{SlowQuitError, Result};

use super::run_tool;

pub struct WmctrlDetector;

impl WmctrlDetector {
    pub fn new() -> Self {
        Self
    }

    pub async fn test(&self) -> Result<()> {
        run_tool("wmctrl", &["-l"]).map(|_| ())
    }

    pub async fn get_active_window(&self) -> Result<ProcessRef> {
        // wmctrl не знает активное окно, его id берём у X-сервера
        let active = run_tool("xprop", &["-root", "_NET_ACTIVE_WINDOW"])?;
        let active_id = parse_active_window_id(&active)
            .ok_or_else(|| SlowQuitError::Internal("Активное окно не найдено".to_string()))?;

        let listing = run_tool("wmctrl", &["-lpx"])?;
        parse_window_line(&listing, active_id)
            .ok_or_else(|| SlowQuitError::Internal("Активное окно не найдено".to_string()))
    }

    pub fn activate(&self, target: &ProcessRef) -> Result<()> {
        let window_id = target
            .window_id
            .as_deref()
            .ok_or_else(|| SlowQuitError::Internal(format!("У {} нет window_id", target)))?;
        run_tool("wmctrl", &["-i", "-a", window_id])?;
        Ok(())
    }
}

/// `_NET_ACTIVE_WINDOW(WINDOW): window id # 0x3a00003`
fn parse_active_window_id(xprop: &str) -> Option<u64> {
    let hex = xprop.rsplit('#').next()?.trim().split(',').next()?.trim();
    parse_hex(hex).filter(|&id| id != 0)
}

fn parse_hex(value: &str) -> Option<u64> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16).ok()
}

/// Строка `wmctrl -lpx`: id, рабочий стол, pid, WM_CLASS, хост, заголовок
fn parse_window_line(listing: &str, window_id: u64) -> Option<ProcessRef> {
    listing.lines().find_map(|line| {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 5 || parse_hex(parts[0]) != Some(window_id) {
            return None;
        }

        let title = if parts.len() > 5 { parts[5..].join(" ") } else { String::new() };
        // WM_CLASS вида instance.Class, для списков берём класс
        let class = parts[3].rsplit('.').next().unwrap_or(parts[3]);

        let mut app = ProcessRef::new(title)
            .with_app_id(class)
            .with_window_id(parts[0]);
        if let Ok(pid) = parts[2].parse::<u32>() {
            if pid != 0 {
                app = app.with_pid(pid);
            }
        }
        Some(app)
    })
}
