use crate::events::ProcessRef;
use crate::error::{SlowQuitError, Result};
use tracing::debug;

use super::run_tool;

pub struct KdotoolDetector;

impl KdotoolDetector {
    pub fn new() -> Self {
        Self
    }

    pub async fn test(&self) -> Result<()> {
        debug!("=== Тестируем kdotool ===");

        let window_id = run_tool("kdotool", &["getactivewindow"])?;
        debug!("kdotool получил window_id: '{}'", window_id);

        run_tool("kdotool", &["getwindowname", &window_id])?;

        debug!("=== kdotool работает ===");
        Ok(())
    }

    pub async fn get_active_window(&self) -> Result<ProcessRef> {
        // Получаем ID окна
        let window_id = run_tool("kdotool", &["getactivewindow"])?;
        if window_id.is_empty() {
            return Err(SlowQuitError::Internal("kdotool не вернул активное окно".to_string()));
        }

        // Получаем название окна по ID
        let title = run_tool("kdotool", &["getwindowname", &window_id])?;

        let mut app = ProcessRef::new(title).with_window_id(window_id.clone());

        if let Ok(class) = run_tool("kdotool", &["getwindowclassname", &window_id]) {
            app = app.with_app_id(class);
        }

        if let Some(pid) = run_tool("kdotool", &["getwindowpid", &window_id])
            .ok()
            .and_then(|pid| pid.parse::<u32>().ok())
        {
            app = app.with_pid(pid);
        }

        Ok(app)
    }

    pub fn activate(&self, target: &ProcessRef) -> Result<()> {
        let window_id = target
            .window_id
            .as_deref()
            .ok_or_else(|| SlowQuitError::Internal(format!("У {} нет window_id", target)))?;
        run_tool("kdotool", &["windowactivate", window_id])?;
        Ok(())
    }
}
