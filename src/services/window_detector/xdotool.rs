use crate::events::ProcessRef;
use crate::error::{SlowQuitError, Result};
use tracing::debug;

use super::run_tool;

pub struct XdotoolDetector;

impl XdotoolDetector {
    pub fn new() -> Self {
        Self
    }

    pub async fn test(&self) -> Result<()> {
        run_tool("xdotool", &["getactivewindow", "getwindowname"]).map(|_| ())
    }

    pub async fn get_active_window(&self) -> Result<ProcessRef> {
        debug!("Попытка получить активное окно через xdotool");
        let window_id = run_tool("xdotool", &["getactivewindow"])?;

        let title = run_tool("xdotool", &["getwindowname", &window_id])?;
        debug!("xdotool получил заголовок окна: '{}'", title);

        let mut app = ProcessRef::new(title).with_window_id(window_id.clone());

        match run_tool("xdotool", &["getwindowclassname", &window_id]) {
            Ok(class) => {
                debug!("xdotool получил класс окна: '{}'", class);
                app = app.with_app_id(class);
            }
            Err(e) => debug!("Не удалось получить класс окна: {}", e),
        }

        if let Some(pid) = run_tool("xdotool", &["getwindowpid", &window_id])
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
        run_tool("xdotool", &["windowactivate", "--sync", window_id])?;
        Ok(())
    }
}
