use serde::{Deserialize, Serialize};
use std::fmt;

/// Снимок приложения, владеющего активным окном.
///
/// `app_id` это класс окна (X11) или app_id (Wayland), по нему работают
/// списки приложений. `pid` и `window_id` могут отсутствовать, если утилита
/// детекции их не сообщает.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessRef {
    pub name: String,
    pub app_id: Option<String>,
    pub pid: Option<u32>,
    pub window_id: Option<String>,
}

impl ProcessRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            app_id: None,
            pid: None,
            window_id: None,
        }
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        let app_id = app_id.into();
        self.app_id = if app_id.trim().is_empty() {
            None
        } else {
            Some(app_id)
        };
        self
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_window_id(mut self, window_id: impl Into<String>) -> Self {
        self.window_id = Some(window_id.into());
        self
    }

    /// Имя для оверлея: заголовок окна, а если он пустой, то идентификатор
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else {
            self.app_id.as_deref().unwrap_or("Неизвестное приложение")
        }
    }

    /// Одно и то же окно с точки зрения трекера фокуса
    pub fn same_window(&self, other: &ProcessRef) -> bool {
        self.name == other.name
            && self.app_id == other.app_id
            && self.pid == other.pid
            && self.window_id == other.window_id
    }
}

impl fmt::Display for ProcessRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.name)?;
        if let Some(app_id) = &self.app_id {
            write!(f, " ({})", app_id)?;
        }
        if let Some(pid) = self.pid {
            write!(f, " pid={}", pid)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_ref_creation() {
        let app = ProcessRef::new("Test Window")
            .with_app_id("TestApp")
            .with_pid(1234)
            .with_window_id("0x1c00007");

        assert_eq!(app.name, "Test Window");
        assert_eq!(app.app_id.as_deref(), Some("TestApp"));
        assert_eq!(app.pid, Some(1234));
        assert_eq!(app.to_string(), "\"Test Window\" (TestApp) pid=1234");
    }

    #[test]
    fn test_blank_app_id_is_absent() {
        let app = ProcessRef::new("").with_app_id("  ");
        assert_eq!(app.app_id, None);
        assert_eq!(app.display_name(), "Неизвестное приложение");

        let named = ProcessRef::new("").with_app_id("firefox");
        assert_eq!(named.display_name(), "firefox");
    }
}
