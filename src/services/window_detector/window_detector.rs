use crate::config::Config;
use crate::error::{SlowQuitError, Result};
use crate::events::ProcessRef;
use crate::services::app_context::AppContext;
use std::sync::Arc;
use tracing::{debug, info, warn, error};
use tokio::time::{interval, Duration, MissedTickBehavior};
use std::process::Command;

use super::kdotool::KdotoolDetector;
use super::xdotool::XdotoolDetector;
use super::wmctrl::WmctrlDetector;
use super::sway::SwayDetector;
use super::r#trait::FocusTrackerTrait;

#[derive(Debug, Clone)]
enum DesktopEnvironment {
    KDE,
    GNOME,
    Sway,
    X11Generic,
    WaylandGeneric,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkingMethod {
    Kdotool,
    Xdotool,
    Wmctrl,
    Sway,
}

impl WorkingMethod {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "kdotool" => Some(WorkingMethod::Kdotool),
            "xdotool" => Some(WorkingMethod::Xdotool),
            "wmctrl" => Some(WorkingMethod::Wmctrl),
            "sway" => Some(WorkingMethod::Sway),
            _ => None,
        }
    }
}

pub struct RealFocusTracker {
    config: Arc<Config>,
    app_context: Arc<dyn AppContext>,
    desktop_env: DesktopEnvironment,
    working_method: Option<WorkingMethod>,

    // Детекторы утилит
    kdotool: KdotoolDetector,
    xdotool: XdotoolDetector,
    wmctrl: WmctrlDetector,
    sway: SwayDetector,
}

impl RealFocusTracker {
    pub fn new(config: Arc<Config>, app_context: Arc<dyn AppContext>) -> Result<Self> {
        info!("Инициализация RealFocusTracker");

        let desktop_env = Self::detect_desktop_environment();
        info!("Обнаружена среда рабочего стола: {:?}", desktop_env);

        let working_method = WorkingMethod::from_name(&config.window.detection_mode);

        Ok(Self {
            config,
            app_context,
            desktop_env,
            working_method,
            kdotool: KdotoolDetector::new(),
            xdotool: XdotoolDetector::new(),
            wmctrl: WmctrlDetector::new(),
            sway: SwayDetector::new(),
        })
    }

    fn detect_desktop_environment() -> DesktopEnvironment {
        if std::env::var("SWAYSOCK").is_ok() {
            return DesktopEnvironment::Sway;
        }

        if let Ok(desktop) = std::env::var("XDG_CURRENT_DESKTOP") {
            match desktop.to_lowercase().as_str() {
                d if d.contains("kde") => return DesktopEnvironment::KDE,
                d if d.contains("gnome") => return DesktopEnvironment::GNOME,
                _ => {}
            }
        }

        if let Ok(session) = std::env::var("XDG_SESSION_TYPE") {
            match session.as_str() {
                "wayland" => return DesktopEnvironment::WaylandGeneric,
                "x11" => return DesktopEnvironment::X11Generic,
                _ => {}
            }
        }

        if let Ok(output) = Command::new("pgrep").arg("-f").arg("kwin").output() {
            if !output.stdout.is_empty() {
                return DesktopEnvironment::KDE;
            }
        }

        DesktopEnvironment::Unknown
    }

    /// Порядок проверки утилит зависит от среды
    fn candidate_methods(&self) -> &'static [WorkingMethod] {
        match self.desktop_env {
            DesktopEnvironment::KDE => &[WorkingMethod::Kdotool, WorkingMethod::Xdotool, WorkingMethod::Wmctrl],
            DesktopEnvironment::Sway => &[WorkingMethod::Sway],
            DesktopEnvironment::GNOME | DesktopEnvironment::X11Generic => {
                &[WorkingMethod::Xdotool, WorkingMethod::Wmctrl]
            }
            DesktopEnvironment::WaylandGeneric | DesktopEnvironment::Unknown => &[
                WorkingMethod::Kdotool,
                WorkingMethod::Xdotool,
                WorkingMethod::Wmctrl,
                WorkingMethod::Sway,
            ],
        }
    }

    async fn detect_working_method(&self) -> Result<WorkingMethod> {
        info!("Определяем рабочий метод детекции окон...");

        for &method in self.candidate_methods() {
            let result = match method {
                WorkingMethod::Kdotool => self.kdotool.test().await,
                WorkingMethod::Xdotool => self.xdotool.test().await,
                WorkingMethod::Wmctrl => self.wmctrl.test().await,
                WorkingMethod::Sway => self.sway.test().await,
            };

            match result {
                Ok(()) => {
                    info!("Используем {:?}", method);
                    return Ok(method);
                }
                Err(e) => debug!("{:?} не работает: {}", method, e),
            }
        }

        Err(SlowQuitError::ServiceUnavailable("Ни один метод детекции окон не работает".to_string()))
    }

    async fn run_impl(mut self) -> Result<()> {
        info!("RealFocusTracker запущен для среды: {:?}", self.desktop_env);

        let mut interval = interval(self.config.polling_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let method = match self.working_method {
                Some(method) => method,
                None => match self.detect_working_method().await {
                    Ok(method) => {
                        self.working_method = Some(method);
                        method
                    }
                    Err(_) => {
                        error!("Ни один метод не работает. Приостанавливаем детекцию на 10 секунд");
                        // Без данных о фокусе жест не применяется ни к чему
                        self.app_context.update(None);
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        continue;
                    }
                },
            };

            match self.get_window_by_method(method).await {
                Ok(app) => self.publish(app),
                Err(e) => {
                    warn!("Рабочий метод {:?} перестал работать: {}. Переопределяем...", method, e);
                    self.working_method = None;
                }
            }
        }
    }

    async fn get_window_by_method(&self, method: WorkingMethod) -> Result<ProcessRef> {
        match method {
            WorkingMethod::Kdotool => self.kdotool.get_active_window().await,
            WorkingMethod::Xdotool => self.xdotool.get_active_window().await,
            WorkingMethod::Wmctrl => self.wmctrl.get_active_window().await,
            WorkingMethod::Sway => self.sway.get_active_window().await,
        }
    }

    fn publish(&self, app: ProcessRef) {
        let changed = match self.app_context.frontmost() {
            Some(current) => !current.same_window(&app),
            None => true,
        };

        if changed {
            debug!("Смена активного приложения на: {}", app);
            self.app_context.update(Some(app));
        }
    }
}

impl Drop for RealFocusTracker {
    fn drop(&mut self) {
        info!("RealFocusTracker завершает работу");
    }
}

#[async_trait::async_trait]
impl FocusTrackerTrait for RealFocusTracker {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
