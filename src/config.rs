use crate::events::{ModifierKey, Trigger};
use crate::services::app_policy::{AppEntry, ListMode};
use crate::services::keycode_map::KeycodeMap;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub input: InputConfig,
    pub trigger: TriggerConfig,
    pub quit: QuitConfig,
    pub policy: PolicyConfig,
    pub window: WindowConfig,
    pub watchdog: WatchdogConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputConfig {
    pub device_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TriggerConfig {
    pub key: String,
    pub modifier: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuitConfig {
    /// Время удержания в секундах; 0 означает значение по умолчанию
    pub delay_secs: f64,
    pub activation_settle_ms: u64,
    pub self_echo_window_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolicyConfig {
    pub mode: ListMode,
    #[serde(default)]
    pub allowlist: Vec<AppEntry>,
    #[serde(default)]
    pub denylist: Vec<AppEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowConfig {
    pub detection_mode: String,
    pub polling_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchdogConfig {
    pub interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "compact".to_string(),
            },
            input: InputConfig {
                device_path: "auto".to_string(),
            },
            trigger: TriggerConfig {
                key: "q".to_string(),
                modifier: "ctrl".to_string(),
            },
            quit: QuitConfig {
                delay_secs: 1.0,
                activation_settle_ms: 50,
                self_echo_window_ms: 100,
            },
            policy: PolicyConfig {
                mode: ListMode::Global,
                allowlist: Vec::new(),
                denylist: Vec::new(),
            },
            window: WindowConfig {
                detection_mode: "auto".to_string(),
                polling_interval_ms: 250,
            },
            watchdog: WatchdogConfig { interval_secs: 30 },
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        // Отсутствующий файл не ошибка: остаются значения по умолчанию
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("SLOWQUIT_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "compact" | "full" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Валидация триггера
        self.trigger()?;

        // Валидация таймингов выхода
        if !self.quit.delay_secs.is_finite() || self.quit.delay_secs < 0.0 {
            anyhow::bail!("delay_secs должно быть неотрицательным числом");
        }

        if self.quit.self_echo_window_ms == 0 {
            anyhow::bail!("self_echo_window_ms должно быть больше 0");
        }

        // Валидация настроек окон
        match self.window.detection_mode.as_str() {
            "auto" | "kdotool" | "xdotool" | "wmctrl" | "sway" => {}
            _ => anyhow::bail!(
                "Неверный режим детекции окон: {}",
                self.window.detection_mode
            ),
        }

        if self.window.polling_interval_ms < 100 {
            anyhow::bail!("polling_interval_ms должно быть минимум 100");
        }

        if self.watchdog.interval_secs == 0 {
            anyhow::bail!("watchdog.interval_secs должно быть больше 0");
        }

        // Валидация списков приложений
        for (i, entry) in self
            .policy
            .allowlist
            .iter()
            .chain(self.policy.denylist.iter())
            .enumerate()
        {
            if entry.id.trim().is_empty() {
                anyhow::bail!("Пустой идентификатор приложения в записи #{}", i + 1);
            }
        }

        Ok(())
    }

    /// Разобранное сочетание-триггер
    pub fn trigger(&self) -> Result<Trigger> {
        let key = KeycodeMap::get_keycode(&self.trigger.key)
            .map_err(|e| anyhow::anyhow!("Неверная клавиша триггера: {}", e))?;

        let modifier = ModifierKey::from_name(&self.trigger.modifier).ok_or_else(|| {
            anyhow::anyhow!("Неверный модификатор триггера: {}", self.trigger.modifier)
        })?;

        if modifier == ModifierKey::Shift {
            anyhow::bail!("shift не может быть модификатором триггера");
        }

        Ok(Trigger::new(key, modifier))
    }

    pub fn activation_settle(&self) -> Duration {
        Duration::from_millis(self.quit.activation_settle_ms)
    }

    pub fn self_echo_window(&self) -> Duration {
        Duration::from_millis(self.quit.self_echo_window_ms)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.window.polling_interval_ms)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog.interval_secs)
    }
}
