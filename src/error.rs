use thiserror::Error;

#[derive(Error, Debug)]
pub enum SlowQuitError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ошибка uinput: {0}")]
    Uinput(#[from] uinput::Error),

    #[error("Ошибка D-Bus: {0}")]
    DBus(#[from] zbus::Error),

    #[error("Устройство не найдено: {0}")]
    DeviceNotFound(String),

    #[error("Недостаточно прав доступа: {0}")]
    Permission(String),

    /// Перехват ввода не создан или отозван системой
    #[error("Перехват ввода недоступен: {0}")]
    HookUnavailable(String),

    /// Целевое приложение завершилось до срабатывания таймера
    #[error("Целевое приложение завершилось: {0}")]
    TargetGone(String),

    #[error("Не удалось синтезировать событие выхода: {0}")]
    SynthesisFailure(String),

    #[error("Сервис недоступен: {0}")]
    ServiceUnavailable(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl SlowQuitError {
    pub fn device_not_found<T>(msg: impl Into<String>) -> Result<T> {
        Err(SlowQuitError::DeviceNotFound(msg.into()))
    }
}

pub type Result<T> = std::result::Result<T, SlowQuitError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! slowquit_error {
    (device_not_found, $($arg:tt)*) => {
        $crate::error::SlowQuitError::DeviceNotFound(format!($($arg)*))
    };
    (permission, $($arg:tt)*) => {
        $crate::error::SlowQuitError::Permission(format!($($arg)*))
    };
    (hook_unavailable, $($arg:tt)*) => {
        $crate::error::SlowQuitError::HookUnavailable(format!($($arg)*))
    };
    (synthesis, $($arg:tt)*) => {
        $crate::error::SlowQuitError::SynthesisFailure(format!($($arg)*))
    };
    (service_unavailable, $($arg:tt)*) => {
        $crate::error::SlowQuitError::ServiceUnavailable(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::SlowQuitError::Internal(format!($($arg)*))
    };
}
