use std::time::Duration;
use tokio::sync::watch;

pub const MIN_DELAY: Duration = Duration::from_millis(500);
pub const MAX_DELAY: Duration = Duration::from_millis(3000);
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1000);

/// Источник текущего времени удержания
pub trait DelayConfigProvider: Send + Sync {
    /// Текущее значение, всегда в пределах [MIN_DELAY, MAX_DELAY]
    fn current_delay(&self) -> Duration;

    /// Подписка на изменения значения
    fn subscribe(&self) -> watch::Receiver<Duration>;
}

/// Время удержания, общее для ядра и перезагрузки конфигурации
pub struct DelaySettings {
    tx: watch::Sender<Duration>,
}

impl DelaySettings {
    pub fn new(delay: Duration) -> Self {
        let (tx, _rx) = watch::channel(Self::clamp(delay));
        Self { tx }
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        Self::new(Self::duration_from_secs(secs))
    }

    /// Ноль (первый запуск) означает значение по умолчанию, остальное зажимается в диапазон
    pub fn clamp(delay: Duration) -> Duration {
        if delay.is_zero() {
            return DEFAULT_DELAY;
        }
        delay.clamp(MIN_DELAY, MAX_DELAY)
    }

    pub fn duration_from_secs(secs: f64) -> Duration {
        if !secs.is_finite() || secs <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(secs.min(MAX_DELAY.as_secs_f64() * 2.0))
        }
    }

    /// Подписчики уведомляются только при реальном изменении
    pub fn set_delay(&self, delay: Duration) {
        let clamped = Self::clamp(delay);
        self.tx.send_if_modified(|current| {
            if *current == clamped {
                false
            } else {
                *current = clamped;
                true
            }
        });
    }

    pub fn reset_to_default(&self) {
        self.set_delay(DEFAULT_DELAY);
    }
}

impl DelayConfigProvider for DelaySettings {
    fn current_delay(&self) -> Duration {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<Duration> {
        self.tx.subscribe()
    }
}

/// Вызывает `on_change` на каждое новое значение, пока жив источник
pub async fn follow_delay(mut rx: watch::Receiver<Duration>, mut on_change: impl FnMut(Duration)) {
    while rx.changed().await.is_ok() {
        let delay = *rx.borrow_and_update();
        on_change(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_is_clamped() {
        let settings = DelaySettings::new(Duration::from_millis(100));
        assert_eq!(settings.current_delay(), MIN_DELAY);

        settings.set_delay(Duration::from_secs(10));
        assert_eq!(settings.current_delay(), MAX_DELAY);

        settings.set_delay(Duration::from_millis(1500));
        assert_eq!(settings.current_delay(), Duration::from_millis(1500));
    }

    #[test]
    fn test_zero_means_default() {
        let settings = DelaySettings::from_secs_f64(0.0);
        assert_eq!(settings.current_delay(), DEFAULT_DELAY);

        let settings = DelaySettings::from_secs_f64(f64::NAN);
        assert_eq!(settings.current_delay(), DEFAULT_DELAY);
    }

    #[tokio::test]
    async fn test_change_notification() {
        let settings = DelaySettings::new(DEFAULT_DELAY);
        let mut rx = settings.subscribe();

        settings.set_delay(Duration::from_secs(2));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Duration::from_secs(2));

        // Повторная установка того же значения не уведомляет
        settings.set_delay(Duration::from_secs(2));
        assert!(!rx.has_changed().unwrap());

        settings.reset_to_default();
        assert!(rx.has_changed().unwrap());
        assert_eq!(settings.current_delay(), DEFAULT_DELAY);
    }

    #[tokio::test]
    async fn test_follow_delay_sees_only_real_changes() {
        let settings = DelaySettings::new(DEFAULT_DELAY);
        let (seen_tx, mut seen) = tokio::sync::mpsc::unbounded_channel();
        let follower = tokio::spawn(follow_delay(settings.subscribe(), move |delay| {
            let _ = seen_tx.send(delay);
        }));

        settings.set_delay(Duration::from_secs(2));
        assert_eq!(seen.recv().await, Some(Duration::from_secs(2)));

        settings.set_delay(Duration::from_secs(2));
        settings.set_delay(Duration::from_secs(60));
        assert_eq!(seen.recv().await, Some(MAX_DELAY));

        drop(settings);
        follower.await.unwrap();
        assert_eq!(seen.recv().await, None);
    }
}
