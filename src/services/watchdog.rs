use crate::error::SlowQuitError;
use crate::services::input_hook::{EventHandler, InputHook};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Сколько неудачных проверок подряд нужно для восстановления
pub const FAILURE_THRESHOLD: u32 = 2;
pub const RESTART_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Healthy,
    /// Сбой пока считается случайным, число сбоев подряд
    Failing(u32),
    Recovered,
    RecoveryFailed,
}

#[derive(Debug, Default)]
struct WatchdogState {
    consecutive_failures: u32,
    last_check_time: Option<Instant>,
}

/// Запрос внеочередной проверки, можно раздавать другим сервисам
#[derive(Clone)]
pub struct ProbeHandle {
    wake: Arc<Notify>,
}

impl ProbeHandle {
    pub fn probe_now(&self) {
        self.wake.notify_one();
    }
}

/// Периодически проверяет, что перехват жив, и перезапускает его после
/// подтверждённого сбоя
pub struct Watchdog {
    hook: Arc<dyn InputHook>,
    handler: Arc<dyn EventHandler>,
    period: Duration,
    state: Mutex<WatchdogState>,
    wake: Arc<Notify>,
}

impl Watchdog {
    pub fn new(hook: Arc<dyn InputHook>, handler: Arc<dyn EventHandler>, period: Duration) -> Self {
        Self {
            hook,
            handler,
            period,
            state: Mutex::new(WatchdogState::default()),
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn probe_handle(&self) -> ProbeHandle {
        ProbeHandle {
            wake: Arc::clone(&self.wake),
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().consecutive_failures
    }

    pub fn last_check_time(&self) -> Option<Instant> {
        self.state.lock().last_check_time
    }

    pub async fn run(self: Arc<Self>) {
        info!("Watchdog запущен, интервал {:?}", self.period);
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.wake.notified() => info!("Внеочередная проверка перехвата"),
            }
            self.probe().await;
        }
    }

    fn is_alive(&self) -> bool {
        self.hook.is_started() && self.hook.is_enabled() && self.handler.is_healthy()
    }

    pub async fn probe(&self) -> ProbeOutcome {
        let alive = self.is_alive();

        let failures = {
            let mut state = self.state.lock();
            state.last_check_time = Some(Instant::now());
            if alive {
                if state.consecutive_failures > 0 {
                    info!("Перехват снова работает");
                }
                state.consecutive_failures = 0;
                debug!("Перехват работает");
                return ProbeOutcome::Healthy;
            }
            state.consecutive_failures += 1;
            state.consecutive_failures
        };

        if failures < FAILURE_THRESHOLD {
            warn!("Перехват не отвечает ({} из {})", failures, FAILURE_THRESHOLD);
            return ProbeOutcome::Failing(failures);
        }

        warn!("Перехват не отвечает {} проверки подряд, перезапускаем", failures);
        let recovered = self.recover().await;
        self.state.lock().consecutive_failures = 0;

        if recovered {
            info!("Перехват восстановлен");
            ProbeOutcome::Recovered
        } else {
            error!("Перехват не восстановлен, повторим на следующей проверке");
            ProbeOutcome::RecoveryFailed
        }
    }

    async fn recover(&self) -> bool {
        self.handler.reset();
        self.hook.stop();
        tokio::time::sleep(RESTART_DELAY).await;

        if let Err(e) = self.hook.start(Arc::clone(&self.handler)) {
            let e = match e {
                e @ SlowQuitError::HookUnavailable(_) => e,
                other => SlowQuitError::HookUnavailable(other.to_string()),
            };
            error!("{}", e);
            return false;
        }

        self.is_alive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::events::{RawEvent, Verdict};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeHook {
        started: AtomicBool,
        enabled: AtomicBool,
        starts: AtomicUsize,
        stops: AtomicUsize,
        checks: AtomicUsize,
    }

    impl FakeHook {
        fn running() -> Arc<Self> {
            let hook = Self::default();
            hook.started.store(true, Ordering::SeqCst);
            hook.enabled.store(true, Ordering::SeqCst);
            Arc::new(hook)
        }

        fn revoke(&self) {
            self.enabled.store(false, Ordering::SeqCst);
        }
    }

    impl InputHook for FakeHook {
        fn start(&self, _handler: Arc<dyn EventHandler>) -> Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.started.store(true, Ordering::SeqCst);
            self.enabled.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.started.store(false, Ordering::SeqCst);
            self.enabled.store(false, Ordering::SeqCst);
        }

        fn is_started(&self) -> bool {
            self.started.load(Ordering::SeqCst)
        }

        fn is_enabled(&self) -> bool {
            self.checks.fetch_add(1, Ordering::SeqCst);
            self.enabled.load(Ordering::SeqCst)
        }
    }

    struct PassAll;

    impl EventHandler for PassAll {
        fn handle(&self, _event: RawEvent) -> Verdict {
            Verdict::Pass
        }
    }

    fn watchdog(hook: &Arc<FakeHook>) -> Arc<Watchdog> {
        Arc::new(Watchdog::new(hook.clone(), Arc::new(PassAll), Duration::from_secs(30)))
    }

    #[tokio::test(start_paused = true)]
    async fn two_failures_restart_once() {
        let hook = FakeHook::running();
        let watchdog = watchdog(&hook);
        hook.revoke();

        assert_eq!(watchdog.probe().await, ProbeOutcome::Failing(1));
        assert_eq!(hook.starts.load(Ordering::SeqCst), 0);

        assert_eq!(watchdog.probe().await, ProbeOutcome::Recovered);
        assert_eq!(hook.stops.load(Ordering::SeqCst), 1);
        assert_eq!(hook.starts.load(Ordering::SeqCst), 1);
        assert_eq!(watchdog.consecutive_failures(), 0);

        assert_eq!(watchdog.probe().await, ProbeOutcome::Healthy);
        assert_eq!(hook.starts.load(Ordering::SeqCst), 1);
        assert!(watchdog.last_check_time().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_absorbed() {
        let hook = FakeHook::running();
        let watchdog = watchdog(&hook);

        hook.revoke();
        assert_eq!(watchdog.probe().await, ProbeOutcome::Failing(1));

        hook.enabled.store(true, Ordering::SeqCst);
        assert_eq!(watchdog.probe().await, ProbeOutcome::Healthy);
        assert_eq!(watchdog.consecutive_failures(), 0);

        hook.revoke();
        assert_eq!(watchdog.probe().await, ProbeOutcome::Failing(1));
        assert_eq!(hook.starts.load(Ordering::SeqCst), 0);
        assert_eq!(hook.stops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_now_wakes_the_loop() {
        let hook = FakeHook::running();
        let watchdog = watchdog(&hook);
        let handle = watchdog.probe_handle();

        let task = tokio::spawn(Arc::clone(&watchdog).run());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(hook.checks.load(Ordering::SeqCst), 1);

        handle.probe_now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(hook.checks.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(hook.checks.load(Ordering::SeqCst), 3);

        task.abort();
    }
}
