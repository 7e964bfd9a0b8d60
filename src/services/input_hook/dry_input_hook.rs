use crate::error::Result;
use crate::events::{Modifiers, RawEvent, Trigger, Verdict};
use crate::services::settings::DelayConfigProvider;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::info;

use super::evdev_hook::join_with_timeout;
use super::r#trait::{EventHandler, InputHook};

const SCENARIO_PAUSE: Duration = Duration::from_secs(15);
const EARLY_RELEASE: Duration = Duration::from_millis(300);
const STEP: Duration = Duration::from_millis(50);

/// Эмуляция перехвата: попеременно разыгрывает долгое удержание триггера
/// и слишком раннее отпускание
pub struct DryRunInputHook {
    trigger: Trigger,
    delay: Arc<dyn DelayConfigProvider>,
    worker: Mutex<Option<(Arc<AtomicBool>, JoinHandle<()>)>>,
}

impl DryRunInputHook {
    pub fn new(trigger: Trigger, delay: Arc<dyn DelayConfigProvider>) -> Self {
        Self {
            trigger,
            delay,
            worker: Mutex::new(None),
        }
    }

    fn run(
        trigger: Trigger,
        delay: Arc<dyn DelayConfigProvider>,
        handler: Arc<dyn EventHandler>,
        running: Arc<AtomicBool>,
    ) {
        info!("Dry-run режим - перехват ввода работает в режиме эмуляции");
        let held = Modifiers::new().with(trigger.modifier, true);
        let mut long_hold = true;

        while Self::pause(&running, SCENARIO_PAUSE) {
            let hold = if long_hold {
                delay.current_delay() + Duration::from_millis(200)
            } else {
                EARLY_RELEASE
            };
            info!(
                "Dry-run: эмулируем удержание {} в течение {:?}",
                trigger, hold
            );

            Self::feed(&handler, RawEvent::ModifiersChanged(held));
            Self::feed(&handler, RawEvent::KeyDown { key: trigger.key, modifiers: held });
            let completed = Self::pause(&running, hold);
            Self::feed(&handler, RawEvent::KeyUp { key: trigger.key, modifiers: held });
            Self::feed(&handler, RawEvent::ModifiersChanged(Modifiers::new()));

            if !completed {
                break;
            }
            long_hold = !long_hold;
        }

        info!("Dry-run: эмуляция перехвата остановлена");
    }

    fn feed(handler: &Arc<dyn EventHandler>, event: RawEvent) {
        let verdict = handler.handle(event);
        info!("Dry-run: {} -> {:?}", event, verdict);
        if verdict == Verdict::Pass {
            info!("Dry-run: событие было бы передано в систему");
        }
    }

    /// Ждёт `total`, прерываясь при остановке. `false` если остановлен.
    fn pause(running: &AtomicBool, total: Duration) -> bool {
        let mut waited = Duration::ZERO;
        while waited < total {
            if !running.load(Ordering::SeqCst) {
                return false;
            }
            std::thread::sleep(STEP);
            waited += STEP;
        }
        running.load(Ordering::SeqCst)
    }
}

impl InputHook for DryRunInputHook {
    fn start(&self, handler: Arc<dyn EventHandler>) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        // Свой флаг на каждый запуск: старый поток может ещё досыпать шаг
        let running = Arc::new(AtomicBool::new(true));
        let thread = {
            let trigger = self.trigger;
            let delay = Arc::clone(&self.delay);
            let running = Arc::clone(&running);
            std::thread::Builder::new()
                .name("slowquit-dry-hook".to_string())
                .spawn(move || Self::run(trigger, delay, handler, running))?
        };
        *worker = Some((running, thread));
        Ok(())
    }

    fn stop(&self) {
        let Some((running, thread)) = self.worker.lock().take() else {
            return;
        };
        running.store(false, Ordering::SeqCst);
        if !join_with_timeout(thread, STEP * 4) {
            info!("Dry-run: поток эмуляции ещё завершается");
        }
    }

    fn is_started(&self) -> bool {
        self.worker.lock().is_some()
    }

    fn is_enabled(&self) -> bool {
        match self.worker.lock().as_ref() {
            Some((running, thread)) => running.load(Ordering::SeqCst) && !thread.is_finished(),
            None => false,
        }
    }
}
