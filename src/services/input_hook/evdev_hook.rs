use crate::config::Config;
use crate::error::{SlowQuitError, Result};
use crate::events::{KeyCode, KeyState, Verdict, VirtualKeyEvent};
use crate::services::VirtualDevice;
use crate::utils::DeviceFinder;
use crate::{debug_if_enabled, slowquit_error, trace_if_enabled};
use evdev::{Device, EventStream, EventType, InputEvent};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use super::modifier_state::ModifierState;
use super::r#trait::{EventHandler, InputHook};

/// Сколько `stop` ждёт освобождения устройства потоком перехвата
const STOP_TIMEOUT: Duration = Duration::from_secs(1);
const STOP_POLL: Duration = Duration::from_millis(10);

/// Ждёт завершения потока не дольше `timeout`. `false` если поток ещё жив.
pub(super) fn join_with_timeout(thread: JoinHandle<()>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !thread.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(STOP_POLL);
    }

    if thread.join().is_err() {
        warn!("Поток перехвата завершился паникой");
    }
    true
}

/// Запущенный поток перехвата
struct HookWorker {
    device_path: PathBuf,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    thread: JoinHandle<()>,
}

/// Перехват клавиатуры через эксклюзивный grab evdev устройства.
///
/// События читаются в отдельном потоке со своим однопоточным runtime.
/// Пропущенные обработчиком события повторяются через виртуальное устройство,
/// проглоченные до системы не доходят.
pub struct EvdevInputHook {
    config: Arc<Config>,
    worker: Mutex<Option<HookWorker>>,
}

impl EvdevInputHook {
    pub fn new(config: Arc<Config>) -> Self {
        info!("Инициализация EvdevInputHook");
        Self {
            config,
            worker: Mutex::new(None),
        }
    }

    fn open_grabbed(device_path: &Path) -> Result<Device> {
        let mut device = Device::open(device_path).map_err(|e| {
            slowquit_error!(hook_unavailable, "Не удалось открыть устройство {:?}: {}", device_path, e)
        })?;

        match device.grab() {
            Ok(_) => Self::log_grabbed_device(&device),
            Err(e) => {
                Self::log_grab_error(device_path, &e);
                return Err(slowquit_error!(
                    hook_unavailable,
                    "Не удалось захватить устройство эксклюзивно: {}",
                    e
                ));
            }
        }

        Ok(device)
    }

    fn run_thread(
        device: Device,
        handler: Arc<dyn EventHandler>,
        passthrough: VirtualDevice,
        running: Arc<AtomicBool>,
        shutdown: Arc<Notify>,
    ) {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Не удалось создать runtime потока перехвата: {}", e);
                running.store(false, Ordering::SeqCst);
                return;
            }
        };

        runtime.block_on(async {
            // Регистрация в реакторе возможна только внутри runtime
            match device.into_event_stream() {
                Ok(stream) => Self::pump(stream, handler.as_ref(), &passthrough, &shutdown).await,
                Err(e) => error!("Не удалось создать поток событий: {}", e),
            }
        });

        running.store(false, Ordering::SeqCst);
        info!("Поток перехвата завершён, устройство освобождено");
    }

    async fn pump(
        mut stream: EventStream,
        handler: &dyn EventHandler,
        passthrough: &VirtualDevice,
        shutdown: &Notify,
    ) {
        info!("EvdevInputHook запущен, начинаем чтение событий");
        let mut modifiers = ModifierState::new();

        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                event = stream.next_event() => match event {
                    Ok(event) => Self::dispatch(event, &mut modifiers, handler, passthrough),
                    Err(e) => {
                        // Устройство отключено или отозвано: дальше разбирается watchdog
                        error!("Ошибка чтения событий: {}", e);
                        break;
                    }
                },
            }
        }
    }

    fn dispatch(
        event: InputEvent,
        modifiers: &mut ModifierState,
        handler: &dyn EventHandler,
        passthrough: &VirtualDevice,
    ) {
        trace_if_enabled!("evdev: {:?}", event);
        if event.event_type() != EventType::KEY {
            return;
        }

        let Some(state) = KeyState::from_value(event.value()) else {
            debug!("Неизвестное значение события: {}", event.value());
            return;
        };
        let key = KeyCode::new(event.code());

        let verdict = match modifiers.translate(key, state) {
            Some(raw) => handler.handle(raw),
            None => Verdict::Pass,
        };

        match verdict {
            Verdict::Pass => {
                if let Err(e) = passthrough.send_event(VirtualKeyEvent::new(key, state)) {
                    error!("Не удалось пробросить событие {}: {}", key, e);
                }
            }
            Verdict::Swallow => debug_if_enabled!("Событие {} {:?} проглочено", key, state),
        }
    }

    fn log_grabbed_device(device: &Device) {
        info!("Устройство: {}", device.name().unwrap_or("Unknown"));
        info!("Физический путь: {:?}", device.physical_path());
        info!("Устройство захвачено эксклюзивно");
    }

    fn log_grab_error(device_path: &Path, e: &std::io::Error) {
        warn!(
            "Не удалось захватить устройство {}: {}",
            device_path.display(),
            e
        );
        warn!("Попробуйте:");
        warn!("1. Проверить, что устройство не захвачено другой программой");
        warn!("2. Добавить пользователя в группу input: sudo usermod -a -G input $USER");
        warn!("3. Перезайти в систему после добавления в группу");
    }
}

impl InputHook for EvdevInputHook {
    fn start(&self, handler: Arc<dyn EventHandler>) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        let device_path = DeviceFinder::find_keyboard_device(&self.config.input.device_path)
            .map_err(|e| SlowQuitError::HookUnavailable(e.to_string()))?;
        let device = Self::open_grabbed(&device_path)?;
        let passthrough = VirtualDevice::new("SlowQuit Passthrough", false)
            .map_err(|e| SlowQuitError::HookUnavailable(e.to_string()))?;

        let running = Arc::new(AtomicBool::new(true));
        let shutdown = Arc::new(Notify::new());

        let thread = {
            let running = Arc::clone(&running);
            let shutdown = Arc::clone(&shutdown);
            std::thread::Builder::new()
                .name("slowquit-hook".to_string())
                .spawn(move || Self::run_thread(device, handler, passthrough, running, shutdown))?
        };

        *worker = Some(HookWorker {
            device_path,
            running,
            shutdown,
            thread,
        });

        info!("Перехват ввода запущен");
        Ok(())
    }

    fn stop(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        worker.running.store(false, Ordering::SeqCst);
        // Разрешение сохраняется, даже если поток ещё не ждёт
        worker.shutdown.notify_one();

        // Grab снимается только когда поток закроет устройство,
        // иначе следующий start получит EBUSY
        if join_with_timeout(worker.thread, STOP_TIMEOUT) {
            info!("Перехват ввода остановлен ({:?})", worker.device_path);
        } else {
            warn!(
                "Поток перехвата не завершился за {:?}, устройство {:?} может оставаться захваченным",
                STOP_TIMEOUT, worker.device_path
            );
        }
    }

    fn is_started(&self) -> bool {
        self.worker.lock().is_some()
    }

    fn is_enabled(&self) -> bool {
        match self.worker.lock().as_ref() {
            Some(worker) => {
                worker.running.load(Ordering::SeqCst)
                    && !worker.thread.is_finished()
                    && worker.device_path.exists()
            }
            None => false,
        }
    }
}

impl Drop for EvdevInputHook {
    fn drop(&mut self) {
        self.stop();
    }
}
