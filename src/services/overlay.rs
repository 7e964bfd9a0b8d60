use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Индикатор прогресса удержания.
///
/// Оба метода идемпотентны и вызываются с любого потока: реализация сама
/// переправляет команды владельцу индикатора.
pub trait OverlayPresenter: Send + Sync {
    fn show(&self, duration: Duration, label: &str);
    fn hide(&self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayCommand {
    Show { duration: Duration, label: String },
    Hide,
}

const PROGRESS_TICK: Duration = Duration::from_millis(250);

/// Индикатор в виде строк лога. Всё состояние живёт в одной задаче,
/// снаружи доступен только канал команд.
#[derive(Clone)]
pub struct ConsoleOverlay {
    tx: mpsc::UnboundedSender<OverlayCommand>,
    visible: Arc<AtomicBool>,
}

impl ConsoleOverlay {
    pub fn spawn(runtime: &tokio::runtime::Handle) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let visible = Arc::new(AtomicBool::new(false));
        let handle = runtime.spawn(Self::run(rx, Arc::clone(&visible)));
        (Self { tx, visible }, handle)
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    async fn run(mut rx: mpsc::UnboundedReceiver<OverlayCommand>, visible: Arc<AtomicBool>) {
        let mut ticker = interval(PROGRESS_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut current: Option<(String, Duration, Instant)> = None;

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(OverlayCommand::Show { duration, label }) => {
                        if current.is_none() {
                            info!("⏳ Удерживайте, чтобы закрыть {} ({:.1}с)", label, duration.as_secs_f64());
                            current = Some((label, duration, Instant::now()));
                            visible.store(true, Ordering::SeqCst);
                            ticker.reset();
                        }
                    }
                    Some(OverlayCommand::Hide) => {
                        if let Some((label, _, _)) = current.take() {
                            debug!("Оверлей для {} скрыт", label);
                            visible.store(false, Ordering::SeqCst);
                        }
                    }
                    None => break,
                },
                _ = ticker.tick(), if current.is_some() => {
                    if let Some((label, duration, started)) = &current {
                        let progress = (started.elapsed().as_secs_f64() / duration.as_secs_f64()).min(1.0);
                        debug!("{}: {:>3.0}%", label, progress * 100.0);
                    }
                }
            }
        }

        visible.store(false, Ordering::SeqCst);
        debug!("Задача оверлея завершена");
    }
}

impl OverlayPresenter for ConsoleOverlay {
    fn show(&self, duration: Duration, label: &str) {
        let _ = self.tx.send(OverlayCommand::Show {
            duration,
            label: label.to_string(),
        });
    }

    fn hide(&self) {
        let _ = self.tx.send(OverlayCommand::Hide);
    }
}
