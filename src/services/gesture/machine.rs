use crate::error::SlowQuitError;
use crate::events::{KeyCode, Modifiers, ProcessRef, RawEvent, Trigger, Verdict};
use crate::services::app_context::AppContext;
use crate::services::app_policy::TargetPolicyProvider;
use crate::services::input_hook::EventHandler;
use crate::services::overlay::OverlayPresenter;
use crate::services::quit_sender::QuitEventSender;
use crate::services::settings::DelayConfigProvider;
use crate::debug_if_enabled;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use super::state::{GestureSnapshot, GestureState};

/// Паузы внутри подтверждения
#[derive(Debug, Clone, Copy)]
pub struct GestureTiming {
    /// Между активацией цели и отправкой сочетания
    pub activation_settle: Duration,
    /// Сколько после отправки считать входящий триггер своим эхом
    pub self_echo_window: Duration,
}

impl Default for GestureTiming {
    fn default() -> Self {
        Self {
            activation_settle: Duration::from_millis(50),
            self_echo_window: Duration::from_millis(100),
        }
    }
}

/// Сервисы, которые машина вызывает
pub struct GestureServices {
    pub delay: Arc<dyn DelayConfigProvider>,
    pub policy: Arc<dyn TargetPolicyProvider>,
    pub overlay: Arc<dyn OverlayPresenter>,
    pub sender: Arc<dyn QuitEventSender>,
    pub app_context: Arc<dyn AppContext>,
}

struct Shared {
    trigger: Trigger,
    timing: GestureTiming,
    services: GestureServices,
    runtime: Handle,
    state: Mutex<GestureState>,
}

/// Распознавание жеста «удерживать для выхода».
///
/// `handle` вызывается на потоке перехвата и только меняет состояние под
/// коротким замком: таймер подтверждения запускается в runtime через `Handle`,
/// а индикатор получает команды через свой канал. Отмена таймера синхронна с
/// изменением состояния, поэтому отпускание, обработанное раньше срабатывания,
/// всегда побеждает.
#[derive(Clone)]
pub struct GestureStateMachine {
    shared: Arc<Shared>,
}

impl GestureStateMachine {
    pub fn new(trigger: Trigger, timing: GestureTiming, services: GestureServices, runtime: Handle) -> Self {
        info!("Инициализация GestureStateMachine для {}", trigger);
        Self {
            shared: Arc::new(Shared {
                trigger,
                timing,
                services,
                runtime,
                state: Mutex::new(GestureState::new()),
            }),
        }
    }

    pub fn snapshot(&self) -> GestureSnapshot {
        self.shared.state.lock().snapshot()
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.state.lock().enabled
    }

    /// Выключенная машина пропускает всё; текущий жест отменяется
    pub fn set_enabled(&self, enabled: bool) {
        let mut state = self.shared.state.lock();
        if state.enabled == enabled {
            return;
        }

        if !enabled {
            if state.armed {
                self.shared.services.overlay.hide();
            }
            // Модификатор физически может оставаться зажатым
            state.disarm();
            state.consumed_this_press = false;
        }
        state.enabled = enabled;
        info!("Перехват {}", if enabled { "включён" } else { "выключен" });
    }

    /// Отменить взведённый жест, не трогая остальное состояние
    pub fn cancel(&self) {
        let mut state = self.shared.state.lock();
        if state.armed {
            info!("Жест отменён");
        }
        state.disarm();
        self.shared.services.overlay.hide();
    }

    fn on_modifiers(&self, state: &mut GestureState, modifiers: Modifiers) -> Verdict {
        let held = modifiers.contains(self.shared.trigger.modifier);
        if state.modifier_held && !held {
            if state.armed {
                debug!("Модификатор отпущен до подтверждения, жест отменён");
            }
            state.release_modifier();
            self.shared.services.overlay.hide();
        }
        state.modifier_held = held;
        Verdict::Pass
    }

    fn on_key_down(&self, state: &mut GestureState, key: KeyCode, modifiers: Modifiers) -> Verdict {
        if key != self.shared.trigger.key {
            return Verdict::Pass;
        }
        state.trigger_key_held = true;

        if !state.modifier_held || !modifiers.is_exactly(self.shared.trigger.modifier) {
            return Verdict::Pass;
        }

        if state.suppressing_self_echo {
            debug_if_enabled!("Собственное эхо {}, пропускаем", self.shared.trigger);
            return Verdict::Pass;
        }

        let frontmost = self.shared.services.app_context.frontmost();
        let app_id = frontmost.as_ref().and_then(|app| app.app_id.as_deref());
        if !self.shared.services.policy.should_gate(app_id) {
            debug_if_enabled!("Приложение {:?} не под защитой, выход без задержки", app_id);
            return Verdict::Pass;
        }

        if state.consumed_this_press || state.armed {
            return Verdict::Swallow;
        }

        match frontmost {
            Some(target) => {
                self.arm(state, target);
                Verdict::Swallow
            }
            None => Verdict::Pass,
        }
    }

    fn on_key_up(&self, state: &mut GestureState, key: KeyCode) -> Verdict {
        if key != self.shared.trigger.key {
            return Verdict::Pass;
        }
        state.trigger_key_held = false;

        if !state.armed {
            return Verdict::Pass;
        }

        debug!("Клавиша отпущена раньше времени, жест отменён");
        state.disarm();
        self.shared.services.overlay.hide();
        Verdict::Swallow
    }

    fn arm(&self, state: &mut GestureState, target: ProcessRef) {
        let delay = self.shared.services.delay.current_delay();
        state.generation = state.generation.wrapping_add(1);
        let generation = state.generation;

        info!("Жест взведён для {} на {:.1}с", target, delay.as_secs_f64());

        // Команды индикатору только ставятся в очередь, под замком это безопасно
        self.shared.services.overlay.show(delay, target.display_name());
        state.armed = true;
        state.locked_target = Some(target);

        let shared = Arc::clone(&self.shared);
        state.pending = Some(self.shared.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            shared.confirm(generation).await;
        }));
    }
}

impl Shared {
    async fn confirm(&self, generation: u64) {
        let target = {
            let state = self.state.lock();
            if !state.armed || state.generation != generation {
                debug!("Устаревший таймер поколения {}, пропускаем", generation);
                return;
            }
            match state.locked_target.clone() {
                Some(target) => target,
                None => return,
            }
        };

        let alive = self.services.app_context.is_running(&target);

        let echo_generation = {
            let mut state = self.state.lock();
            if !state.armed || state.generation != generation {
                return;
            }
            state.pending = None;
            state.armed = false;
            state.locked_target = None;
            self.services.overlay.hide();

            if !alive {
                info!("{}", SlowQuitError::TargetGone(target.display_name().to_string()));
                return;
            }

            state.consumed_this_press = true;
            state.open_echo_window()
        };

        info!("Подтверждено: закрываем {}", target);

        if let Err(e) = self.services.sender.activate(&target).await {
            warn!("Не удалось активировать {}: {}", target, e);
        }
        tokio::time::sleep(self.timing.activation_settle).await;

        match self.services.sender.send_quit_shortcut(&target).await {
            Ok(()) => {
                tokio::time::sleep(self.timing.self_echo_window).await;
                self.state.lock().close_echo_window(echo_generation);
            }
            Err(e) => {
                self.state.lock().close_echo_window(echo_generation);
                error!("Не удалось отправить сочетание выхода для {}: {}", target, e);
            }
        }
    }
}

impl EventHandler for GestureStateMachine {
    fn handle(&self, event: RawEvent) -> Verdict {
        let mut state = self.shared.state.lock();
        if !state.enabled {
            // Модификатор отслеживается и в выключенном состоянии
            if let RawEvent::ModifiersChanged(modifiers) = event {
                state.modifier_held = modifiers.contains(self.shared.trigger.modifier);
            }
            return Verdict::Pass;
        }

        let verdict = match event {
            RawEvent::ModifiersChanged(modifiers) => self.on_modifiers(&mut state, modifiers),
            RawEvent::KeyDown { key, modifiers } => self.on_key_down(&mut state, key, modifiers),
            RawEvent::KeyUp { key, .. } => self.on_key_up(&mut state, key),
        };

        debug_if_enabled!("{} -> {:?}", event, verdict);
        verdict
    }

    fn is_healthy(&self) -> bool {
        self.shared.state.lock().is_consistent()
    }

    fn reset(&self) {
        let mut state = self.shared.state.lock();
        state.release_modifier();
        state.trigger_key_held = false;
        state.suppressing_self_echo = false;
        self.shared.services.overlay.hide();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::events::ModifierKey;
    use crate::services::settings::DelaySettings;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::time::sleep;

    const Q: KeyCode = KeyCode(16);
    const W: KeyCode = KeyCode(17);

    #[derive(Default)]
    struct RecordingOverlay {
        shows: AtomicUsize,
        visible: AtomicBool,
    }

    impl OverlayPresenter for RecordingOverlay {
        fn show(&self, _duration: Duration, _label: &str) {
            self.shows.fetch_add(1, Ordering::SeqCst);
            self.visible.store(true, Ordering::SeqCst);
        }

        fn hide(&self) {
            self.visible.store(false, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct RecordingSender {
        activated: Mutex<Vec<String>>,
        quits: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl QuitEventSender for RecordingSender {
        async fn activate(&self, target: &ProcessRef) -> Result<()> {
            self.activated.lock().push(target.name.clone());
            Ok(())
        }

        async fn send_quit_shortcut(&self, target: &ProcessRef) -> Result<()> {
            if self.fail {
                return Err(crate::slowquit_error!(synthesis, "uinput недоступен"));
            }
            self.quits.lock().push(target.name.clone());
            Ok(())
        }
    }

    struct FakeContext {
        frontmost: Mutex<Option<ProcessRef>>,
        alive: AtomicBool,
    }

    impl AppContext for FakeContext {
        fn frontmost(&self) -> Option<ProcessRef> {
            self.frontmost.lock().clone()
        }

        fn update(&self, app: Option<ProcessRef>) {
            *self.frontmost.lock() = app;
        }

        fn is_running(&self, _target: &ProcessRef) -> bool {
            self.alive.load(Ordering::SeqCst)
        }
    }

    struct StaticPolicy(bool);

    impl TargetPolicyProvider for StaticPolicy {
        fn should_gate(&self, app_id: Option<&str>) -> bool {
            app_id.is_some() && self.0
        }
    }

    struct Harness {
        machine: GestureStateMachine,
        overlay: Arc<RecordingOverlay>,
        sender: Arc<RecordingSender>,
        context: Arc<FakeContext>,
    }

    impl Harness {
        fn new() -> Self {
            Self::build(true, RecordingSender::default())
        }

        fn build(gate: bool, sender: RecordingSender) -> Self {
            let overlay = Arc::new(RecordingOverlay::default());
            let sender = Arc::new(sender);
            let context = Arc::new(FakeContext {
                frontmost: Mutex::new(Some(app("Editor", "code"))),
                alive: AtomicBool::new(true),
            });

            let machine = GestureStateMachine::new(
                Trigger::new(Q, ModifierKey::Ctrl),
                GestureTiming::default(),
                GestureServices {
                    delay: Arc::new(DelaySettings::new(Duration::from_secs(1))),
                    policy: Arc::new(StaticPolicy(gate)),
                    overlay: overlay.clone(),
                    sender: sender.clone(),
                    app_context: context.clone(),
                },
                Handle::current(),
            );

            Self { machine, overlay, sender, context }
        }

        fn ctrl(&self, held: bool) -> Verdict {
            self.machine.handle(RawEvent::ModifiersChanged(
                Modifiers::new().with(ModifierKey::Ctrl, held),
            ))
        }

        fn down(&self, key: KeyCode) -> Verdict {
            self.machine.handle(RawEvent::KeyDown { key, modifiers: ctrl() })
        }

        fn up(&self, key: KeyCode) -> Verdict {
            self.machine.handle(RawEvent::KeyUp { key, modifiers: ctrl() })
        }

        fn quits(&self) -> Vec<String> {
            self.sender.quits.lock().clone()
        }

        fn overlay_visible(&self) -> bool {
            self.overlay.visible.load(Ordering::SeqCst)
        }
    }

    fn app(name: &str, app_id: &str) -> ProcessRef {
        ProcessRef::new(name).with_app_id(app_id).with_pid(4242)
    }

    fn ctrl() -> Modifiers {
        Modifiers::new().with(ModifierKey::Ctrl, true)
    }

    #[tokio::test(start_paused = true)]
    async fn holding_past_delay_quits_exactly_once() {
        let h = Harness::new();

        assert_eq!(h.ctrl(true), Verdict::Pass);
        assert_eq!(h.down(Q), Verdict::Swallow);
        assert!(h.overlay_visible());
        assert!(h.machine.snapshot().armed);

        // Автоповтор на протяжении удержания
        sleep(Duration::from_millis(500)).await;
        assert_eq!(h.down(Q), Verdict::Swallow);

        sleep(Duration::from_millis(1500)).await;
        assert_eq!(h.down(Q), Verdict::Swallow);
        sleep(Duration::from_secs(2)).await;

        assert_eq!(h.quits(), vec!["Editor".to_string()]);
        assert_eq!(*h.sender.activated.lock(), vec!["Editor".to_string()]);
        assert!(!h.overlay_visible());

        let snapshot = h.machine.snapshot();
        assert!(snapshot.consumed_this_press);
        assert!(snapshot.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn early_release_sends_nothing() {
        let h = Harness::new();

        h.ctrl(true);
        assert_eq!(h.down(Q), Verdict::Swallow);
        sleep(Duration::from_millis(400)).await;
        assert_eq!(h.up(Q), Verdict::Swallow);
        assert!(!h.overlay_visible());

        sleep(Duration::from_secs(3)).await;
        assert!(h.quits().is_empty());
        assert!(h.machine.snapshot().is_idle());
        assert!(!h.machine.snapshot().consumed_this_press);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_key_down_keeps_first_deadline() {
        let h = Harness::new();

        h.ctrl(true);
        h.down(Q);
        sleep(Duration::from_millis(600)).await;
        assert_eq!(h.down(Q), Verdict::Swallow);
        assert_eq!(h.overlay.shows.load(Ordering::SeqCst), 1);

        // Таймер от первого нажатия: 1000мс + 50мс до отправки
        sleep(Duration::from_millis(460)).await;
        assert_eq!(h.quits().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn modifier_release_resets_everything() {
        let h = Harness::new();

        h.ctrl(true);
        h.down(Q);
        sleep(Duration::from_millis(300)).await;
        assert_eq!(h.ctrl(false), Verdict::Pass);

        let snapshot = h.machine.snapshot();
        assert!(snapshot.is_idle());
        assert!(!snapshot.modifier_held);
        assert!(!h.overlay_visible());

        sleep(Duration::from_secs(3)).await;
        assert!(h.quits().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn repress_without_releasing_modifier_is_swallowed() {
        let h = Harness::new();

        h.ctrl(true);
        h.down(Q);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(h.up(Q), Verdict::Pass);

        // Фокус ушёл на другое приложение, модификатор всё ещё зажат
        h.context.update(Some(app("Browser", "firefox")));
        assert_eq!(h.down(Q), Verdict::Swallow);
        assert!(!h.machine.snapshot().armed);
        sleep(Duration::from_secs(3)).await;
        assert_eq!(h.quits(), vec!["Editor".to_string()]);

        // После отпускания модификатора жест снова доступен
        h.up(Q);
        h.ctrl(false);
        h.ctrl(true);
        assert_eq!(h.down(Q), Verdict::Swallow);
        sleep(Duration::from_millis(1100)).await;
        assert_eq!(h.quits(), vec!["Editor".to_string(), "Browser".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn locked_target_survives_focus_change() {
        let h = Harness::new();

        h.ctrl(true);
        h.down(Q);
        h.context.update(Some(app("Browser", "firefox")));
        sleep(Duration::from_millis(1100)).await;

        assert_eq!(h.quits(), vec!["Editor".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn ungated_app_passes_straight_through() {
        let h = Harness::build(false, RecordingSender::default());

        h.ctrl(true);
        assert_eq!(h.down(Q), Verdict::Pass);
        assert_eq!(h.up(Q), Verdict::Pass);
        assert_eq!(h.overlay.shows.load(Ordering::SeqCst), 0);

        sleep(Duration::from_secs(2)).await;
        assert!(h.quits().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_frontmost_app_is_not_gated() {
        let h = Harness::new();
        h.context.update(None);

        h.ctrl(true);
        assert_eq!(h.down(Q), Verdict::Pass);
        assert!(h.machine.snapshot().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn self_echo_window_passes_trigger() {
        let h = Harness::new();

        h.ctrl(true);
        h.down(Q);
        // Подтверждение в 1000мс, отправка в 1050мс, окно эха до 1150мс
        sleep(Duration::from_millis(1100)).await;
        assert!(h.machine.snapshot().suppressing_self_echo);
        assert_eq!(h.down(Q), Verdict::Pass);
        assert_eq!(h.up(Q), Verdict::Pass);

        sleep(Duration::from_millis(100)).await;
        assert!(!h.machine.snapshot().suppressing_self_echo);
        assert_eq!(h.quits().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn synthesis_failure_closes_echo_window_immediately() {
        let h = Harness::build(true, RecordingSender { fail: true, ..Default::default() });

        h.ctrl(true);
        h.down(Q);
        sleep(Duration::from_millis(1060)).await;

        let snapshot = h.machine.snapshot();
        assert!(!snapshot.suppressing_self_echo);
        assert!(snapshot.consumed_this_press);
        assert!(h.quits().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn exited_target_aborts_confirm() {
        let h = Harness::new();

        h.ctrl(true);
        h.down(Q);
        h.context.alive.store(false, Ordering::SeqCst);
        sleep(Duration::from_secs(2)).await;

        let snapshot = h.machine.snapshot();
        assert!(h.quits().is_empty());
        assert!(h.sender.activated.lock().is_empty());
        assert!(snapshot.is_idle());
        assert!(!snapshot.consumed_this_press);
        assert!(!h.overlay_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn other_combinations_pass() {
        let h = Harness::new();

        h.ctrl(true);
        assert_eq!(h.down(W), Verdict::Pass);

        let ctrl_shift = ctrl().with(ModifierKey::Shift, true);
        h.machine.handle(RawEvent::ModifiersChanged(ctrl_shift));
        let verdict = h.machine.handle(RawEvent::KeyDown { key: Q, modifiers: ctrl_shift });
        assert_eq!(verdict, Verdict::Pass);

        assert_eq!(
            h.machine.handle(RawEvent::KeyDown { key: Q, modifiers: Modifiers::new() }),
            Verdict::Pass
        );
        assert!(h.machine.snapshot().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_cancels_and_passes_everything() {
        let h = Harness::new();

        h.ctrl(true);
        h.down(Q);
        h.machine.set_enabled(false);
        assert!(!h.overlay_visible());
        assert!(h.machine.snapshot().is_idle());

        h.ctrl(true);
        assert_eq!(h.down(Q), Verdict::Pass);
        sleep(Duration::from_secs(2)).await;
        assert!(h.quits().is_empty());

        h.machine.set_enabled(true);
        h.ctrl(true);
        assert_eq!(h.down(Q), Verdict::Swallow);
    }

    #[tokio::test(start_paused = true)]
    async fn modifier_held_across_reenable_still_gates() {
        let h = Harness::new();

        h.machine.set_enabled(false);
        assert_eq!(h.ctrl(true), Verdict::Pass);
        assert!(h.machine.snapshot().modifier_held);

        h.machine.set_enabled(true);
        assert_eq!(h.down(Q), Verdict::Swallow);
        assert!(h.machine.snapshot().armed);

        sleep(Duration::from_millis(1100)).await;
        assert_eq!(h.quits(), vec!["Editor".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_keeps_held_modifier() {
        let h = Harness::new();

        h.ctrl(true);
        h.down(Q);
        h.machine.set_enabled(false);

        let snapshot = h.machine.snapshot();
        assert!(snapshot.modifier_held);
        assert!(snapshot.is_idle());

        // Отпускание в выключенном состоянии тоже учитывается
        h.ctrl(false);
        h.machine.set_enabled(true);
        assert!(!h.machine.snapshot().modifier_held);
        assert_eq!(h.down(Q), Verdict::Pass);
    }

    #[tokio::test(start_paused = true)]
    async fn health_reflects_timer_invariant() {
        let h = Harness::new();
        assert!(h.machine.is_healthy());

        h.ctrl(true);
        h.down(Q);
        assert!(h.machine.is_healthy());

        h.machine.reset();
        assert!(h.machine.snapshot().is_idle());
        assert!(h.machine.is_healthy());
    }
}
