use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::signal::unix::{signal as unix_signal, SignalKind};
use tracing::{error, info, warn};
mod config;
mod error;
mod events;
mod services;
mod utils;

use config::Config;
use services::app_policy::AppEntry;
use services::keycode_map::KeycodeMap;
use services::settings::{follow_delay, DelayConfigProvider};
use services::watchdog::ProbeHandle;
use services::{
    create_focus_tracker,
    create_input_hook,
    create_quit_sender,
    AppListPolicy,
    ConsoleOverlay,
    DefaultAppContext,
    DelaySettings,
    GestureServices,
    GestureStateMachine,
    GestureTiming,
    SleepMonitor,
    Watchdog,
};

#[derive(Parser, Debug, Clone)]
#[command(name = "slowquit")]
#[command(about = "Закрытие приложения по Ctrl+Q только после удержания сочетания")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "slowquit.toml")]
    config: String,

    /// Режим сухого запуска (без реальных действий)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (по умолчанию из конфигурации)
    #[arg(long)]
    log_level: Option<String>,

    /// Время удержания в секундах, перекрывает конфигурацию
    #[arg(long)]
    delay: Option<f64>,

    /// Добавить приложение в текущий список (можно повторять)
    #[arg(long = "add-app", value_name = "APP_ID")]
    add_apps: Vec<String>,

    /// Убрать приложение из текущего списка (можно повторять)
    #[arg(long = "remove-app", value_name = "APP_ID")]
    remove_apps: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;
    let level = args.log_level.clone().unwrap_or_else(|| config.logging.level.clone());
    init_tracing(&level, &config.logging.format)?;

    info!("Запуск SlowQuit v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - реальные действия отключены");
    } else {
        utils::permissions::check_permissions()?;
    }

    let trigger = config.trigger()?;
    info!(
        "Сочетание выхода: {}+{}",
        trigger.modifier,
        KeycodeMap::get_key_name(trigger.key).unwrap_or("?")
    );
    let config = Arc::new(config);

    // Инициализация компонентов
    let delay = Arc::new(DelaySettings::from_secs_f64(args.delay.unwrap_or(config.quit.delay_secs)));
    let policy = Arc::new(AppListPolicy::new(
        config.policy.mode,
        config.policy.allowlist.clone(),
        config.policy.denylist.clone(),
    ));
    apply_app_overrides(&policy, &args);

    let app_context = Arc::new(DefaultAppContext::new());
    let runtime = tokio::runtime::Handle::current();
    let (overlay, overlay_handle) = ConsoleOverlay::spawn(&runtime);
    let sender = create_quit_sender(trigger, args.dry_run)?;

    let machine = Arc::new(GestureStateMachine::new(
        trigger,
        GestureTiming {
            activation_settle: config.activation_settle(),
            self_echo_window: config.self_echo_window(),
        },
        GestureServices {
            delay: delay.clone(),
            policy: policy.clone(),
            overlay: Arc::new(overlay.clone()),
            sender,
            app_context: app_context.clone(),
        },
        runtime,
    ));

    let hook = create_input_hook(config.clone(), trigger, delay.clone(), args.dry_run)?;
    if let Err(e) = hook.start(machine.clone()) {
        // Не фатально: watchdog повторит запуск
        error!("{}", e);
    }

    let focus_tracker = create_focus_tracker(config.clone(), app_context.clone(), args.dry_run)?;
    let watchdog = Arc::new(Watchdog::new(hook.clone(), machine.clone(), config.watchdog_interval()));
    let probe = watchdog.probe_handle();

    info!("Все компоненты инициализированы");

    let delay_log_handle = tokio::spawn(follow_delay(delay.subscribe(), |delay| {
        info!("Время удержания обновлено: {:.1}с", delay.as_secs_f64());
    }));

    let focus_handle = tokio::spawn(async move {
        if let Err(e) = focus_tracker.run().await {
            error!("Ошибка в FocusTracker: {}", e);
        }
    });
    let watchdog_handle = tokio::spawn(watchdog.clone().run());
    let sleep_handle = {
        let monitor = SleepMonitor::new(probe.clone());
        tokio::spawn(async move {
            if let Err(e) = monitor.run().await {
                warn!("Проверка после сна недоступна: {}", e);
            }
        })
    };
    let signals_handle = tokio::spawn(handle_signals(
        args.clone(),
        delay.clone(),
        policy.clone(),
        probe,
        machine.clone(),
        Status {
            watchdog: watchdog.clone(),
            app_context: app_context.clone(),
            overlay: overlay.clone(),
            policy: policy.clone(),
        },
    ));

    info!("Все сервисы запущены");

    match signal::ctrl_c().await {
        Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
        Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
    }

    info!("Завершение работы...");

    watchdog_handle.abort();
    sleep_handle.abort();
    signals_handle.abort();
    delay_log_handle.abort();

    machine.cancel();
    hook.stop();
    focus_handle.abort();

    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    let shutdown_result = tokio::time::timeout(shutdown_timeout, async {
        let _ = watchdog_handle.await;
        let _ = focus_handle.await;
    })
    .await;

    match shutdown_result {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    drop(overlay);
    overlay_handle.abort();

    info!("SlowQuit завершил работу");
    Ok(())
}

/// То, что выводится в лог по SIGUSR1
struct Status {
    watchdog: Arc<Watchdog>,
    app_context: Arc<DefaultAppContext>,
    overlay: ConsoleOverlay,
    policy: Arc<AppListPolicy>,
}

impl Status {
    fn log(&self, machine: &GestureStateMachine) {
        let snapshot = machine.snapshot();
        info!(
            "Жест: включён={} модификатор={} клавиша={} взведён={} использован={} эхо={} цель={:?}",
            snapshot.enabled,
            snapshot.modifier_held,
            snapshot.trigger_key_held,
            snapshot.armed,
            snapshot.consumed_this_press,
            snapshot.suppressing_self_echo,
            snapshot.locked_target.as_ref().map(|target| target.display_name().to_string()),
        );
        info!(
            "Watchdog: сбоев подряд={} последняя проверка {:?} назад",
            self.watchdog.consecutive_failures(),
            self.watchdog.last_check_time().map(|at| at.elapsed()),
        );
        info!(
            "Смен активного приложения: {}, индикатор показан: {}, режим списка: {:?} ({} приложений)",
            self.app_context.change_count(),
            self.overlay.is_visible(),
            self.policy.mode(),
            self.policy.current_list().len(),
        );
    }
}

/// SIGHUP: перечитать конфигурацию, SIGUSR1: проверка перехвата и состояние,
/// SIGUSR2: включить/выключить перехват
async fn handle_signals(
    args: Args,
    delay: Arc<DelaySettings>,
    policy: Arc<AppListPolicy>,
    probe: ProbeHandle,
    machine: Arc<GestureStateMachine>,
    status: Status,
) {
    let (mut hangup, mut user1, mut user2) = match (
        unix_signal(SignalKind::hangup()),
        unix_signal(SignalKind::user_defined1()),
        unix_signal(SignalKind::user_defined2()),
    ) {
        (Ok(hangup), Ok(user1), Ok(user2)) => (hangup, user1, user2),
        _ => {
            warn!("Не удалось подписаться на сигналы, перезагрузка конфигурации недоступна");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = hangup.recv() => reload_config(&args, &delay, &policy),
            _ = user1.recv() => {
                status.log(&machine);
                probe.probe_now();
            }
            _ = user2.recv() => machine.set_enabled(!machine.is_enabled()),
        }
    }
}

fn reload_config(args: &Args, delay: &DelaySettings, policy: &AppListPolicy) {
    info!("Перечитываем конфигурацию из {}", args.config);

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            warn!("Конфигурация не применена: {:#}", e);
            return;
        }
    };

    match args.delay {
        Some(_) => info!("Время удержания задано в командной строке, оставляем"),
        None if config.quit.delay_secs == 0.0 => delay.reset_to_default(),
        None => delay.set_delay(DelaySettings::duration_from_secs(config.quit.delay_secs)),
    }

    policy.replace(config.policy.mode, config.policy.allowlist, config.policy.denylist);
    apply_app_overrides(policy, args);
    info!("Конфигурация применена");
}

fn apply_app_overrides(policy: &AppListPolicy, args: &Args) {
    for id in &args.add_apps {
        if policy.add_app(AppEntry::new(id.as_str(), id.as_str())) {
            info!("Приложение {} добавлено в список", id);
        }
    }
    for id in &args.remove_apps {
        if policy.remove_app(id) {
            info!("Приложение {} убрано из списка", id);
        }
    }
}

fn init_tracing(level: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        "full" => registry.with(tracing_subscriber::fmt::layer()).init(),
        _ => registry.with(tracing_subscriber::fmt::layer().compact()).init(),
    }

    Ok(())
}
