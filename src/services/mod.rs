pub mod app_context;
pub mod app_policy;
pub mod gesture;
pub mod input_hook;
pub mod keycode_map;
pub mod overlay;
pub mod quit_sender;
pub mod settings;
pub mod sleep_monitor;
pub mod virtual_device;
pub mod watchdog;
pub mod window_detector;

pub use app_context::{AppContext, DefaultAppContext};
pub use app_policy::AppListPolicy;
pub use gesture::{GestureServices, GestureStateMachine, GestureTiming};
pub use input_hook::create_input_hook;
pub use overlay::ConsoleOverlay;
pub use quit_sender::create_quit_sender;
pub use settings::DelaySettings;
pub use sleep_monitor::SleepMonitor;
pub use virtual_device::VirtualDevice;
pub use watchdog::Watchdog;
pub use window_detector::create_focus_tracker;
