mod dry_input_hook;
mod evdev_hook;
mod modifier_state;
mod r#trait;

pub use self::r#trait::{EventHandler, InputHook, create_input_hook};
