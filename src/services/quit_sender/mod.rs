mod dry_quit_sender;
mod uinput_sender;
mod r#trait;

pub use self::r#trait::{QuitEventSender, create_quit_sender};
