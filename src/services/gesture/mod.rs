//! Жест «удерживать для выхода»: классификация событий, таймер подтверждения
//! и окно собственного эха.

mod machine;
mod state;

pub use self::machine::{GestureServices, GestureStateMachine, GestureTiming};
pub use self::state::GestureSnapshot;
