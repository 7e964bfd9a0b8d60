use crate::events::{KeyCode, KeyState, Modifiers, RawEvent};
use crate::services::keycode_map::KeycodeMap;

/// Физическое состояние модификаторов и перевод evdev событий в `RawEvent`
#[derive(Debug, Default)]
pub struct ModifierState {
    modifiers: Modifiers,
}

impl ModifierState {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` значит событие не интересно обработчику (автоповтор модификатора)
    pub fn translate(&mut self, key: KeyCode, state: KeyState) -> Option<RawEvent> {
        if let Some(modifier) = KeycodeMap::modifier_for(key) {
            let before = self.modifiers;
            self.modifiers.set(modifier, state != KeyState::Released);
            return (before != self.modifiers).then_some(RawEvent::ModifiersChanged(self.modifiers));
        }

        let modifiers = self.modifiers;
        Some(match state {
            KeyState::Pressed | KeyState::Repeat => RawEvent::KeyDown { key, modifiers },
            KeyState::Released => RawEvent::KeyUp { key, modifiers },
        })
    }
}
