use serde::{Deserialize, Serialize};
use std::fmt;

/// Состояние клавиши (значение evdev события)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyState {
    Pressed,
    Released,
    Repeat,
}

impl KeyState {
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(KeyState::Released),
            1 => Some(KeyState::Pressed),
            2 => Some(KeyState::Repeat),
            _ => None,
        }
    }

    pub fn value(&self) -> i32 {
        match self {
            KeyState::Released => 0,
            KeyState::Pressed => 1,
            KeyState::Repeat => 2,
        }
    }
}

/// Код клавиши (evdev коды)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub fn new(code: u16) -> Self {
        Self(code)
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KEY_{}", self.0)
    }
}

/// Один модификатор, который может быть частью сочетания-триггера
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifierKey {
    Ctrl,
    Alt,
    Shift,
    Super,
}

impl ModifierKey {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "ctrl" | "control" => Some(ModifierKey::Ctrl),
            "alt" | "option" => Some(ModifierKey::Alt),
            "shift" => Some(ModifierKey::Shift),
            "super" | "meta" | "command" => Some(ModifierKey::Super),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModifierKey::Ctrl => "ctrl",
            ModifierKey::Alt => "alt",
            ModifierKey::Shift => "shift",
            ModifierKey::Super => "super",
        }
    }
}

impl fmt::Display for ModifierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Модификаторы клавиш
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub super_key: bool,
}

impl Modifiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, modifier: ModifierKey, held: bool) -> Self {
        self.set(modifier, held);
        self
    }

    pub fn set(&mut self, modifier: ModifierKey, held: bool) {
        match modifier {
            ModifierKey::Ctrl => self.ctrl = held,
            ModifierKey::Alt => self.alt = held,
            ModifierKey::Shift => self.shift = held,
            ModifierKey::Super => self.super_key = held,
        }
    }

    pub fn contains(&self, modifier: ModifierKey) -> bool {
        match modifier {
            ModifierKey::Ctrl => self.ctrl,
            ModifierKey::Alt => self.alt,
            ModifierKey::Shift => self.shift,
            ModifierKey::Super => self.super_key,
        }
    }

    /// Только указанный модификатор, никаких других
    pub fn is_exactly(&self, modifier: ModifierKey) -> bool {
        *self == Modifiers::new().with(modifier, true)
    }

    pub fn to_vec(&self) -> Vec<&'static str> {
        let mut result = Vec::new();
        if self.ctrl { result.push("ctrl"); }
        if self.alt { result.push("alt"); }
        if self.shift { result.push("shift"); }
        if self.super_key { result.push("super"); }
        result
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modifiers = self.to_vec();
        if modifiers.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", modifiers.join("+"))
        }
    }
}

/// Сырое событие от перехвата ввода.
///
/// Нажатия и отпускания модификаторов приходят как `ModifiersChanged` с полным
/// снимком модификаторов после изменения. Аппаратный автоповтор приходит как
/// повторный `KeyDown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEvent {
    ModifiersChanged(Modifiers),
    KeyDown { key: KeyCode, modifiers: Modifiers },
    KeyUp { key: KeyCode, modifiers: Modifiers },
}

impl fmt::Display for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawEvent::ModifiersChanged(modifiers) => write!(f, "modifiers={}", modifiers),
            RawEvent::KeyDown { key, modifiers } => write!(f, "down {}+{}", modifiers, key),
            RawEvent::KeyUp { key, modifiers } => write!(f, "up {}+{}", modifiers, key),
        }
    }
}

/// Решение обработчика по событию
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Пропустить событие без изменений
    Pass,
    /// Проглотить событие
    Swallow,
}

/// Сочетание-триггер: модификатор + клавиша
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub key: KeyCode,
    pub modifier: ModifierKey,
}

impl Trigger {
    pub fn new(key: KeyCode, modifier: ModifierKey) -> Self {
        Self { key, modifier }
    }

    /// Точное совпадение: клавиша триггера и только модификатор триггера
    pub fn matches(&self, key: KeyCode, modifiers: &Modifiers) -> bool {
        key == self.key && modifiers.is_exactly(self.modifier)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.modifier, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifiers_creation() {
        let modifiers = Modifiers::new()
            .with(ModifierKey::Ctrl, true)
            .with(ModifierKey::Shift, true);

        assert!(modifiers.ctrl);
        assert!(modifiers.shift);
        assert!(!modifiers.alt);
        assert!(!modifiers.super_key);
        assert_ne!(modifiers, Modifiers::new());
        assert_eq!(modifiers.to_string(), "ctrl+shift");
    }

    #[test]
    fn test_trigger_matches_only_exact_combination() {
        let trigger = Trigger::new(KeyCode::new(16), ModifierKey::Ctrl);
        let ctrl = Modifiers::new().with(ModifierKey::Ctrl, true);

        assert!(trigger.matches(KeyCode::new(16), &ctrl));
        assert!(!trigger.matches(KeyCode::new(17), &ctrl));
        assert!(!trigger.matches(KeyCode::new(16), &Modifiers::new()));
        assert!(!trigger.matches(
            KeyCode::new(16),
            &ctrl.with(ModifierKey::Shift, true)
        ));
        assert!(!trigger.matches(
            KeyCode::new(16),
            &ctrl.with(ModifierKey::Alt, true)
        ));
    }

    #[test]
    fn test_modifier_key_names() {
        assert_eq!(ModifierKey::from_name("CTRL"), Some(ModifierKey::Ctrl));
        assert_eq!(ModifierKey::from_name("meta"), Some(ModifierKey::Super));
        assert_eq!(ModifierKey::from_name("hyper"), None);
        assert_eq!(KeyState::from_value(2), Some(KeyState::Repeat));
        assert_eq!(KeyState::from_value(7), None);
    }
}
