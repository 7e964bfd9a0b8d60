use crate::events::{KeyCode, ModifierKey};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Маппинг между именами клавиш и кодами evdev
pub struct KeycodeMap;

// Статическая карта клавиш, которые могут быть триггером
static KEY_NAME_TO_CODE: Lazy<HashMap<&'static str, u16>> = Lazy::new(|| {
    let mut map = HashMap::new();

    // Буквенные клавиши
    map.insert("a", 30);  // KEY_A
    map.insert("b", 48);  // KEY_B
    map.insert("c", 46);  // KEY_C
    map.insert("d", 32);  // KEY_D
    map.insert("e", 18);  // KEY_E
    map.insert("f", 33);  // KEY_F
    map.insert("g", 34);  // KEY_G
    map.insert("h", 35);  // KEY_H
    map.insert("i", 23);  // KEY_I
    map.insert("j", 36);  // KEY_J
    map.insert("k", 37);  // KEY_K
    map.insert("l", 38);  // KEY_L
    map.insert("m", 50);  // KEY_M
    map.insert("n", 49);  // KEY_N
    map.insert("o", 24);  // KEY_O
    map.insert("p", 25);  // KEY_P
    map.insert("q", 16);  // KEY_Q
    map.insert("r", 19);  // KEY_R
    map.insert("s", 31);  // KEY_S
    map.insert("t", 20);  // KEY_T
    map.insert("u", 22);  // KEY_U
    map.insert("v", 47);  // KEY_V
    map.insert("w", 17);  // KEY_W
    map.insert("x", 45);  // KEY_X
    map.insert("y", 21);  // KEY_Y
    map.insert("z", 44);  // KEY_Z

    // Специальные клавиши
    map.insert("escape", 1);      // KEY_ESC
    map.insert("backspace", 14);  // KEY_BACKSPACE
    map.insert("f4", 62);         // KEY_F4

    map
});

static CODE_TO_KEY_NAME: Lazy<HashMap<u16, &'static str>> = Lazy::new(|| {
    KEY_NAME_TO_CODE.iter().map(|(&name, &code)| (code, name)).collect()
});

impl KeycodeMap {
    /// Получить код клавиши по её имени
    pub fn get_keycode(key_name: &str) -> Result<KeyCode, String> {
        let normalized = key_name.to_lowercase();
        KEY_NAME_TO_CODE
            .get(normalized.as_str())
            .map(|&code| KeyCode::new(code))
            .ok_or_else(|| format!("Unknown key: {}", key_name))
    }

    /// Получить имя клавиши по её коду
    pub fn get_key_name(keycode: KeyCode) -> Option<&'static str> {
        CODE_TO_KEY_NAME.get(&keycode.value()).copied()
    }

    /// Модификатор, которому принадлежит код (левый и правый варианты)
    pub fn modifier_for(keycode: KeyCode) -> Option<ModifierKey> {
        match keycode.value() {
            29 | 97 => Some(ModifierKey::Ctrl),    // KEY_LEFTCTRL, KEY_RIGHTCTRL
            56 | 100 => Some(ModifierKey::Alt),    // KEY_LEFTALT, KEY_RIGHTALT
            42 | 54 => Some(ModifierKey::Shift),   // KEY_LEFTSHIFT, KEY_RIGHTSHIFT
            125 | 126 => Some(ModifierKey::Super), // KEY_LEFTMETA, KEY_RIGHTMETA
            _ => None,
        }
    }

    /// Код левой клавиши модификатора (для синтеза)
    pub fn modifier_keycode(modifier: ModifierKey) -> KeyCode {
        let code = match modifier {
            ModifierKey::Ctrl => 29,
            ModifierKey::Alt => 56,
            ModifierKey::Shift => 42,
            ModifierKey::Super => 125,
        };
        KeyCode::new(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_key_mapping() {
        assert_eq!(KeycodeMap::get_keycode("q").unwrap(), KeyCode::new(16));
        assert_eq!(KeycodeMap::get_keycode("w").unwrap(), KeyCode::new(17));
        assert_eq!(KeycodeMap::get_keycode("f4").unwrap(), KeyCode::new(62));
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(KeycodeMap::get_keycode("Q").unwrap(), KeyCode::new(16));
    }

    #[test]
    fn test_reverse_mapping() {
        assert_eq!(KeycodeMap::get_key_name(KeyCode::new(16)), Some("q"));
        assert_eq!(KeycodeMap::get_key_name(KeyCode::new(29)), None);
    }

    #[test]
    fn test_invalid_key() {
        assert!(KeycodeMap::get_keycode("invalid_key").is_err());
    }

    #[test]
    fn test_modifier_detection() {
        assert_eq!(KeycodeMap::modifier_for(KeyCode::new(97)), Some(ModifierKey::Ctrl));
        assert_eq!(KeycodeMap::modifier_for(KeyCode::new(54)), Some(ModifierKey::Shift));
        assert_eq!(KeycodeMap::modifier_for(KeyCode::new(16)), None);
        assert_eq!(
            KeycodeMap::modifier_for(KeycodeMap::modifier_keycode(ModifierKey::Super)),
            Some(ModifierKey::Super)
        );
    }
}
