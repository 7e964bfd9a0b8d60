use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

/// Решает, распространяется ли удержание на приложение
pub trait TargetPolicyProvider: Send + Sync {
    /// `None` (приложение не опознано) всегда означает "не задерживать"
    fn should_gate(&self, app_id: Option<&str>) -> bool;
}

/// Режим списка приложений
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListMode {
    /// Все приложения
    Global,
    /// Только приложения из списка
    Allowlist,
    /// Все, кроме приложений из списка
    Denylist,
}

/// Запись списка: идентификатор (класс окна / app_id) и отображаемое имя
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppEntry {
    pub id: String,
    pub name: String,
}

impl AppEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Единственное правило сравнения идентификаторов приложений
fn normalize_id(id: &str) -> String {
    id.to_lowercase()
}

#[derive(Debug)]
struct PolicyState {
    mode: ListMode,
    allowlist: Vec<AppEntry>,
    denylist: Vec<AppEntry>,
    // Нормализованные идентификаторы для O(1) поиска
    allow_ids: HashSet<String>,
    deny_ids: HashSet<String>,
}

impl PolicyState {
    fn rebuild_indexes(&mut self) {
        self.allow_ids = self.allowlist.iter().map(|e| normalize_id(&e.id)).collect();
        self.deny_ids = self.denylist.iter().map(|e| normalize_id(&e.id)).collect();
    }

    fn current_list_mut(&mut self) -> Option<&mut Vec<AppEntry>> {
        match self.mode {
            ListMode::Global => None,
            ListMode::Allowlist => Some(&mut self.allowlist),
            ListMode::Denylist => Some(&mut self.denylist),
        }
    }
}

/// Политика по спискам приложений. Чтение на горячем пути без аллокаций кроме
/// нормализации идентификатора.
pub struct AppListPolicy {
    state: RwLock<PolicyState>,
}

impl AppListPolicy {
    pub fn new(mode: ListMode, allowlist: Vec<AppEntry>, denylist: Vec<AppEntry>) -> Self {
        let mut state = PolicyState {
            mode,
            allowlist,
            denylist,
            allow_ids: HashSet::new(),
            deny_ids: HashSet::new(),
        };
        state.rebuild_indexes();

        Self {
            state: RwLock::new(state),
        }
    }

    pub fn mode(&self) -> ListMode {
        self.state.read().mode
    }

    /// Текущий активный список (пустой в глобальном режиме)
    pub fn current_list(&self) -> Vec<AppEntry> {
        let state = self.state.read();
        match state.mode {
            ListMode::Global => Vec::new(),
            ListMode::Allowlist => state.allowlist.clone(),
            ListMode::Denylist => state.denylist.clone(),
        }
    }

    /// Полная замена (перезагрузка конфигурации)
    pub fn replace(&self, mode: ListMode, allowlist: Vec<AppEntry>, denylist: Vec<AppEntry>) {
        let mut state = self.state.write();
        state.mode = mode;
        state.allowlist = allowlist;
        state.denylist = denylist;
        state.rebuild_indexes();
        info!(
            "Политика приложений обновлена: {:?} (allow: {}, deny: {})",
            mode,
            state.allowlist.len(),
            state.denylist.len()
        );
    }

    /// Добавить приложение в список текущего режима, без дубликатов
    pub fn add_app(&self, entry: AppEntry) -> bool {
        let mut state = self.state.write();
        let mode = state.mode;
        let Some(list) = state.current_list_mut() else {
            return false;
        };
        let key = normalize_id(&entry.id);
        if list.iter().any(|e| normalize_id(&e.id) == key) {
            return false;
        }
        info!("Приложение {} добавлено в список {:?}", entry.id, mode);
        list.push(entry);
        state.rebuild_indexes();
        true
    }

    /// Убрать приложение из списка текущего режима
    pub fn remove_app(&self, id: &str) -> bool {
        let mut state = self.state.write();
        let mode = state.mode;
        let Some(list) = state.current_list_mut() else {
            return false;
        };
        let before = list.len();
        let key = normalize_id(id);
        list.retain(|e| normalize_id(&e.id) != key);
        let removed = list.len() != before;
        if removed {
            info!("Приложение {} удалено из списка {:?}", id, mode);
            state.rebuild_indexes();
        }
        removed
    }
}

impl TargetPolicyProvider for AppListPolicy {
    fn should_gate(&self, app_id: Option<&str>) -> bool {
        let Some(app_id) = app_id else {
            return false;
        };

        let state = self.state.read();
        match state.mode {
            ListMode::Global => true,
            ListMode::Allowlist => state.allow_ids.contains(&normalize_id(app_id)),
            ListMode::Denylist => !state.deny_ids.contains(&normalize_id(app_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn firefox() -> AppEntry {
        AppEntry::new("firefox", "Firefox")
    }

    #[test]
    fn test_unknown_app_is_never_gated() {
        let policy = AppListPolicy::new(ListMode::Global, vec![], vec![]);
        assert!(!policy.should_gate(None));
        assert!(policy.should_gate(Some("anything")));
    }

    #[test]
    fn test_allowlist_and_denylist() {
        let policy = AppListPolicy::new(ListMode::Allowlist, vec![firefox()], vec![firefox()]);
        assert!(policy.should_gate(Some("Firefox")));
        assert!(!policy.should_gate(Some("kitty")));

        policy.replace(ListMode::Denylist, vec![], vec![firefox()]);
        assert!(!policy.should_gate(Some("firefox")));
        assert!(policy.should_gate(Some("kitty")));
    }

    #[test]
    fn test_add_and_remove_follow_current_mode() {
        let policy = AppListPolicy::new(ListMode::Global, vec![], vec![]);
        assert!(!policy.add_app(firefox()));
        assert!(policy.current_list().is_empty());

        policy.replace(ListMode::Denylist, vec![], vec![]);
        assert!(policy.add_app(firefox()));
        assert!(!policy.add_app(AppEntry::new("FIREFOX", "dup")));
        assert_eq!(policy.current_list(), vec![firefox()]);
        assert!(!policy.should_gate(Some("firefox")));

        assert!(policy.remove_app("firefox"));
        assert!(!policy.remove_app("firefox"));
        assert!(policy.should_gate(Some("firefox")));
    }

    #[test]
    fn test_non_ascii_ids_match_the_same_way_everywhere() {
        let policy = AppListPolicy::new(ListMode::Allowlist, vec![], vec![]);
        assert!(policy.add_app(AppEntry::new("Ärzte-App", "Ärzte")));
        assert!(!policy.add_app(AppEntry::new("äRZTE-app", "dup")));
        assert_eq!(policy.current_list().len(), 1);
        assert!(policy.should_gate(Some("ÄRZTE-APP")));

        assert!(policy.remove_app("ärzte-app"));
        assert!(policy.current_list().is_empty());
        assert!(!policy.should_gate(Some("Ärzte-App")));
    }
}
