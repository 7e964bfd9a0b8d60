use crate::events::ProcessRef;
use crate::error::{SlowQuitError, Result};

use super::run_tool;

pub struct SwayDetector;

impl SwayDetector {
    pub fn new() -> Self {
        Self
    }

    pub async fn test(&self) -> Result<()> {
        run_tool("swaymsg", &["-t", "get_version"]).map(|_| ())
    }

    pub async fn get_active_window(&self) -> Result<ProcessRef> {
        let tree = run_tool("swaymsg", &["-t", "get_tree"])?;
        parse_focused_node(&tree)
            .ok_or_else(|| SlowQuitError::Internal("Активное окно в Sway не найдено".to_string()))
    }

    pub fn activate(&self, target: &ProcessRef) -> Result<()> {
        let criteria = match (&target.window_id, target.pid) {
            (Some(con_id), _) => format!("[con_id={}]", con_id),
            (None, Some(pid)) => format!("[pid={}]", pid),
            (None, None) => {
                return Err(SlowQuitError::Internal(format!("Окно {} не адресуемо в Sway", target)))
            }
        };
        run_tool("swaymsg", &[criteria.as_str(), "focus"])?;
        Ok(())
    }
}

/// Разбор сфокусированного листа дерева `swaymsg -t get_tree` без JSON-парсера:
/// у листа "id" стоит до "focused", а "name"/"pid"/"app_id" после, и вложенных узлов нет.
fn parse_focused_node(tree: &str) -> Option<ProcessRef> {
    let (focused_at, _) = fields(tree, "focused").find(|(_, value)| value.starts_with("true"))?;

    let before = &tree[..focused_at];
    let after = &tree[focused_at + 1..];
    // Хвост ограничиваем следующим узлом
    let node = match fields(after, "focused").next() {
        Some((end, _)) => &after[..end],
        None => after,
    };

    let con_id = fields(before, "id").last().and_then(|(_, value)| leading_digits(value));

    let title = string_field(node, "name").unwrap_or_default();
    let mut app = ProcessRef::new(title);

    if let Some(app_id) = string_field(node, "app_id") {
        app = app.with_app_id(app_id);
    } else if let Some(class) = string_field(node, "class") {
        // XWayland окна
        app = app.with_app_id(class);
    }

    if let Some(pid) = fields(node, "pid")
        .next()
        .and_then(|(_, value)| leading_digits(value))
        .and_then(|pid| pid.parse::<u32>().ok())
    {
        app = app.with_pid(pid);
    }

    if let Some(con_id) = con_id {
        app = app.with_window_id(con_id);
    }

    Some(app)
}

/// Все вхождения `"key": value` с позицией ключа и текстом, начинающимся со значения
fn fields<'a>(json: &'a str, key: &str) -> impl Iterator<Item = (usize, &'a str)> + 'a {
    let pattern = format!("\"{}\"", key);
    let offsets: Vec<usize> = json.match_indices(pattern.as_str()).map(|(at, _)| at).collect();
    let key_len = pattern.len();

    offsets.into_iter().filter_map(move |at| {
        let value = json[at + key_len..].trim_start().strip_prefix(':')?.trim_start();
        Some((at, value))
    })
}

fn leading_digits(value: &str) -> Option<&str> {
    let end = value.find(|c: char| !c.is_ascii_digit()).unwrap_or(value.len());
    (end > 0).then(|| &value[..end])
}

fn string_field(node: &str, field: &str) -> Option<String> {
    let (_, value) = fields(node, field).next()?;
    let rest = value.strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_focused_node() {
        let tree = r#"{"id": 1, "focused": false, "nodes": [
            {"id": 7, "type": "con", "focused": false, "name": "Firefox", "nodes": [], "pid": 100, "app_id": "firefox"},
            {"id": 9, "type": "con", "focused": true, "name": "nvim - main.rs", "nodes": [], "pid": 4242, "app_id": "kitty"}
        ]}"#;

        let app = parse_focused_node(tree).unwrap();
        assert_eq!(app.name, "nvim - main.rs");
        assert_eq!(app.app_id.as_deref(), Some("kitty"));
        assert_eq!(app.pid, Some(4242));
        assert_eq!(app.window_id.as_deref(), Some("9"));
    }

    #[test]
    fn test_no_focused_node() {
        assert!(parse_focused_node(r#"{"id": 1, "focused": false}"#).is_none());
    }
}
