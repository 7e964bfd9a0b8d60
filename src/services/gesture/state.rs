use crate::events::ProcessRef;
use tokio::task::JoinHandle;

/// Изменяемое состояние жеста. Создаётся один раз и живёт весь процесс.
#[derive(Debug)]
pub(super) struct GestureState {
    pub enabled: bool,
    pub modifier_held: bool,
    pub trigger_key_held: bool,
    pub armed: bool,
    pub consumed_this_press: bool,
    pub suppressing_self_echo: bool,
    pub locked_target: Option<ProcessRef>,
    /// Таймер подтверждения; есть тогда и только тогда, когда `armed`
    pub pending: Option<JoinHandle<()>>,
    /// Номер текущего экземпляра жеста, таймер чужого поколения ничего не делает
    pub generation: u64,
    pub echo_generation: u64,
}

impl GestureState {
    pub fn new() -> Self {
        Self {
            enabled: true,
            modifier_held: false,
            trigger_key_held: false,
            armed: false,
            consumed_this_press: false,
            suppressing_self_echo: false,
            locked_target: None,
            pending: None,
            generation: 0,
            echo_generation: 0,
        }
    }

    /// Разрешить текущий экземпляр жеста без подтверждения
    pub fn disarm(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
        self.generation = self.generation.wrapping_add(1);
        self.armed = false;
        self.locked_target = None;
    }

    /// Полный сброс на отпускании модификатора
    pub fn release_modifier(&mut self) {
        self.disarm();
        self.modifier_held = false;
        self.consumed_this_press = false;
    }

    pub fn open_echo_window(&mut self) -> u64 {
        self.suppressing_self_echo = true;
        self.echo_generation = self.echo_generation.wrapping_add(1);
        self.echo_generation
    }

    /// Закрывает окно только если с тех пор не открыли новое
    pub fn close_echo_window(&mut self, echo_generation: u64) {
        if self.echo_generation == echo_generation {
            self.suppressing_self_echo = false;
        }
    }

    pub fn is_consistent(&self) -> bool {
        if self.armed {
            let timer_alive = self
                .pending
                .as_ref()
                .map(|pending| !pending.is_finished())
                .unwrap_or(false);
            timer_alive && self.locked_target.is_some()
        } else {
            self.pending.is_none()
        }
    }

    pub fn snapshot(&self) -> GestureSnapshot {
        GestureSnapshot {
            enabled: self.enabled,
            modifier_held: self.modifier_held,
            trigger_key_held: self.trigger_key_held,
            armed: self.armed,
            consumed_this_press: self.consumed_this_press,
            suppressing_self_echo: self.suppressing_self_echo,
            locked_target: self.locked_target.clone(),
            timer_pending: self.pending.is_some(),
        }
    }
}

/// Копия состояния для логов и проверок
#[derive(Debug, Clone, PartialEq)]
pub struct GestureSnapshot {
    pub enabled: bool,
    pub modifier_held: bool,
    pub trigger_key_held: bool,
    pub armed: bool,
    pub consumed_this_press: bool,
    pub suppressing_self_echo: bool,
    pub locked_target: Option<ProcessRef>,
    pub timer_pending: bool,
}

impl GestureSnapshot {
    pub fn is_idle(&self) -> bool {
        !self.armed && !self.timer_pending && self.locked_target.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_window_closes_only_for_its_generation() {
        let mut state = GestureState::new();

        let first = state.open_echo_window();
        let second = state.open_echo_window();
        state.close_echo_window(first);
        assert!(state.suppressing_self_echo);

        state.close_echo_window(second);
        assert!(!state.suppressing_self_echo);
    }

    #[test]
    fn release_modifier_clears_the_press() {
        let mut state = GestureState::new();
        state.modifier_held = true;
        state.consumed_this_press = true;
        let generation = state.generation;

        state.release_modifier();

        assert!(!state.modifier_held);
        assert!(!state.consumed_this_press);
        assert_ne!(state.generation, generation);
        assert!(state.snapshot().is_idle());
        assert!(state.is_consistent());
    }
}
