use crate::scene::ControlMode;
use egui::Key;

/// Editor shortcuts, only honoured while no text field has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    DeleteSelected,
    SetMode(ControlMode),
    RecenterCamera,
}

pub fn collect_actions(ctx: &egui::Context) -> Vec<InputAction> {
    if ctx.wants_keyboard_input() {
        return Vec::new();
    }
    ctx.input(|input| {
        input
            .events
            .iter()
            .filter_map(|event| match event {
                egui::Event::Key {
                    key,
                    pressed: true,
                    repeat: false,
                    modifiers,
                    ..
                } if modifiers.is_none() => map_key(*key),
                _ => None,
            })
            .collect()
    })
}

fn map_key(key: Key) -> Option<InputAction> {
    match key {
        Key::Delete => Some(InputAction::DeleteSelected),
        Key::T => Some(InputAction::SetMode(ControlMode::Translate)),
        Key::R => Some(InputAction::SetMode(ControlMode::Rotate)),
        Key::F => Some(InputAction::RecenterCamera),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortcuts_map_to_actions() {
        assert_eq!(map_key(Key::Delete), Some(InputAction::DeleteSelected));
        assert_eq!(
            map_key(Key::R),
            Some(InputAction::SetMode(ControlMode::Rotate))
        );
        assert_eq!(map_key(Key::F), Some(InputAction::RecenterCamera));
        assert_eq!(map_key(Key::Q), None);
    }
}
