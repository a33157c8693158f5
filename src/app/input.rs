use winit::keyboard::{KeyCode, PhysicalKey};

/// Viewer shortcuts, applied only when egui does not want the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    None,
    ToggleRotation,
    ToggleTheme,
    ResetPalette,
    OpenModel,
    Screenshot,
    ResetView,
}

pub fn map_key(key: PhysicalKey) -> InputAction {
    match key {
        PhysicalKey::Code(KeyCode::KeyR) => InputAction::ToggleRotation,
        PhysicalKey::Code(KeyCode::KeyT) => InputAction::ToggleTheme,
        PhysicalKey::Code(KeyCode::KeyP) => InputAction::ResetPalette,
        PhysicalKey::Code(KeyCode::KeyO) => InputAction::OpenModel,
        PhysicalKey::Code(KeyCode::F12) => InputAction::Screenshot,
        PhysicalKey::Code(KeyCode::Home) => InputAction::ResetView,
        _ => InputAction::None,
    }
}
