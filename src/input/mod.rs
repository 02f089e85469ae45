pub mod cursor;
pub mod keyboard;
pub mod modes;

// Re-export the essential types
pub use cursor::{CursorArbiter, CursorEntry, CursorGrant};
pub use keyboard::{HotkeyGrant, KeyCombo, KeyEvent, KeyboardArbiter};
pub use modes::{
    InteractionEvent, InteractionKind, InteractionModeStore, ModeGrant, ModeOptions,
};
