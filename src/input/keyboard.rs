use crate::prelude::HashSet;
use crate::{HostError, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// A physical key-down event as delivered by the embedding shell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// The logical key value, e.g. `"z"`, `"Escape"`
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
}

impl KeyEvent {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ctrl: false,
            shift: false,
            alt: false,
            meta: false,
        }
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn with_alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }
}

/// Normalized modifier+key descriptor.
///
/// Parsed from strings like `"Ctrl+Shift+z"`; modifier order and casing are
/// irrelevant, the key itself is compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
    pub key: String,
}

impl KeyCombo {
    /// Parses a combo descriptor. The last `+`-separated token is the key;
    /// everything before it must be a modifier name.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let mut combo = Self {
            ctrl: false,
            shift: false,
            alt: false,
            meta: false,
            key: String::new(),
        };

        let tokens: Vec<&str> = descriptor.split('+').map(str::trim).collect();
        let (key, modifiers) = match tokens.split_last() {
            Some((key, modifiers)) if !key.is_empty() => (*key, modifiers),
            _ => {
                return Err(HostError::InvalidConfig(format!(
                    "hotkey descriptor '{}' has no key",
                    descriptor
                )))
            }
        };

        for modifier in modifiers {
            match modifier.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => combo.ctrl = true,
                "shift" => combo.shift = true,
                "alt" | "option" => combo.alt = true,
                "meta" | "cmd" | "super" => combo.meta = true,
                other => {
                    return Err(HostError::InvalidConfig(format!(
                        "unknown modifier '{}' in hotkey descriptor '{}'",
                        other, descriptor
                    )))
                }
            }
        }

        combo.key = key.to_ascii_lowercase();
        Ok(combo)
    }

    /// Normalizes a physical event into a combo for matching
    pub fn from_event(event: &KeyEvent) -> Self {
        Self {
            ctrl: event.ctrl,
            shift: event.shift,
            alt: event.alt,
            meta: event.meta,
            key: event.key.to_ascii_lowercase(),
        }
    }
}

impl std::fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.ctrl {
            write!(f, "Ctrl+")?;
        }
        if self.alt {
            write!(f, "Alt+")?;
        }
        if self.shift {
            write!(f, "Shift+")?;
        }
        if self.meta {
            write!(f, "Meta+")?;
        }
        write!(f, "{}", self.key)
    }
}

/// Handler callback; returning `true` asks the host to suppress the default
/// browser/shell behavior for the event.
pub type HotkeyHandler = Arc<dyn Fn(&KeyEvent) -> bool + Send + Sync>;

struct HotkeyBinding {
    id: u64,
    owner: String,
    combo: KeyCombo,
    handler: HotkeyHandler,
    priority: i32,
    enabled: bool,
}

#[derive(Default)]
struct KeyboardState {
    bindings: Vec<HotkeyBinding>,
    disabled_owners: HashSet<String>,
    enabled: bool,
    destroyed: bool,
    next_id: u64,
}

/// Priority-ordered hotkey dispatch.
///
/// On a key-down event every enabled binding whose combo matches is invoked,
/// in descending priority order. Dispatch fans out: a handler's return value
/// controls default-behavior suppression but never stops lower-priority
/// handlers from also receiving the event. This is a load-bearing contract;
/// two plugins may both legitimately observe the same shortcut.
#[derive(Clone)]
pub struct KeyboardArbiter {
    state: Arc<Mutex<KeyboardState>>,
}

impl KeyboardArbiter {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(KeyboardState {
                enabled: true,
                ..Default::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, KeyboardState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a binding for `owner`. Returns a grant that removes it.
    pub fn register<F>(
        &self,
        owner: &str,
        combo: KeyCombo,
        priority: i32,
        handler: F,
    ) -> HotkeyGrant
    where
        F: Fn(&KeyEvent) -> bool + Send + Sync + 'static,
    {
        let mut state = self.state();
        state.next_id += 1;
        let id = state.next_id;
        state.bindings.push(HotkeyBinding {
            id,
            owner: owner.to_string(),
            combo,
            handler: Arc::new(handler),
            priority,
            enabled: true,
        });

        HotkeyGrant {
            arbiter: self.clone(),
            id,
        }
    }

    /// Enables or disables every binding held by `owner`
    pub fn set_owner_enabled(&self, owner: &str, enabled: bool) {
        let mut state = self.state();
        if enabled {
            state.disabled_owners.remove(owner);
        } else {
            state.disabled_owners.insert(owner.to_string());
        }
    }

    /// Enables or disables dispatch globally
    pub fn set_enabled_all(&self, enabled: bool) {
        self.state().enabled = enabled;
    }

    /// Whether dispatch is globally enabled
    pub fn is_enabled(&self) -> bool {
        let state = self.state();
        state.enabled && !state.destroyed
    }

    /// Enables or disables one binding without removing it
    pub fn set_binding_enabled(&self, grant: &HotkeyGrant, enabled: bool) {
        let mut state = self.state();
        if let Some(binding) = state.bindings.iter_mut().find(|b| b.id == grant.id) {
            binding.enabled = enabled;
        }
    }

    /// Dispatches a key-down event.
    ///
    /// Returns `true` when any matching handler requested default-behavior
    /// suppression. All matching handlers run; see the type-level contract.
    pub fn dispatch(&self, event: &KeyEvent) -> bool {
        let combo = KeyCombo::from_event(event);
        let matches: Vec<HotkeyHandler> = {
            let state = self.state();
            if !state.enabled || state.destroyed {
                return false;
            }

            let mut matched: Vec<(&HotkeyBinding, usize)> = state
                .bindings
                .iter()
                .enumerate()
                .filter(|(_, b)| {
                    b.enabled && !state.disabled_owners.contains(&b.owner) && b.combo == combo
                })
                .map(|(index, b)| (b, index))
                .collect();
            // Stable: equal priorities keep registration order.
            matched.sort_by_key(|(b, index)| (std::cmp::Reverse(b.priority), *index));
            matched.into_iter().map(|(b, _)| b.handler.clone()).collect()
        };

        if matches.is_empty() {
            log::trace!("no binding matches '{}'", combo);
            return false;
        }

        let mut prevent_default = false;
        for handler in matches {
            if handler(event) {
                prevent_default = true;
            }
        }
        prevent_default
    }

    /// Drops every binding and stops dispatching.
    ///
    /// Safe to call during teardown, including while a dispatch snapshot is
    /// still being delivered; those handlers simply finish their run.
    pub fn destroy(&self) {
        let mut state = self.state();
        state.destroyed = true;
        state.bindings.clear();
        state.disabled_owners.clear();
    }

    /// Number of live bindings
    pub fn binding_count(&self) -> usize {
        self.state().bindings.len()
    }

    fn unregister(&self, id: u64) {
        self.state().bindings.retain(|b| b.id != id);
    }
}

impl Default for KeyboardArbiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`KeyboardArbiter::register`]; removes the binding on
/// demand. Idempotent.
#[derive(Clone)]
pub struct HotkeyGrant {
    arbiter: KeyboardArbiter,
    id: u64,
}

impl HotkeyGrant {
    pub fn unregister(&self) {
        self.arbiter.unregister(self.id);
    }
}
