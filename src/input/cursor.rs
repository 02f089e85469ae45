use std::sync::{Arc, Mutex, MutexGuard};

/// Callback that pushes the effective cursor to the map surface
pub type CursorSink = Arc<dyn Fn(&str) + Send + Sync>;

/// A live claim on the pointer cursor
#[derive(Debug, Clone, PartialEq)]
pub struct CursorEntry {
    pub owner: String,
    pub cursor: String,
    pub priority: i32,
    seq: u64,
}

#[derive(Default)]
struct CursorState {
    entries: Vec<CursorEntry>,
    next_seq: u64,
    applied: String,
    sink: Option<CursorSink>,
}

impl CursorState {
    /// Highest priority wins; on ties the most recent `set` wins.
    fn effective(&self) -> String {
        self.entries
            .iter()
            .max_by_key(|e| (e.priority, e.seq))
            .map(|e| e.cursor.clone())
            .unwrap_or_default()
    }
}

/// Resolves which of several competing owners controls the pointer cursor.
///
/// Owners claim the cursor with [`set`](Self::set); the effective cursor is
/// always the highest-priority live entry's value, or the default (`""`)
/// when no entries are live. Each owner has at most one live entry;
/// re-setting replaces it.
#[derive(Clone, Default)]
pub struct CursorArbiter {
    state: Arc<Mutex<CursorState>>,
}

impl CursorArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CursorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wires the sink that applies the effective cursor to the surface.
    /// The sink is invoked exactly once per effective-cursor change.
    pub fn set_sink<F>(&self, sink: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.state().sink = Some(Arc::new(sink));
    }

    /// Claims the cursor for `owner`. An existing claim by the same owner is
    /// replaced. Returns a grant whose [`release`](CursorGrant::release)
    /// withdraws this claim.
    pub fn set(&self, owner: &str, cursor: &str, priority: i32) -> CursorGrant {
        let seq = {
            let mut state = self.state();
            state.next_seq += 1;
            let seq = state.next_seq;
            state.entries.retain(|e| e.owner != owner);
            state.entries.push(CursorEntry {
                owner: owner.to_string(),
                cursor: cursor.to_string(),
                priority,
                seq,
            });
            seq
        };
        self.apply();

        CursorGrant {
            arbiter: self.clone(),
            owner: owner.to_string(),
            seq,
        }
    }

    /// Withdraws all claims held by `owner`
    pub fn clear(&self, owner: &str) {
        self.state().entries.retain(|e| e.owner != owner);
        self.apply();
    }

    /// Withdraws every claim and restores the default cursor
    pub fn clear_all(&self) {
        self.state().entries.clear();
        self.apply();
    }

    /// The currently effective cursor value (`""` when no claims are live)
    pub fn current(&self) -> String {
        self.state().effective()
    }

    /// Live entries, in claim order
    pub fn entries(&self) -> Vec<CursorEntry> {
        self.state().entries.clone()
    }

    fn release(&self, owner: &str, seq: u64) {
        // Only the exact claim this grant produced is withdrawn; a newer
        // claim by the same owner stays live.
        self.state()
            .entries
            .retain(|e| !(e.owner == owner && e.seq == seq));
        self.apply();
    }

    fn apply(&self) {
        let (changed, sink) = {
            let mut state = self.state();
            let effective = state.effective();
            if state.applied == effective {
                (None, None)
            } else {
                state.applied = effective.clone();
                (Some(effective), state.sink.clone())
            }
        };

        if let (Some(cursor), Some(sink)) = (changed, sink) {
            sink(&cursor);
        }
    }
}

/// Handle returned by [`CursorArbiter::set`].
///
/// `release` is idempotent: calling it any number of times after the first
/// has no further effect and never affects entries of other owners.
#[derive(Clone)]
pub struct CursorGrant {
    arbiter: CursorArbiter,
    owner: String,
    seq: u64,
}

impl CursorGrant {
    pub fn release(&self) {
        self.arbiter.release(&self.owner, self.seq);
    }
}
