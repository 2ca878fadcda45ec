//! Per-operator session state.
//!
//! A session is exactly one [`Stage`]; everything a flow has gathered
//! so far (chosen category, pending batch, page cursor) lives inside
//! the stage variant, so returning to [`Stage::MainMenu`] is all it
//! takes to drop transient data — nothing can leak into the next flow.

use std::collections::HashMap;
use std::sync::Mutex;

/// What the operator is in the middle of doing with a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Add,
    Withdraw,
    Delete,
    History,
}

/// Where the new-format prompt was reached from, so the flow can
/// return there after the format is registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatOrigin {
    /// Mid add-flow: a batch is waiting for its format.
    BatchFlow { category: String, batch: Vec<String> },
    /// The admin format-management screen.
    AdminPanel,
}

/// The conversation stage, with all flow-local data inline.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    MainMenu,
    ChoosingCategory {
        intent: Intent,
    },
    NamingCategory {
        intent: Intent,
    },
    AwaitingBatch {
        category: String,
    },
    ChoosingFormat {
        category: String,
        batch: Vec<String>,
    },
    NamingFormat {
        origin: FormatOrigin,
    },
    ChoosingCount {
        category: String,
    },
    TypingCount {
        category: String,
    },
    BrowsingHistory {
        category: String,
        page: u32,
    },
    AdminMenu,
    ConfirmingWipe,
    ManagingFormats,
    ChoosingFormatToDelete,
    AwaitingCodeAccount,
}

/// Sessions keyed by operator identity.
///
/// The gateway delivers one event at a time per operator, so a plain
/// mutex around the map is enough; the lock is never held across an
/// engine call.
#[derive(Default)]
pub struct SessionRegistry {
    inner: Mutex<HashMap<i64, Stage>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the operator's stage, creating a fresh
    /// `MainMenu` session on first contact.
    pub fn take(&self, operator: i64) -> Stage {
        self.inner
            .lock()
            .expect("session registry poisoned")
            .remove(&operator)
            .unwrap_or_default()
    }

    /// Store the operator's next stage.
    pub fn put(&self, operator: i64, stage: Stage) {
        self.inner
            .lock()
            .expect("session registry poisoned")
            .insert(operator, stage);
    }

    /// Current stage without consuming it (introspection for
    /// transports and tests).
    pub fn stage_of(&self, operator: i64) -> Option<Stage> {
        self.inner
            .lock()
            .expect("session registry poisoned")
            .get(&operator)
            .cloned()
    }

    /// Drop an operator's session entirely.
    pub fn remove(&self, operator: i64) {
        self.inner
            .lock()
            .expect("session registry poisoned")
            .remove(&operator);
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_contact_starts_at_main_menu() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.take(1), Stage::MainMenu);
    }

    #[test]
    fn take_consumes_the_stage() {
        let registry = SessionRegistry::new();
        registry.put(1, Stage::AdminMenu);

        assert_eq!(registry.take(1), Stage::AdminMenu);
        // Second take falls back to a fresh session.
        assert_eq!(registry.take(1), Stage::MainMenu);
    }

    #[test]
    fn operators_do_not_share_sessions() {
        let registry = SessionRegistry::new();
        registry.put(1, Stage::ConfirmingWipe);

        assert_eq!(registry.stage_of(1), Some(Stage::ConfirmingWipe));
        assert_eq!(registry.stage_of(2), None);
        assert_eq!(registry.take(2), Stage::MainMenu);
    }

    #[test]
    fn remove_tears_down_the_session() {
        let registry = SessionRegistry::new();
        registry.put(1, Stage::AdminMenu);
        registry.remove(1);
        assert_eq!(registry.stage_of(1), None);
    }
}
