use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use scanshelf_domain::DocumentId;

#[derive(Default)]
struct Slot {
    latest: AtomicU64,
    commit: Mutex<()>,
}

/// Tracks the newest render issued per page so that an older render that
/// finishes late cannot overwrite a newer result.
#[derive(Default)]
pub struct GenerationGuard {
    slots: Mutex<HashMap<(DocumentId, u32), Arc<Slot>>>,
}

/// Token for one render of one page.
pub struct Generation {
    slot: Arc<Slot>,
    token: u64,
}

impl GenerationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a token that supersedes every earlier one for the same page.
    pub fn issue(&self, document_id: &DocumentId, index: u32) -> Generation {
        let slot = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((document_id.clone(), index))
            .or_default()
            .clone();
        let token = slot.latest.fetch_add(1, Ordering::SeqCst) + 1;
        Generation { slot, token }
    }
}

impl Generation {
    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn is_current(&self) -> bool {
        self.slot.latest.load(Ordering::SeqCst) == self.token
    }

    /// Runs `commit` under the page's lock if no newer token was issued.
    /// Returns `Ok(None)` when superseded.
    pub fn commit<T, E>(&self, commit: impl FnOnce() -> Result<T, E>) -> Result<Option<T>, E> {
        let _held = self
            .slot
            .commit
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !self.is_current() {
            return Ok(None);
        }
        commit().map(Some)
    }
}
