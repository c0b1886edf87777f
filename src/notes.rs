use tracing::debug;

use crate::storage::UserStorage;

/// Free-form text persisted under one key.
#[derive(Debug)]
pub struct NotesWidget {
    storage: UserStorage,
    key: String,
    text: String,
}

impl NotesWidget {
    /// Loads the stored text; absent keys start empty.
    pub fn mount(storage: UserStorage, key: impl Into<String>) -> Self {
        let key = key.into();
        let text = storage.get_item(&key).unwrap_or_default();
        debug!(%key, chars = text.chars().count(), "notes mounted");
        Self { storage, key, text }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn on_change(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.storage.set_item(&self.key, Some(&self.text));
    }
}
