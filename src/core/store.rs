use parking_lot::Mutex;
use std::collections::HashMap;

use crate::types::{Comment, User};

/// An entity a [`EntityStore`] can hold, keyed by id within a scope.
pub trait StoreEntity: Clone {
    fn entity_id(&self) -> Option<&str>;

    /// Nested children to flatten into the same scope as independent
    /// entries. Implementations move the children out, leaving only their
    /// ids behind on the parent. The default has no children.
    fn split_children(&mut self) -> Vec<Self> {
        Vec::new()
    }
}

impl StoreEntity for Comment {
    fn entity_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn split_children(&mut self) -> Vec<Self> {
        let replies = std::mem::take(&mut self.replies);
        self.reply_ids = replies
            .iter()
            .filter_map(|reply| reply.id.clone())
            .collect();
        replies
    }
}

impl StoreEntity for User {
    fn entity_id(&self) -> Option<&str> {
        self.key()
    }
}

/// Scoped entity map: scope (post id) -> entity id -> entity.
///
/// Writes are last-write-wins whole-entity replacement. Nested children are
/// flattened recursively into the same scope, so a stored parent never owns
/// nested child structs. One non-reentrant lock guards the maps; the lock is
/// never held while caller code runs.
pub struct EntityStore<T> {
    scopes: Mutex<HashMap<String, HashMap<String, T>>>,
}

pub type CommentStore = EntityStore<Comment>;
pub type UserStore = EntityStore<User>;

impl<T: StoreEntity> EntityStore<T> {
    pub fn new() -> Self {
        Self {
            scopes: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: &str, scope: &str) -> Option<T> {
        self.scopes.lock().get(scope)?.get(id).cloned()
    }

    /// Merge entities into `scope` by id. Entities without an id are skipped.
    pub fn set(&self, entities: Vec<T>, scope: &str) {
        let mut scopes = self.scopes.lock();
        let entries = scopes.entry(scope.to_string()).or_default();
        for entity in entities {
            insert_flattened(entries, entity);
        }
    }

    /// Scopes currently holding at least one entity.
    pub fn scopes(&self) -> Vec<String> {
        self.scopes.lock().keys().cloned().collect()
    }

    pub fn count(&self, scope: &str) -> usize {
        self.scopes
            .lock()
            .get(scope)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    pub fn clean_cache(&self) {
        self.scopes.lock().clear();
    }
}

impl<T: StoreEntity> Default for EntityStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

// Runs under the store lock; recursion stays lock-free.
fn insert_flattened<T: StoreEntity>(entries: &mut HashMap<String, T>, mut entity: T) {
    let children = entity.split_children();
    if let Some(id) = entity.entity_id().map(str::to_string) {
        entries.insert(id, entity);
    }
    for child in children {
        insert_flattened(entries, child);
    }
}
