//! LocalCollectionStore - the in-memory line-item container.
//!
//! The store holds one collection as edited on the client. Mutations never
//! contact the server; they only change local state, which the diff engine
//! later turns into a batch.

use crate::{
    diff::{compute_batch, DiffBatch},
    error::Result,
    Error, Fields, IdentityAllocator, LineItem, LocalId, ServerRecord,
};
use std::collections::HashSet;
use std::fmt;

/// Caller-supplied validation applied to `add` and `edit`.
pub type Validator = Box<dyn Fn(&Fields) -> std::result::Result<(), String> + Send + Sync>;

/// What `remove` did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Persisted item marked for deletion
    Tombstoned,
    /// New item dropped outright (nothing exists server-side)
    Discarded,
    /// Item already tombstoned or absent
    Unchanged,
}

/// Ordered collection of line items owned by one editing context.
pub struct LocalCollectionStore {
    ids: IdentityAllocator,
    items: Vec<LineItem>,
    validator: Option<Validator>,
}

impl fmt::Debug for LocalCollectionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalCollectionStore")
            .field("ids", &self.ids)
            .field("items", &self.items)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl Default for LocalCollectionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalCollectionStore {
    /// Create an empty store that accepts any fields.
    pub fn new() -> Self {
        Self {
            ids: IdentityAllocator::new(),
            items: Vec::new(),
            validator: None,
        }
    }

    /// Create an empty store that validates fields on `add` and `edit`.
    pub fn with_validator<F>(validator: F) -> Self
    where
        F: Fn(&Fields) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        Self {
            validator: Some(Box::new(validator)),
            ..Self::new()
        }
    }

    fn validate(&self, fields: &Fields) -> Result<()> {
        match &self.validator {
            Some(validate) => validate(fields).map_err(Error::InvalidFields),
            None => Ok(()),
        }
    }

    /// Append a new, not yet persisted item.
    pub fn add(&mut self, fields: Fields) -> Result<LineItem> {
        self.validate(&fields)?;
        let item = LineItem::new_local(self.ids.next(), fields);
        self.items.push(item.clone());
        Ok(item)
    }

    /// Replace the fields of an active item.
    ///
    /// Tombstoned items count as absent.
    pub fn edit(&mut self, local_id: LocalId, fields: Fields) -> Result<()> {
        self.validate(&fields)?;
        let item = self
            .items
            .iter_mut()
            .find(|i| i.local_id == local_id && i.is_active())
            .ok_or(Error::NotFound(local_id))?;
        item.fields = fields;
        Ok(())
    }

    /// Remove an item.
    ///
    /// Persisted items are tombstoned so the delete can be computed; new items
    /// are dropped. Removing twice is a no-op.
    pub fn remove(&mut self, local_id: LocalId) -> Removal {
        let Some(index) = self.items.iter().position(|i| i.local_id == local_id) else {
            return Removal::Unchanged;
        };

        let item = &mut self.items[index];
        if item.tombstoned {
            return Removal::Unchanged;
        }
        if item.is_persisted() {
            item.tombstoned = true;
            Removal::Tombstoned
        } else {
            self.items.remove(index);
            Removal::Discarded
        }
    }

    /// Revert a pending deletion.
    ///
    /// Returns `true` if the item was tombstoned.
    pub fn restore(&mut self, local_id: LocalId) -> Result<bool> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.local_id == local_id)
            .ok_or(Error::NotFound(local_id))?;
        let was_tombstoned = item.tombstoned;
        item.tombstoned = false;
        Ok(was_tombstoned)
    }

    /// Wholesale replace the collection with the server's authoritative list.
    ///
    /// Every record gets a fresh local id. The listing must not repeat a
    /// server id; on error the store is left untouched.
    pub fn replace_from_server(
        &mut self,
        records: impl IntoIterator<Item = ServerRecord>,
    ) -> Result<()> {
        let records: Vec<ServerRecord> = records.into_iter().collect();

        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(&record.server_id) {
                return Err(Error::DuplicateServerId(record.server_id.clone()));
            }
        }

        self.items = records
            .into_iter()
            .map(|r| LineItem::persisted(self.ids.next(), r.server_id, r.fields))
            .collect();
        Ok(())
    }

    /// Read-only view of every item, tombstones included, in insertion order.
    pub fn snapshot(&self) -> &[LineItem] {
        &self.items
    }

    /// Items visible to the user.
    pub fn active(&self) -> impl Iterator<Item = &LineItem> {
        self.items.iter().filter(|i| i.is_active())
    }

    /// Look up an item by local id, tombstones included.
    pub fn get(&self, local_id: LocalId) -> Option<&LineItem> {
        self.items.iter().find(|i| i.local_id == local_id)
    }

    /// Count of active items.
    pub fn len(&self) -> usize {
        self.active().count()
    }

    /// Check if the store has no active items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compute the batch that would bring the server in line with this store.
    pub fn compute_batch(&self) -> DiffBatch {
        compute_batch(&self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServerId;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn seeded() -> LocalCollectionStore {
        let mut store = LocalCollectionStore::new();
        store
            .replace_from_server(vec![
                ServerRecord::new(10, fields(json!({"peca_prod": 1, "peca_quan": 2}))),
                ServerRecord::new(11, fields(json!({"peca_prod": 2, "peca_quan": 1}))),
            ])
            .unwrap();
        store
    }

    #[test]
    fn add_assigns_increasing_local_ids() {
        let mut store = LocalCollectionStore::new();
        let a = store.add(fields(json!({"n": 1}))).unwrap();
        let b = store.add(fields(json!({"n": 2}))).unwrap();

        assert_eq!(a.local_id, 1);
        assert_eq!(b.local_id, 2);
        assert!(a.server_id.is_none());
        assert!(!a.tombstoned);
        assert_eq!(store.len(), 2);
        assert_eq!(store.snapshot()[1].fields, fields(json!({"n": 2})));
    }

    #[test]
    fn add_rejected_by_validator() {
        let mut store = LocalCollectionStore::with_validator(|f| {
            if f.contains_key("peca_prod") {
                Ok(())
            } else {
                Err("peca_prod is required".to_string())
            }
        });

        let result = store.add(fields(json!({"peca_quan": 1})));
        assert_eq!(
            result,
            Err(Error::InvalidFields("peca_prod is required".into()))
        );
        assert!(store.is_empty());

        assert!(store.add(fields(json!({"peca_prod": 3}))).is_ok());
    }

    #[test]
    fn edit_replaces_fields() {
        let mut store = seeded();
        let id = store.snapshot()[0].local_id;

        store.edit(id, fields(json!({"peca_prod": 1, "peca_quan": 5}))).unwrap();
        assert_eq!(store.get(id).unwrap().fields["peca_quan"], 5);
    }

    #[test]
    fn edit_missing_item() {
        let mut store = seeded();
        assert_eq!(store.edit(99, Fields::new()), Err(Error::NotFound(99)));
    }

    #[test]
    fn edit_tombstoned_item() {
        let mut store = seeded();
        let id = store.snapshot()[0].local_id;
        store.remove(id);
        assert_eq!(store.edit(id, Fields::new()), Err(Error::NotFound(id)));
    }

    #[test]
    fn remove_persisted_tombstones() {
        let mut store = seeded();
        let id = store.snapshot()[0].local_id;

        assert_eq!(store.remove(id), Removal::Tombstoned);
        assert_eq!(store.snapshot().len(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.get(id).unwrap().tombstoned);
    }

    #[test]
    fn remove_new_discards() {
        let mut store = seeded();
        let item = store.add(fields(json!({"peca_prod": 9}))).unwrap();

        assert_eq!(store.remove(item.local_id), Removal::Discarded);
        assert!(store.get(item.local_id).is_none());
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut once = seeded();
        let mut twice = seeded();
        let id = once.snapshot()[1].local_id;

        once.remove(id);
        twice.remove(id);
        assert_eq!(twice.remove(id), Removal::Unchanged);
        assert_eq!(once.snapshot(), twice.snapshot());

        assert_eq!(twice.remove(1234), Removal::Unchanged);
    }

    #[test]
    fn restore_reverts_tombstone() {
        let mut store = seeded();
        let id = store.snapshot()[0].local_id;
        store.remove(id);

        assert_eq!(store.restore(id), Ok(true));
        assert!(store.get(id).unwrap().is_active());
        assert_eq!(store.restore(id), Ok(false));
        assert_eq!(store.restore(77), Err(Error::NotFound(77)));
    }

    #[test]
    fn replace_assigns_fresh_local_ids() {
        let mut store = seeded();
        let before: Vec<_> = store.snapshot().iter().map(|i| i.local_id).collect();
        store.add(fields(json!({"peca_prod": 3}))).unwrap();

        store
            .replace_from_server(vec![ServerRecord::new(
                12,
                fields(json!({"peca_prod": 3, "peca_tota": 30})),
            )])
            .unwrap();

        let after = store.snapshot();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].server_id, Some(ServerId::Int(12)));
        assert!(!after[0].tombstoned);
        assert!(before.iter().all(|id| *id < after[0].local_id));
    }

    #[test]
    fn replace_rejects_duplicate_server_ids() {
        let mut store = seeded();
        let before = store.snapshot().to_vec();

        let result = store.replace_from_server(vec![
            ServerRecord::new(20, Fields::new()),
            ServerRecord::new(20, Fields::new()),
        ]);

        assert_eq!(result, Err(Error::DuplicateServerId(ServerId::Int(20))));
        assert_eq!(store.snapshot(), before.as_slice());
    }

    #[test]
    fn active_hides_tombstones() {
        let mut store = seeded();
        let id = store.snapshot()[0].local_id;
        store.remove(id);

        let active: Vec<_> = store.active().map(|i| i.local_id).collect();
        assert_eq!(active, vec![store.snapshot()[1].local_id]);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_remove_idempotent(persisted in 0usize..10, fresh in 0usize..10, pick in 0u64..25) {
                let build = || {
                    let mut store = LocalCollectionStore::new();
                    store
                        .replace_from_server((0..persisted).map(|i| ServerRecord::new(i as i64 + 1, Fields::new())))
                        .unwrap();
                    for _ in 0..fresh {
                        store.add(Fields::new()).unwrap();
                    }
                    store
                };

                let mut once = build();
                let mut twice = build();
                once.remove(pick);
                twice.remove(pick);
                prop_assert_eq!(twice.remove(pick), Removal::Unchanged);
                prop_assert_eq!(once.snapshot(), twice.snapshot());
                prop_assert_eq!(once.compute_batch(), twice.compute_batch());
            }
        }
    }
}
