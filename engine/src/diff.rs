//! Diff computation.
//!
//! Partitions a collection snapshot into the create/update/delete batch sent
//! to the server. This is a pure function of the snapshot: the same items
//! always produce the same batch.
//!
//! # Partition
//!
//! | server id | tombstoned | goes to  |
//! |-----------|------------|----------|
//! | absent    | no         | `create` |
//! | present   | no         | `update` |
//! | present   | yes        | `delete` |
//! | absent    | yes        | nowhere  |
//!
//! Updates are always sent for persisted items, changed or not: the engine
//! keeps no baseline to compare against and a full resend is idempotent.

use crate::{Fields, LineItem, ServerId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An update entry: the server id plus the full field set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEntry {
    pub server_id: ServerId,
    pub fields: Fields,
}

/// The create/update/delete partition of one collection snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffBatch {
    /// Fields of new items, in insertion order
    pub create: Vec<Fields>,
    /// Persisted, active items
    pub update: Vec<UpdateEntry>,
    /// Persisted items pending deletion
    pub delete: Vec<ServerId>,
}

impl DiffBatch {
    /// Nothing to send.
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    /// Total number of entries across the three lists.
    pub fn len(&self) -> usize {
        self.create.len() + self.update.len() + self.delete.len()
    }

    /// Entry counts, used as the fallback sync result.
    pub fn counts(&self) -> BatchCounts {
        BatchCounts {
            created: self.create.len(),
            updated: self.update.len(),
            removed: self.delete.len(),
        }
    }
}

/// Created/updated/removed counts of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounts {
    #[serde(rename = "adicionados", alias = "created", default)]
    pub created: usize,
    #[serde(rename = "editados", alias = "updated", default)]
    pub updated: usize,
    #[serde(rename = "removidos", alias = "removed", default)]
    pub removed: usize,
}

/// Compute the batch for a collection snapshot.
///
/// A server id that appears more than once is only emitted for its first
/// occurrence, so ids stay unique within the batch.
pub fn compute_batch(items: &[LineItem]) -> DiffBatch {
    let mut batch = DiffBatch::default();
    let mut seen: HashSet<&ServerId> = HashSet::new();

    for item in items {
        match (&item.server_id, item.tombstoned) {
            (None, false) => batch.create.push(item.fields.clone()),
            (None, true) => {}
            (Some(server_id), tombstoned) => {
                if !seen.insert(server_id) {
                    continue;
                }
                if tombstoned {
                    batch.delete.push(server_id.clone());
                } else {
                    batch.update.push(UpdateEntry {
                        server_id: server_id.clone(),
                        fields: item.fields.clone(),
                    });
                }
            }
        }
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn partitions_example_collection() {
        let a = LineItem::new_local(1, fields(json!({"name": "A"})));
        let b = LineItem::persisted(2, ServerId::Int(10), fields(json!({"name": "B"})));
        let mut c = LineItem::persisted(3, ServerId::Int(11), fields(json!({"name": "C"})));
        c.tombstoned = true;

        let batch = compute_batch(&[a, b, c]);

        assert_eq!(batch.create, vec![fields(json!({"name": "A"}))]);
        assert_eq!(
            batch.update,
            vec![UpdateEntry {
                server_id: ServerId::Int(10),
                fields: fields(json!({"name": "B"})),
            }]
        );
        assert_eq!(batch.delete, vec![ServerId::Int(11)]);
    }

    #[test]
    fn tombstoned_new_item_is_discarded() {
        let mut ghost = LineItem::new_local(1, fields(json!({"name": "ghost"})));
        ghost.tombstoned = true;

        let batch = compute_batch(&[ghost]);
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }

    #[test]
    fn create_keeps_insertion_order() {
        let items: Vec<_> = (1..=5)
            .map(|i| LineItem::new_local(i, fields(json!({"n": i}))))
            .collect();

        let batch = compute_batch(&items);
        let order: Vec<_> = batch.create.iter().map(|f| f["n"].clone()).collect();
        assert_eq!(order, vec![json!(1), json!(2), json!(3), json!(4), json!(5)]);
    }

    #[test]
    fn repeated_server_id_emitted_once() {
        let first = LineItem::persisted(1, ServerId::Int(10), fields(json!({"v": 1})));
        let mut second = LineItem::persisted(2, ServerId::Int(10), fields(json!({"v": 2})));
        second.tombstoned = true;

        let batch = compute_batch(&[first, second]);
        assert_eq!(batch.update.len(), 1);
        assert_eq!(batch.update[0].fields["v"], 1);
        assert!(batch.delete.is_empty());
    }

    #[test]
    fn counts_match_lists() {
        let items = vec![
            LineItem::new_local(1, Fields::new()),
            LineItem::new_local(2, Fields::new()),
            LineItem::persisted(3, ServerId::from("x"), Fields::new()),
        ];
        let counts = compute_batch(&items).counts();
        assert_eq!(
            counts,
            BatchCounts {
                created: 2,
                updated: 1,
                removed: 0
            }
        );
    }

    #[test]
    fn counts_accept_both_spellings() {
        let pt: BatchCounts =
            serde_json::from_value(json!({"adicionados": 1, "editados": 2, "removidos": 3}))
                .unwrap();
        let en: BatchCounts =
            serde_json::from_value(json!({"created": 1, "updated": 2, "removed": 3})).unwrap();
        assert_eq!(pt, en);

        let partial: BatchCounts = serde_json::from_value(json!({"adicionados": 4})).unwrap();
        assert_eq!(partial.created, 4);
        assert_eq!(partial.removed, 0);
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        /// (has server id, tombstoned, field value)
        fn arb_items() -> impl Strategy<Value = Vec<LineItem>> {
            prop::collection::vec((prop::option::of(1i64..20), any::<bool>(), 0u8..10), 0..40)
                .prop_map(|specs| {
                    specs
                        .into_iter()
                        .enumerate()
                        .map(|(i, (server_id, tombstoned, v))| {
                            let mut fields = Fields::new();
                            fields.insert("v".into(), json!(v));
                            LineItem {
                                local_id: i as u64 + 1,
                                server_id: server_id.map(ServerId::Int),
                                fields,
                                tombstoned,
                            }
                        })
                        .collect()
                })
        }

        proptest! {
            #[test]
            fn prop_batch_deterministic(items in arb_items()) {
                prop_assert_eq!(compute_batch(&items), compute_batch(&items.clone()));
            }

            #[test]
            fn prop_partition_complete(items in arb_items()) {
                let batch = compute_batch(&items);

                let creates = items.iter().filter(|i| i.is_new() && !i.tombstoned).count();
                prop_assert_eq!(batch.create.len(), creates);

                let distinct: HashSet<_> = items.iter().filter_map(|i| i.server_id.clone()).collect();
                prop_assert_eq!(batch.update.len() + batch.delete.len(), distinct.len());

                let updated: HashSet<_> = batch.update.iter().map(|u| u.server_id.clone()).collect();
                for id in &batch.delete {
                    prop_assert!(!updated.contains(id));
                }
            }

            #[test]
            fn prop_tombstoned_new_items_never_sent(items in arb_items()) {
                let mut only_ghosts = items;
                for item in &mut only_ghosts {
                    item.server_id = None;
                    item.tombstoned = true;
                }
                prop_assert!(compute_batch(&only_ghosts).is_empty());
            }
        }
    }
}
