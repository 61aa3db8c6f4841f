//! Edge case tests for listsync-engine
//!
//! These tests cover boundary conditions and unusual inputs.

use listsync_engine::{
    classify_status, compute_batch, counts_from_response, rejection_messages, BatchCounts,
    Classification, CollectionEndpoint, DrainState, DrainStep, Error, Fields, LineItem,
    LocalCollectionStore, Method, NewOperation, QueueLog, QueueSnapshot, Removal, ServerId,
    ServerRecord,
};
use serde_json::json;

fn fields(value: serde_json::Value) -> Fields {
    value.as_object().cloned().unwrap()
}

fn pecas() -> CollectionEndpoint {
    CollectionEndpoint::new("Os/pecas")
        .with_id_field("peca_item")
        .with_scope("peca_empr", 1)
        .with_scope("peca_fili", 1)
        .with_scope("peca_os", 123)
}

// ============================================================================
// Store Edge Cases
// ============================================================================

#[test]
fn empty_store_produces_empty_batch() {
    let store = LocalCollectionStore::new();
    let batch = store.compute_batch();
    assert!(batch.is_empty());

    let request = pecas().build_request(&batch);
    assert!(request.adicionar.is_empty());
    assert!(request.editar.is_empty());
    assert!(request.remover.is_empty());
}

#[test]
fn add_then_remove_leaves_no_trace() {
    let mut store = LocalCollectionStore::new();
    let item = store.add(fields(json!({"peca_prod": 1}))).unwrap();
    assert_eq!(store.remove(item.local_id), Removal::Discarded);

    assert!(store.snapshot().is_empty());
    assert!(store.compute_batch().is_empty());
}

#[test]
fn local_ids_not_reused_after_discard() {
    let mut store = LocalCollectionStore::new();
    let first = store.add(Fields::new()).unwrap();
    store.remove(first.local_id);
    let second = store.add(Fields::new()).unwrap();
    assert!(second.local_id > first.local_id);
}

#[test]
fn unicode_fields_pass_through() {
    let names = ["óleo 15W40", "日本語", "🎉", "Tab\tNew\nLine"];
    let mut store = LocalCollectionStore::new();
    for name in names {
        store.add(fields(json!({"peca_desc": name}))).unwrap();
    }

    let batch = store.compute_batch();
    let sent: Vec<_> = batch.create.iter().map(|f| f["peca_desc"].clone()).collect();
    let expected: Vec<_> = names.iter().map(|n| json!(n)).collect();
    assert_eq!(sent, expected);
}

#[test]
fn integer_boundaries_as_server_ids() {
    let mut store = LocalCollectionStore::new();
    store
        .replace_from_server(vec![
            ServerRecord::new(i64::MIN, Fields::new()),
            ServerRecord::new(i64::MAX, Fields::new()),
            ServerRecord::new(0, Fields::new()),
        ])
        .unwrap();

    let ids: Vec<_> = store
        .compute_batch()
        .update
        .into_iter()
        .map(|u| u.server_id)
        .collect();
    assert_eq!(
        ids,
        vec![ServerId::Int(i64::MIN), ServerId::Int(i64::MAX), ServerId::Int(0)]
    );
}

#[test]
fn replace_with_empty_listing_clears_store() {
    let mut store = LocalCollectionStore::new();
    store.add(Fields::new()).unwrap();
    store.replace_from_server(Vec::new()).unwrap();
    assert!(store.is_empty());
    assert!(store.snapshot().is_empty());
}

// ============================================================================
// Example Scenarios
// ============================================================================

#[test]
fn scenario_create_update_delete() {
    let mut store = LocalCollectionStore::new();
    store
        .replace_from_server(vec![
            ServerRecord::new(10, fields(json!({"name": "B"}))),
            ServerRecord::new(11, fields(json!({"name": "C"}))),
        ])
        .unwrap();
    store.add(fields(json!({"name": "A"}))).unwrap();

    let c = store
        .snapshot()
        .iter()
        .find(|i| i.server_id == Some(ServerId::Int(11)))
        .map(|i| i.local_id)
        .unwrap();
    assert_eq!(store.remove(c), Removal::Tombstoned);

    let batch = store.compute_batch();
    assert_eq!(batch.create, vec![fields(json!({"name": "A"}))]);
    assert_eq!(batch.update.len(), 1);
    assert_eq!(batch.update[0].server_id, ServerId::Int(10));
    assert_eq!(batch.delete, vec![ServerId::Int(11)]);

    // Server acknowledges and returns the authoritative list
    store
        .replace_from_server(vec![
            ServerRecord::new(10, fields(json!({"name": "B"}))),
            ServerRecord::new(12, fields(json!({"name": "A"}))),
        ])
        .unwrap();

    assert!(store.snapshot().iter().all(|i| !i.tombstoned));
    assert_eq!(store.len(), 2);
    assert_eq!(store.get(c), None);
}

#[test]
fn deleting_last_item_sends_only_removal() {
    let mut store = LocalCollectionStore::new();
    store
        .replace_from_server(vec![ServerRecord::new(10, Fields::new())])
        .unwrap();
    let id = store.snapshot()[0].local_id;
    store.remove(id);

    let request = pecas().build_request(&store.compute_batch());
    assert!(request.adicionar.is_empty());
    assert!(request.editar.is_empty());
    assert_eq!(request.remover.len(), 1);
    assert_eq!(request.remover[0]["peca_item"], 10);
    assert_eq!(request.remover[0]["peca_os"], 123);
}

#[test]
fn restore_before_save_keeps_update() {
    let mut store = LocalCollectionStore::new();
    store
        .replace_from_server(vec![ServerRecord::new("abc", fields(json!({"q": 1})))])
        .unwrap();
    let id = store.snapshot()[0].local_id;
    store.remove(id);
    store.restore(id).unwrap();

    let batch = compute_batch(store.snapshot());
    assert!(batch.delete.is_empty());
    assert_eq!(batch.update[0].server_id, ServerId::from("abc"));
}

// ============================================================================
// Wire Edge Cases
// ============================================================================

#[test]
fn listing_roundtrip_into_store() {
    let body = json!([
        {"peca_item": 1, "peca_prod": 5, "peca_quan": 2},
        {"peca_item": 2, "peca_prod": 6, "peca_quan": 1}
    ]);
    let mut store = LocalCollectionStore::new();
    store
        .replace_from_server(pecas().parse_records(&body).unwrap())
        .unwrap();

    let request = pecas().build_request(&store.compute_batch());
    assert_eq!(request.editar.len(), 2);
    assert_eq!(request.editar[0]["peca_item"], 1);
    assert_eq!(request.editar[1]["peca_quan"], 1);
}

#[test]
fn listing_with_repeated_id_rejected() {
    let body = json!([{"peca_item": 1}, {"peca_item": 1}]);
    let records = pecas().parse_records(&body).unwrap();
    let mut store = LocalCollectionStore::new();
    assert_eq!(
        store.replace_from_server(records),
        Err(Error::DuplicateServerId(ServerId::Int(1)))
    );
}

#[test]
fn listing_with_float_id_rejected() {
    let body = json!([{"id": 1.5}]);
    assert_eq!(
        CollectionEndpoint::new("x").parse_records(&body),
        Err(Error::MissingServerId("id".into()))
    );
}

#[test]
fn counts_prefer_server_response() {
    let fallback = BatchCounts {
        created: 1,
        updated: 0,
        removed: 0,
    };
    let body = json!({"adicionados": 1, "editados": 3, "removidos": 2});
    assert_eq!(
        counts_from_response(Some(&body), fallback),
        BatchCounts {
            created: 1,
            updated: 3,
            removed: 2
        }
    );
}

// ============================================================================
// Classification and Drain Edge Cases
// ============================================================================

#[test]
fn classification_boundaries() {
    assert_eq!(classify_status(199), Classification::Transient);
    assert_eq!(classify_status(200), Classification::Delivered);
    assert_eq!(classify_status(299), Classification::Delivered);
    assert_eq!(classify_status(300), Classification::Transient);
    assert_eq!(classify_status(399), Classification::Transient);
    assert_eq!(classify_status(400), Classification::Rejected);
    assert_eq!(classify_status(401), Classification::Transient);
    assert_eq!(classify_status(402), Classification::Rejected);
    assert_eq!(classify_status(499), Classification::Rejected);
    assert_eq!(classify_status(500), Classification::Transient);
    assert_eq!(classify_status(599), Classification::Transient);
}

#[test]
fn rejection_with_empty_detalhes_falls_through() {
    let body = json!({"detalhes": [], "detail": "bloqueado"});
    assert_eq!(rejection_messages(&body), vec!["bloqueado".to_string()]);
}

#[test]
fn two_queued_operations_second_waits() {
    let mut log = QueueLog::new();
    for id in ["first", "second"] {
        let op = log.prepare(
            NewOperation::new(id, "Os/pecas/update-lista/", Method::Post, json!({})),
            1000,
        );
        log.commit(op);
    }

    let state = DrainState::Idle.begin().unwrap();
    assert!(state.is_draining());

    let oldest = log.oldest().unwrap();
    assert_eq!(oldest.sequence, 1);
    assert_eq!(
        DrainStep::from(classify_status(503)),
        DrainStep::Halt,
        "transient failure must halt on the oldest entry"
    );
    let bumped = log.with_attempt(oldest.sequence).unwrap();
    log.update(bumped);

    assert_eq!(log.oldest().unwrap().op_id, "first");
    assert_eq!(log.oldest().unwrap().attempts, 1);
    assert_eq!(log.get(2).unwrap().attempts, 0);
}

#[test]
fn queue_survives_snapshot_restart() {
    let mut log = QueueLog::new();
    for id in ["a", "b"] {
        let op = log.prepare(
            NewOperation::new(id, "Os/pecas/update-lista/", Method::Post, json!({"op": id})),
            1000,
        );
        log.commit(op);
    }
    let json = QueueSnapshot::from_log(&log).to_json().unwrap();
    drop(log);

    let mut restored = QueueSnapshot::from_json(&json).unwrap().into_log().unwrap();
    assert_eq!(restored.oldest().unwrap().payload, json!({"op": "a"}));
    restored.remove(1);
    assert_eq!(restored.oldest().unwrap().payload, json!({"op": "b"}));
}

#[test]
fn tombstoned_and_new_same_collection() {
    let mut ghost = LineItem::new_local(1, Fields::new());
    ghost.tombstoned = true;
    let mut gone = LineItem::persisted(2, ServerId::Int(5), Fields::new());
    gone.tombstoned = true;

    let batch = compute_batch(&[ghost, gone]);
    assert!(batch.create.is_empty());
    assert_eq!(batch.delete, vec![ServerId::Int(5)]);
}
