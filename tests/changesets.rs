//! ChangeSet Tests
//!
//! - Explicit roots pull in owned records as implicit items
//! - Sync is idempotent and never removes explicit items
//! - Change types are computed on read
//! - Publish is all or nothing and happens once
//! - Revert restores the LIVE pointers recorded at publish

mod common;

use common::*;
use serde_json::json;
use stagegraph::{
    Added, ChangeSetState, ChangeType, EngineError, ErrorCategory, RecordKey, Stage, VersionNumber,
};

// =============================================================================
// Membership
// =============================================================================

#[test]
fn test_explicit_and_implicit_membership() {
    let mut engine = engine();
    let tree = ownership_tree(&mut engine);
    let id = engine.create_changeset(&admin(), "Release").unwrap();

    engine.add_object(&admin(), id, &tree.subclass).unwrap();

    let changeset = engine.changeset(id).unwrap();
    assert_eq!(changeset.description(), "4 items (1 explicit, 3 implicit)");
    let banner = changeset.item(&tree.banner).unwrap();
    assert_eq!(banner.added(), Added::Implicit);
    assert!(banner.referenced_by().contains(&tree.subclass));
}

#[test]
fn test_adding_owned_record_promotes_it() {
    let mut engine = engine();
    let tree = ownership_tree(&mut engine);
    let id = engine.create_changeset(&admin(), "Release").unwrap();
    engine.add_object(&admin(), id, &tree.subclass).unwrap();

    assert!(engine.add_object(&admin(), id, &tree.related).unwrap());

    let changeset = engine.changeset(id).unwrap();
    assert_eq!(changeset.description(), "4 items (2 explicit, 2 implicit)");
    assert_eq!(changeset.item(&tree.related).unwrap().added(), Added::Explicit);
    let attachment = changeset.item(&tree.attachment).unwrap();
    assert_eq!(attachment.referenced_by().len(), 2);
}

#[test]
fn test_remove_object_drops_its_implicit_items() {
    let mut engine = engine();
    let tree = ownership_tree(&mut engine);
    let id = engine.create_changeset(&admin(), "Release").unwrap();
    engine.add_object(&admin(), id, &tree.subclass).unwrap();
    engine.add_object(&admin(), id, &tree.related).unwrap();

    engine.remove_object(&admin(), id, &tree.subclass).unwrap();

    let changeset = engine.changeset(id).unwrap();
    assert_eq!(changeset.description(), "2 items (1 explicit, 1 implicit)");
    assert!(changeset.item(&tree.banner).is_none());
    assert!(changeset.item(&tree.attachment).is_some());

    let err = engine.remove_object(&admin(), id, &tree.banner).unwrap_err();
    assert_eq!(err.code(), "STAGE_CHANGESET_ITEM_NOT_FOUND");
}

#[test]
fn test_sync_is_idempotent() {
    let mut engine = engine();
    let (base, mids) = base_with_mids(&mut engine);
    let id = engine.create_changeset(&admin(), "Release").unwrap();
    engine.add_object(&admin(), id, &base).unwrap();
    let items = engine.changeset(id).unwrap().items().to_vec();

    assert!(engine.sync(&admin(), id).unwrap().is_empty());
    assert!(engine.sync(&admin(), id).unwrap().is_empty());
    assert_eq!(engine.changeset(id).unwrap().items(), items.as_slice());

    // A change to the owned graph makes the changeset stale
    write(&mut engine, &mids[0], &[("BaseID", json!(null))]);
    assert!(!engine.is_synced(id).unwrap());
    let outcome = engine.sync(&admin(), id).unwrap();
    assert_eq!(outcome.removed, vec![mids[0].clone()]);
    assert!(engine.is_synced(id).unwrap());
}

// =============================================================================
// Change types
// =============================================================================

#[test]
fn test_change_types_are_computed_on_read() {
    let mut engine = engine();
    let (base, mids) = base_with_mids(&mut engine);
    engine.publish_recursive(&admin(), &base).unwrap();

    write(&mut engine, &mids[0], &[("Title", json!("Edited"))]);
    engine
        .delete_from_stage(&admin(), &mids[1], Stage::Draft)
        .unwrap();
    let fresh = create(&mut engine, "Mid", &[("BaseID", id(&base))]);

    let id = engine.create_changeset(&admin(), "Release").unwrap();
    engine.add_object(&admin(), id, &base).unwrap();

    let change_of = |key: &RecordKey| {
        engine
            .changes(id)
            .unwrap()
            .into_iter()
            .find(|status| status.item.object() == key)
            .map(|status| status.change)
    };
    assert_eq!(change_of(&base), Some(ChangeType::None));
    assert_eq!(change_of(&mids[0]), Some(ChangeType::Modified));
    // Deleted from draft but still owned on live
    assert_eq!(change_of(&mids[1]), Some(ChangeType::Deleted));
    assert_eq!(change_of(&mids[2]), Some(ChangeType::None));
    assert_eq!(change_of(&fresh), Some(ChangeType::Created));
    assert!(engine.has_changes(id).unwrap());
}

// =============================================================================
// Publish
// =============================================================================

#[test]
fn test_publish_records_before_and_after() {
    let mut engine = engine();
    let (base, mids) = base_with_mids(&mut engine);
    engine.publish_recursive(&admin(), &base).unwrap();
    write(&mut engine, &mids[0], &[("Title", json!("Edited"))]);
    engine
        .delete_from_stage(&admin(), &mids[2], Stage::Draft)
        .unwrap();

    let id = engine.create_changeset(&admin(), "Release").unwrap();
    engine.add_object(&admin(), id, &base).unwrap();
    engine.publish_changeset(&admin(), id).unwrap();

    let changeset = engine.changeset(id).unwrap();
    assert_eq!(changeset.state(), ChangeSetState::Published);
    assert!(changeset.published_at().is_some());

    let edited = changeset.item(&mids[0]).unwrap();
    assert_eq!(edited.version_before(), 1);
    assert_eq!(edited.version_after(), 2);
    assert_eq!(
        field(&engine, &mids[0], Stage::Live, "Title"),
        Some(json!("Edited"))
    );

    let deleted = changeset.item(&mids[2]).unwrap();
    assert_eq!(deleted.version_before(), 1);
    assert_eq!(deleted.version_after(), 0);
    assert!(engine.is_archived(&mids[2]));
    assert!(!engine.has_changes(id).unwrap());
}

#[test]
fn test_publish_leaves_unchanged_items_alone() {
    let mut engine = engine();
    let (base, mids) = base_with_mids(&mut engine);
    engine.publish_recursive(&admin(), &base).unwrap();
    write(&mut engine, &mids[1], &[("Title", json!("Edited"))]);

    let id = engine.create_changeset(&admin(), "Release").unwrap();
    engine.add_object(&admin(), id, &base).unwrap();
    engine.publish_changeset(&admin(), id).unwrap();

    let changeset = engine.changeset(id).unwrap();
    for key in [&base, &mids[0], &mids[2]] {
        let item = changeset.item(key).unwrap();
        assert_eq!(item.version_before(), 1);
        assert_eq!(item.version_after(), 1);
        assert_eq!(engine.versions(key).unwrap().len(), 1);
    }
    let edited = changeset.item(&mids[1]).unwrap();
    assert_eq!((edited.version_before(), edited.version_after()), (1, 2));
}

#[test]
fn test_second_publish_fails_without_mutation() {
    let mut engine = engine();
    let (base, _) = base_with_mids(&mut engine);
    let id = engine.create_changeset(&admin(), "Release").unwrap();
    engine.add_object(&admin(), id, &base).unwrap();
    engine.publish_changeset(&admin(), id).unwrap();
    let before = engine.state().clone();

    let err = engine.publish_changeset(&admin(), id).unwrap_err();

    assert_eq!(err.code(), "STAGE_CHANGESET_CLOSED");
    assert_eq!(err.category(), ErrorCategory::State);
    assert_eq!(engine.state(), &before);
    assert!(engine.add_object(&admin(), id, &base).is_err());
}

#[test]
fn test_publish_orders_sources_before_derived() {
    let mut engine = engine();
    let page = create(&mut engine, "Page", &[("Content", json!("Body"))]);
    let virtual_page = create(&mut engine, "VirtualPage", &[("CopyContentFromID", id(&page))]);

    let id = engine.create_changeset(&admin(), "Release").unwrap();
    engine.add_object(&admin(), id, &virtual_page).unwrap();
    engine.add_object(&admin(), id, &page).unwrap();
    engine.publish_changeset(&admin(), id).unwrap();

    assert!(engine.is_published(&page));
    assert!(engine.is_published(&virtual_page));
    assert_eq!(
        field(&engine, &virtual_page, Stage::Live, "Content"),
        Some(json!("Body"))
    );
}

#[test]
fn test_failed_publish_changes_nothing() {
    let mut engine = engine();
    let (base, mids) = base_with_mids(&mut engine);
    let page = create(&mut engine, "Page", &[("Content", json!("Body"))]);
    let virtual_page = create(&mut engine, "VirtualPage", &[("CopyContentFromID", id(&page))]);

    let id = engine.create_changeset(&admin(), "Release").unwrap();
    engine.add_object(&admin(), id, &base).unwrap();
    engine.add_object(&admin(), id, &virtual_page).unwrap();

    let err = engine.publish_changeset(&admin(), id).unwrap_err();

    assert!(matches!(err, EngineError::SourceNotPublished(_)));
    assert!(!engine.is_published(&base));
    assert!(mids.iter().all(|mid| !engine.is_published(mid)));
    let changeset = engine.changeset(id).unwrap();
    assert_eq!(changeset.state(), ChangeSetState::Open);
    assert!(changeset.items().iter().all(|item| item.version_after() == 0));
    assert_eq!(engine.metrics().rolled_back_transactions(), 1);
}

// =============================================================================
// Revert
// =============================================================================

#[test]
fn test_revert_changeset_restores_previous_live() {
    let mut engine = engine();
    let (base, mids) = base_with_mids(&mut engine);
    engine.publish_recursive(&admin(), &base).unwrap();
    write(&mut engine, &mids[0], &[("Title", json!("Edited"))]);
    let fresh = create(&mut engine, "Mid", &[("BaseID", id(&base))]);

    let id = engine.create_changeset(&admin(), "Release").unwrap();
    engine.add_object(&admin(), id, &base).unwrap();
    engine.publish_changeset(&admin(), id).unwrap();
    assert!(engine.is_published(&fresh));

    engine.revert_changeset(&admin(), id).unwrap();

    assert_eq!(engine.changeset(id).unwrap().state(), ChangeSetState::Reverted);
    assert_eq!(
        engine.current_version(&mids[0], Stage::Live),
        Some(VersionNumber::FIRST)
    );
    assert_eq!(
        field(&engine, &mids[0], Stage::Live, "Title"),
        Some(json!("Mid 1"))
    );
    assert!(!engine.is_published(&fresh));
    // Draft keeps the published edit
    assert_eq!(
        field(&engine, &mids[0], Stage::Draft, "Title"),
        Some(json!("Edited"))
    );

    let err = engine.revert_changeset(&admin(), id).unwrap_err();
    assert_eq!(err.code(), "STAGE_CHANGESET_NOT_PUBLISHED");
}

#[test]
fn test_revert_restores_derived_records_taken_down() {
    let mut engine = engine();
    let page = create(&mut engine, "Page", &[("Content", json!("Body"))]);
    let virtual_page = create(&mut engine, "VirtualPage", &[("CopyContentFromID", id(&page))]);
    engine.publish(&admin(), &page).unwrap();
    engine.publish(&admin(), &virtual_page).unwrap();
    let mirror_live = engine.current_version(&virtual_page, Stage::Live);

    engine
        .delete_from_stage(&admin(), &page, Stage::Draft)
        .unwrap();
    let id = engine.create_changeset(&admin(), "Retire").unwrap();
    engine.add_object(&admin(), id, &page).unwrap();
    engine.publish_changeset(&admin(), id).unwrap();

    assert!(!engine.is_published(&page));
    assert!(!engine.is_published(&virtual_page));
    let changeset = engine.changeset(id).unwrap();
    let mirror = changeset.item(&virtual_page).unwrap();
    assert_eq!(mirror.added(), Added::Implicit);
    assert!(mirror.referenced_by().contains(&page));
    assert_eq!(mirror.live_before(), mirror_live);
    assert_eq!(mirror.version_after(), 0);

    engine.revert_changeset(&admin(), id).unwrap();

    assert!(engine.is_published(&page));
    assert!(engine.is_published(&virtual_page));
    assert_eq!(engine.current_version(&virtual_page, Stage::Live), mirror_live);
}

#[test]
fn test_revert_restores_refreshed_mirror() {
    let mut engine = engine();
    let page = create(&mut engine, "Page", &[("Content", json!("First"))]);
    let virtual_page = create(&mut engine, "VirtualPage", &[("CopyContentFromID", id(&page))]);
    engine.publish(&admin(), &page).unwrap();
    engine.publish(&admin(), &virtual_page).unwrap();

    write(&mut engine, &page, &[("Content", json!("Second"))]);
    let id = engine.create_changeset(&admin(), "Update").unwrap();
    engine.add_object(&admin(), id, &page).unwrap();
    engine.publish_changeset(&admin(), id).unwrap();
    assert_eq!(
        field(&engine, &virtual_page, Stage::Live, "Content"),
        Some(json!("Second"))
    );
    assert!(engine.changeset(id).unwrap().item(&virtual_page).is_some());

    engine.revert_changeset(&admin(), id).unwrap();

    assert_eq!(
        field(&engine, &page, Stage::Live, "Content"),
        Some(json!("First"))
    );
    assert_eq!(
        field(&engine, &virtual_page, Stage::Live, "Content"),
        Some(json!("First"))
    );
}
