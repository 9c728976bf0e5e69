//! Tests for the locks subsystem.

use super::record;
use super::*;
use crate::config::Config;
use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

/// Create a store over a fresh temporary lock directory.
fn test_store() -> (TempDir, LockStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = LockStore::new(temp_dir.path(), &Config::default());
    (temp_dir, store)
}

/// Write a marker directly with chosen timestamps, bypassing `create_lock`.
fn write_marker_with_times(
    store: &LockStore,
    target_path: &str,
    owner_user: &str,
    created_at: DateTime<Utc>,
    last_seen_at: Option<DateTime<Utc>>,
) -> LockRecord {
    let mut rec = LockRecord::new(
        target_path,
        owner_user,
        "ws-01",
        None,
        false,
        DetectionMethod::Manual,
    );
    rec.created_at = created_at;
    rec.last_seen_at = last_seen_at;

    std::fs::write(store.marker_path(target_path), rec.encode().unwrap()).unwrap();
    rec
}

#[test]
fn test_lock_key_is_deterministic() {
    let key1 = record::lock_key("/shared/projects/bracket.sldprt");
    let key2 = record::lock_key("/shared/projects/bracket.sldprt");
    assert_eq!(key1, key2);
}

#[test]
fn test_lock_key_distinguishes_same_basename() {
    let key1 = record::lock_key("/shared/projects/alpha/bracket.sldprt");
    let key2 = record::lock_key("/shared/projects/beta/bracket.sldprt");

    assert_ne!(key1, key2);
    // Both keys keep the readable file name after the hash prefix.
    assert!(key1.ends_with("_bracket.sldprt"));
    assert!(key2.ends_with("_bracket.sldprt"));
}

#[test]
fn test_marker_file_name_shape() {
    let name = record::marker_file_name("/shared/big assembly.sldasm");

    assert!(name.ends_with(".lock"));
    let (prefix, rest) = name.split_once('_').unwrap();
    assert_eq!(prefix.len(), 16);
    assert!(prefix.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(rest, "big_assembly.sldasm.lock");
}

#[test]
fn test_sanitize_replaces_illegal_characters() {
    assert_eq!(
        record::sanitize_file_name("a\\b/c:d*e?f\"g<h>i|j k.prt"),
        "a_b_c_d_e_f_g_h_i_j_k.prt"
    );
    assert_eq!(record::sanitize_file_name("plain.sldprt"), "plain.sldprt");
}

#[test]
fn test_display_name_handles_both_separators() {
    assert_eq!(record::display_name("/shared/deep/part.sldprt"), "part.sldprt");
    assert_eq!(record::display_name("C:\\vault\\gear.iam"), "gear.iam");
    assert_eq!(record::display_name("loose.dwg"), "loose.dwg");
}

#[test]
fn test_decode_tolerates_unknown_fields() {
    let rec = LockRecord::new(
        "/shared/part.sldprt",
        "alice",
        "ws-01",
        Some(4242),
        false,
        DetectionMethod::Manual,
    );

    let mut value: serde_json::Value = serde_json::from_str(&rec.encode().unwrap()).unwrap();
    value["future_field"] = serde_json::json!({"nested": true});

    let decoded = LockRecord::decode(&value.to_string()).unwrap();
    assert_eq!(decoded.owner_user, "alice");
    assert_eq!(decoded.lock_id, rec.lock_id);
}

#[test]
fn test_decode_fails_closed_on_missing_fields() {
    assert!(LockRecord::decode("{}").is_err());
    assert!(LockRecord::decode("not json at all").is_err());
    assert!(LockRecord::decode("[1, 2, 3]").is_err());
}

#[test]
fn test_decode_defaults_missing_last_seen_to_creation() {
    let rec = LockRecord::new(
        "/shared/part.sldprt",
        "alice",
        "ws-01",
        None,
        false,
        DetectionMethod::Manual,
    );

    let mut value: serde_json::Value = serde_json::from_str(&rec.encode().unwrap()).unwrap();
    value.as_object_mut().unwrap().remove("last_seen_at");

    let decoded = LockRecord::decode(&value.to_string()).unwrap();
    assert_eq!(decoded.last_seen_at, None);
    assert_eq!(decoded.last_activity_at(), decoded.created_at);
}

#[test]
fn test_create_lock_rejects_unsupported_extension() {
    let (_temp_dir, store) = test_store();

    let result = store.create_lock(
        "/shared/notes.txt",
        "alice",
        "ws-01",
        None,
        false,
        DetectionMethod::Manual,
    );

    let err = result.unwrap_err();
    assert!(matches!(err, crate::error::ViseError::UnsupportedFile(_)));
    assert!(err.to_string().contains("notes.txt"));
    // No marker may be left behind.
    assert!(!store.marker_path("/shared/notes.txt").exists());
}

#[test]
fn test_create_then_check_round_trip() {
    let (_temp_dir, store) = test_store();

    let created = store
        .create_lock(
            "/shared/part.sldprt",
            "alice",
            "ws-01",
            Some(4242),
            false,
            DetectionMethod::Manual,
        )
        .unwrap();

    let checked = store.check_lock("/shared/part.sldprt").unwrap().unwrap();
    assert_eq!(checked.target_path, "/shared/part.sldprt");
    assert_eq!(checked.display_name, "part.sldprt");
    assert_eq!(checked.owner_user, "alice");
    assert_eq!(checked.owner_host, "ws-01");
    assert_eq!(checked.process_id, Some(4242));
    assert_eq!(checked.lock_id, created.lock_id);
    assert_eq!(checked.last_seen_at, Some(checked.created_at));
}

#[test]
fn test_create_conflict_reports_current_owner() {
    let (_temp_dir, store) = test_store();

    let original = store
        .create_lock(
            "/shared/part.sldprt",
            "alice",
            "ws-01",
            None,
            false,
            DetectionMethod::Manual,
        )
        .unwrap();

    let result = store.create_lock(
        "/shared/part.sldprt",
        "bob",
        "ws-02",
        None,
        false,
        DetectionMethod::Manual,
    );

    match result.unwrap_err() {
        crate::error::ViseError::Conflict {
            owner_user,
            owner_host,
        } => {
            assert_eq!(owner_user, "alice");
            assert_eq!(owner_host, "ws-01");
        }
        other => panic!("expected Conflict, got {:?}", other),
    }

    // The original lock is untouched.
    let surviving = store.check_lock("/shared/part.sldprt").unwrap().unwrap();
    assert_eq!(surviving.owner_user, "alice");
    assert_eq!(surviving.lock_id, original.lock_id);
}

#[test]
fn test_create_replaces_stale_lock() {
    let (_temp_dir, store) = test_store();

    let old = Utc::now() - Duration::hours(30);
    write_marker_with_times(&store, "/shared/part.sldprt", "alice", old, Some(old));

    let created = store
        .create_lock(
            "/shared/part.sldprt",
            "bob",
            "ws-02",
            None,
            false,
            DetectionMethod::Manual,
        )
        .unwrap();
    assert_eq!(created.owner_user, "bob");

    let checked = store.check_lock("/shared/part.sldprt").unwrap().unwrap();
    assert_eq!(checked.owner_user, "bob");
}

#[test]
fn test_create_respects_recent_heartbeat_on_old_lock() {
    let (_temp_dir, store) = test_store();

    // Created long ago but still heartbeating: not stale, so not evictable.
    write_marker_with_times(
        &store,
        "/shared/part.sldprt",
        "alice",
        Utc::now() - Duration::hours(30),
        Some(Utc::now() - Duration::hours(1)),
    );

    let result = store.create_lock(
        "/shared/part.sldprt",
        "bob",
        "ws-02",
        None,
        false,
        DetectionMethod::Manual,
    );

    assert!(matches!(
        result.unwrap_err(),
        crate::error::ViseError::Conflict { .. }
    ));
}

#[test]
fn test_create_heals_corrupt_marker() {
    let (_temp_dir, store) = test_store();

    let marker = store.marker_path("/shared/part.sldprt");
    std::fs::create_dir_all(marker.parent().unwrap()).unwrap();
    std::fs::write(&marker, "{{{ definitely not json").unwrap();

    let created = store
        .create_lock(
            "/shared/part.sldprt",
            "alice",
            "ws-01",
            None,
            false,
            DetectionMethod::Manual,
        )
        .unwrap();
    assert_eq!(created.owner_user, "alice");
}

#[test]
fn test_remove_lock_by_owner() {
    let (_temp_dir, store) = test_store();

    store
        .create_lock(
            "/shared/part.sldprt",
            "alice",
            "ws-01",
            None,
            false,
            DetectionMethod::Manual,
        )
        .unwrap();

    let removed = store.remove_lock("/shared/part.sldprt", "alice").unwrap();
    assert_eq!(removed.owner_user, "alice");
    assert!(store.check_lock("/shared/part.sldprt").unwrap().is_none());
}

#[test]
fn test_remove_lock_missing_is_not_found() {
    let (_temp_dir, store) = test_store();

    let err = store
        .remove_lock("/shared/part.sldprt", "alice")
        .unwrap_err();
    assert!(matches!(err, crate::error::ViseError::NotFound(_)));
    assert!(err.to_string().contains("no lock found"));
}

#[test]
fn test_remove_lock_wrong_user_is_not_owner() {
    let (_temp_dir, store) = test_store();

    let original = store
        .create_lock(
            "/shared/part.sldprt",
            "alice",
            "ws-01",
            None,
            false,
            DetectionMethod::Manual,
        )
        .unwrap();

    let err = store.remove_lock("/shared/part.sldprt", "bob").unwrap_err();
    assert_eq!(err.to_string(), "lock belongs to alice, not bob");

    // The record is intact.
    let surviving = store.check_lock("/shared/part.sldprt").unwrap().unwrap();
    assert_eq!(surviving.lock_id, original.lock_id);
}

#[test]
fn test_remove_then_recreate_by_other_user() {
    let (_temp_dir, store) = test_store();

    store
        .create_lock(
            "/shared/part.sldprt",
            "alice",
            "ws-01",
            None,
            false,
            DetectionMethod::Manual,
        )
        .unwrap();
    store.remove_lock("/shared/part.sldprt", "alice").unwrap();

    let created = store
        .create_lock(
            "/shared/part.sldprt",
            "bob",
            "ws-02",
            None,
            false,
            DetectionMethod::Manual,
        )
        .unwrap();
    assert_eq!(created.owner_user, "bob");
}

#[test]
fn test_remove_heals_corrupt_marker() {
    let (_temp_dir, store) = test_store();

    let marker = store.marker_path("/shared/part.sldprt");
    std::fs::create_dir_all(marker.parent().unwrap()).unwrap();
    std::fs::write(&marker, "garbage").unwrap();

    let err = store
        .remove_lock("/shared/part.sldprt", "alice")
        .unwrap_err();
    assert!(matches!(err, crate::error::ViseError::NotFound(_)));
    assert!(!marker.exists());
}

#[test]
fn test_check_missing_returns_none() {
    let (_temp_dir, store) = test_store();
    assert!(store.check_lock("/shared/part.sldprt").unwrap().is_none());
}

#[test]
fn test_check_evicts_stale_lock() {
    let (_temp_dir, store) = test_store();

    let old = Utc::now() - Duration::hours(25);
    write_marker_with_times(&store, "/shared/part.sldprt", "alice", old, Some(old));

    assert!(store.check_lock("/shared/part.sldprt").unwrap().is_none());
    assert!(!store.marker_path("/shared/part.sldprt").exists());
}

#[test]
fn test_check_heals_corrupt_marker() {
    let (_temp_dir, store) = test_store();

    let marker = store.marker_path("/shared/part.sldprt");
    std::fs::create_dir_all(marker.parent().unwrap()).unwrap();
    std::fs::write(&marker, "\0\0\0").unwrap();

    assert!(store.check_lock("/shared/part.sldprt").unwrap().is_none());
    assert!(!marker.exists());
}

#[test]
fn test_list_locks_sorted_and_excludes_stale() {
    let (_temp_dir, store) = test_store();

    store
        .create_lock(
            "/shared/b.sldprt",
            "alice",
            "ws-01",
            None,
            false,
            DetectionMethod::Manual,
        )
        .unwrap();
    store
        .create_lock(
            "/shared/a.sldprt",
            "bob",
            "ws-02",
            None,
            false,
            DetectionMethod::Manual,
        )
        .unwrap();

    let old = Utc::now() - Duration::hours(48);
    write_marker_with_times(&store, "/shared/c.sldprt", "carol", old, Some(old));

    let locks = store.list_locks().unwrap();
    let paths: Vec<&str> = locks.iter().map(|l| l.target_path.as_str()).collect();
    assert_eq!(paths, vec!["/shared/a.sldprt", "/shared/b.sldprt"]);

    // The stale marker was evicted during the walk.
    assert!(!store.marker_path("/shared/c.sldprt").exists());
}

#[test]
fn test_list_removes_corrupt_markers() {
    let (_temp_dir, store) = test_store();

    store
        .create_lock(
            "/shared/good.sldprt",
            "alice",
            "ws-01",
            None,
            false,
            DetectionMethod::Manual,
        )
        .unwrap();

    let corrupt = store.lock_dir().join("deadbeefdeadbeef_bad.sldprt.lock");
    std::fs::write(&corrupt, "not json").unwrap();

    let locks = store.list_locks().unwrap();
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0].owner_user, "alice");
    assert!(!corrupt.exists());
}

#[test]
fn test_list_ignores_non_lock_files() {
    let (_temp_dir, store) = test_store();

    store
        .create_lock(
            "/shared/part.sldprt",
            "alice",
            "ws-01",
            None,
            false,
            DetectionMethod::Manual,
        )
        .unwrap();
    std::fs::write(store.lock_dir().join("vise.yaml"), "stale_after_hours: 24\n").unwrap();
    std::fs::write(store.lock_dir().join("README"), "notes").unwrap();

    let locks = store.list_locks().unwrap();
    assert_eq!(locks.len(), 1);
}

#[test]
fn test_list_on_missing_directory_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    let store = LockStore::new(temp_dir.path().join("never-created"), &Config::default());

    assert!(store.list_locks().unwrap().is_empty());
}

#[test]
fn test_sweep_stale_zero_removes_everything_once() {
    let (_temp_dir, store) = test_store();

    for path in ["/shared/a.sldprt", "/shared/b.sldprt", "/shared/c.sldprt"] {
        let past = Utc::now() - Duration::minutes(1);
        write_marker_with_times(&store, path, "alice", past, Some(past));
    }

    assert_eq!(store.sweep_stale(0.0).unwrap(), 3);
    assert_eq!(store.sweep_stale(0.0).unwrap(), 0);
    assert!(store.list_locks().unwrap().is_empty());
}

#[test]
fn test_sweep_stale_respects_threshold() {
    let (_temp_dir, store) = test_store();

    let old = Utc::now() - Duration::hours(3);
    write_marker_with_times(&store, "/shared/old.sldprt", "alice", old, Some(old));
    store
        .create_lock(
            "/shared/fresh.sldprt",
            "bob",
            "ws-02",
            None,
            false,
            DetectionMethod::Manual,
        )
        .unwrap();

    assert_eq!(store.sweep_stale(1.0).unwrap(), 1);

    let remaining = store.list_locks().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].target_path, "/shared/fresh.sldprt");
}

#[test]
fn test_sweep_measures_heartbeat_not_creation() {
    let (_temp_dir, store) = test_store();

    // Created two days ago but refreshed an hour ago: survives a 24h sweep.
    write_marker_with_times(
        &store,
        "/shared/busy.sldprt",
        "alice",
        Utc::now() - Duration::hours(48),
        Some(Utc::now() - Duration::hours(1)),
    );

    assert_eq!(store.sweep_stale(24.0).unwrap(), 0);
    assert_eq!(store.list_locks().unwrap().len(), 1);
}

#[test]
fn test_sweep_stale_counts_corrupt_markers() {
    let (_temp_dir, store) = test_store();

    store
        .create_lock(
            "/shared/good.sldprt",
            "alice",
            "ws-01",
            None,
            false,
            DetectionMethod::Manual,
        )
        .unwrap();
    std::fs::write(store.lock_dir().join("feedface00000000_bad.lock"), "junk").unwrap();

    // Corrupt markers are swept regardless of the age threshold.
    assert_eq!(store.sweep_stale(24.0).unwrap(), 1);
    assert_eq!(store.list_locks().unwrap().len(), 1);
}

#[test]
fn test_remove_all_for_user() {
    let (_temp_dir, store) = test_store();

    store
        .create_lock(
            "/shared/a.sldprt",
            "alice",
            "ws-01",
            None,
            false,
            DetectionMethod::Manual,
        )
        .unwrap();
    store
        .create_lock(
            "/shared/b.sldprt",
            "alice",
            "ws-01",
            None,
            true,
            DetectionMethod::Auto,
        )
        .unwrap();
    store
        .create_lock(
            "/shared/c.sldprt",
            "bob",
            "ws-02",
            None,
            false,
            DetectionMethod::Manual,
        )
        .unwrap();

    assert_eq!(store.remove_all_for_user("alice").unwrap(), 2);

    let remaining = store.list_locks().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].owner_user, "bob");
}

#[test]
fn test_remove_all_heals_corrupt_without_counting() {
    let (_temp_dir, store) = test_store();

    store
        .create_lock(
            "/shared/a.sldprt",
            "alice",
            "ws-01",
            None,
            false,
            DetectionMethod::Manual,
        )
        .unwrap();
    let corrupt = store.lock_dir().join("deadbeefdeadbeef_bad.sldprt.lock");
    std::fs::write(&corrupt, "not json").unwrap();

    // Only alice's decodable lock counts; the corrupt marker is healed in
    // the same walk.
    assert_eq!(store.remove_all_for_user("alice").unwrap(), 1);
    assert!(!corrupt.exists());
    assert!(store.list_locks().unwrap().is_empty());
}

#[test]
fn test_heartbeat_updates_last_seen_only() {
    let (_temp_dir, store) = test_store();

    let created = Utc::now() - Duration::hours(1);
    let original =
        write_marker_with_times(&store, "/shared/part.sldprt", "alice", created, Some(created));

    let updated = store.heartbeat("/shared/part.sldprt", "alice").unwrap();

    assert!(updated.last_activity_at() > original.last_activity_at());
    assert_eq!(updated.created_at, original.created_at);
    assert_eq!(updated.owner_user, original.owner_user);
    assert_eq!(updated.lock_id, original.lock_id);

    // The refreshed timestamp is persisted.
    let on_disk = store.check_lock("/shared/part.sldprt").unwrap().unwrap();
    assert_eq!(on_disk.last_seen_at, updated.last_seen_at);
}

#[test]
fn test_heartbeat_missing_is_not_found() {
    let (_temp_dir, store) = test_store();

    let err = store.heartbeat("/shared/part.sldprt", "alice").unwrap_err();
    assert!(matches!(err, crate::error::ViseError::NotFound(_)));
}

#[test]
fn test_heartbeat_wrong_user_is_not_owner() {
    let (_temp_dir, store) = test_store();

    store
        .create_lock(
            "/shared/part.sldprt",
            "alice",
            "ws-01",
            None,
            false,
            DetectionMethod::Manual,
        )
        .unwrap();

    let err = store.heartbeat("/shared/part.sldprt", "bob").unwrap_err();
    assert!(matches!(err, crate::error::ViseError::NotOwner { .. }));
}

#[test]
fn test_heartbeat_keeps_lock_alive_through_sweep() {
    let (_temp_dir, store) = test_store();

    let old = Utc::now() - Duration::hours(20);
    write_marker_with_times(&store, "/shared/part.sldprt", "alice", old, Some(old));

    store.heartbeat("/shared/part.sldprt", "alice").unwrap();

    assert_eq!(store.sweep_stale(12.0).unwrap(), 0);
    assert!(store.check_lock("/shared/part.sldprt").unwrap().is_some());
}

#[test]
fn test_two_user_analytics_end_to_end() {
    let (_temp_dir, store) = test_store();

    store
        .create_lock(
            "/shared/a.sldprt",
            "alice",
            "ws-01",
            None,
            false,
            DetectionMethod::Manual,
        )
        .unwrap();
    store
        .create_lock(
            "/shared/b.sldasm",
            "bob",
            "ws-02",
            Some(777),
            true,
            DetectionMethod::Auto,
        )
        .unwrap();

    let records = store.list_locks().unwrap();
    let summary = summarize(&records, Utc::now(), Duration::hours(4));

    assert_eq!(summary.total_locks, 2);
    assert_eq!(summary.active_users, vec!["alice", "bob"]);
    assert_eq!(summary.auto_vs_manual, AutoVsManual { auto: 1, manual: 1 });
    assert_eq!(summary.stale_locks, 0);
    assert!(summary.average_lock_age_hours >= 0.0);
}
