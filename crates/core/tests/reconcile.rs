use std::collections::HashSet;
use std::fs;
use std::path::Path;
use storage::TagRecord;
use vidprep_core::reconcile::{artifact_owner, prune_artifacts, prune_ledger};
use vidprep_core::report::Reporter;

fn ids(names: &[&str]) -> HashSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn owner_strips_thumb_suffix_or_clip_extension() {
    assert_eq!(artifact_owner(Path::new("a_thumb.jpg")).as_deref(), Some("a"));
    assert_eq!(artifact_owner(Path::new("a.gif")).as_deref(), Some("a"));
    assert_eq!(artifact_owner(Path::new("my_thumb_thumb.jpg")).as_deref(), Some("my_thumb"));
    assert_eq!(artifact_owner(Path::new("b_thumb.gif")).as_deref(), Some("b_thumb"));
}

#[test]
fn ledger_pruning_keeps_only_scanned_ids() {
    let records = vec![
        TagRecord::video("a", vec!["cat".into()]),
        TagRecord::video("gone", vec!["dog".into()]),
    ];
    let reporter = Reporter::default();
    let (kept, removed) = prune_ledger(records, &ids(&["a", "b"]), &reporter);
    assert_eq!(removed, 1);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].media_id, "a");
    assert_eq!(reporter.warnings(), 1);
}

#[test]
fn artifact_pruning_removes_exactly_orphans() {
    let temp = tempfile::tempdir().unwrap();
    let preview = temp.path().join("preview");
    fs::create_dir_all(preview.join("nested")).unwrap();
    for name in ["a_thumb.jpg", "a.gif", "gone_thumb.jpg", "gone.gif"] {
        fs::write(preview.join(name), b"x").unwrap();
    }

    let removed = prune_artifacts(&preview, &ids(&["a"]), &Reporter::default());
    assert_eq!(removed, 2);
    assert!(preview.join("a_thumb.jpg").exists());
    assert!(preview.join("a.gif").exists());
    assert!(!preview.join("gone_thumb.jpg").exists());
    assert!(!preview.join("gone.gif").exists());
    assert!(preview.join("nested").is_dir());
}

#[test]
fn missing_preview_dir_prunes_nothing() {
    let temp = tempfile::tempdir().unwrap();
    assert_eq!(
        prune_artifacts(&temp.path().join("preview"), &ids(&[]), &Reporter::default()),
        0
    );
}
