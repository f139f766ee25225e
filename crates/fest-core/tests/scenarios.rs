//! Whole-store walkthroughs: create, plan, and move festivals.

use chrono::{TimeZone, Utc};
use std::fs;

use fest_core::history::read_history;
use fest_core::root::{create_festival, find_root, init_root, list_festivals, reconcile, resolve};
use fest_core::{CancelToken, Registry, Renumberer, Status, StatusEngine, Transition};

#[test]
fn festival_lifecycle_end_to_end() {
    let tmp = tempfile::TempDir::new().expect("tempdir");
    let root = tmp.path().join("festivals");
    init_root(&root).expect("init");
    let march = Utc.with_ymd_and_hms(2025, 3, 2, 8, 30, 0).single().expect("ts");
    let cancel = CancelToken::new();

    let mut registry = Registry::load(&root).expect("load");
    let usable = create_festival(&mut registry, "guild usable", Status::Active, march).expect("create");
    let ui = create_festival(&mut registry, "guild ui", Status::Planned, march).expect("create");
    assert_eq!(usable.id.to_string(), "GU0001");
    assert_eq!(ui.id.to_string(), "GU0002");

    let renumberer = Renumberer::new();
    for (after, name) in [(0, "PLANNING"), (1, "IMPLEMENT"), (2, "REVIEW")] {
        renumberer.insert_phase(&usable.path, after, name, &cancel).expect("phase");
    }
    let planning = usable.path.join("001_PLANNING");
    renumberer
        .insert_sequence(&planning, 0, "existing", &cancel)
        .expect("sequence");
    fs::write(planning.join("01_existing/notes.txt"), "hand written").expect("write");
    renumberer
        .insert_sequence(&planning, 0, "requirements", &cancel)
        .expect("sequence");
    assert!(planning.join("01_requirements").is_dir());
    assert_eq!(
        fs::read_to_string(planning.join("02_existing/notes.txt")).expect("read"),
        "hand written"
    );

    // Discovery from deep inside the tree.
    assert_eq!(find_root(&planning).expect("find"), root);

    let outcome = StatusEngine::new(&root)
        .transition(
            &Transition {
                festival: usable.path.clone(),
                to: Status::Completed,
                note: Some("shipped".into()),
                at: march,
            },
            &cancel,
        )
        .expect("complete");
    assert_eq!(outcome.new_path, root.join("completed/2025-03/guild-usable_GU0001"));
    assert!(!usable.path.exists());
    assert!(outcome.new_path.join("001_PLANNING/02_existing").is_dir());

    let history = read_history(&outcome.new_path).expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].note.as_deref(), Some("shipped"));

    let registry = Registry::load(&root).expect("reload");
    let found = resolve(&root, Some(&registry), "GU0001").expect("resolve");
    assert_eq!(found.path, outcome.new_path);
    assert_eq!(found.status, Status::Completed);
    assert_eq!(found.month.as_deref(), Some("2025-03"));

    let statuses: Vec<_> = list_festivals(&root)
        .expect("list")
        .into_iter()
        .map(|f| (f.dir_name, f.status))
        .collect();
    assert!(statuses.contains(&("guild-ui_GU0002".to_string(), Status::Planned)));
    assert!(statuses.contains(&("guild-usable_GU0001".to_string(), Status::Completed)));
}

#[test]
fn reconcile_repairs_hand_moved_festival() {
    let tmp = tempfile::TempDir::new().expect("tempdir");
    let root = tmp.path().to_path_buf();
    init_root(&root).expect("init");
    let at = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).single().expect("ts");

    let mut registry = Registry::load(&root).expect("load");
    let created = create_festival(&mut registry, "data migration", Status::Planned, at).expect("create");
    let moved = root.join("dungeon").join(created.path.file_name().expect("name"));
    fs::rename(&created.path, &moved).expect("hand move");

    let report = reconcile(&mut registry, at).expect("reconcile");
    assert_eq!(report.updated.len(), 1);
    let entry = registry.get(&created.id).expect("entry");
    assert_eq!(entry.status, Status::Dungeon);
    assert_eq!(registry.absolute_path(entry), moved);
}
