use proptest::prelude::*;
use std::fs;
use std::path::Path;

use fest_core::scan::scan;
use fest_core::{CancelToken, EntryKind, Renumberer};

#[derive(Debug, Clone)]
enum Op {
    /// Insert after `after % (count + 1)`.
    Insert { after: u32, name: String },
    /// Remove `number % count + 1` when non-empty.
    Remove { number: u32 },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u32..12, "[a-z]{1,6}").prop_map(|(after, name)| Op::Insert { after, name }),
        1 => (0u32..12).prop_map(|number| Op::Remove { number }),
    ]
}

fn arb_kind() -> impl Strategy<Value = EntryKind> {
    prop_oneof![
        Just(EntryKind::Phase),
        Just(EntryKind::Sequence),
        Just(EntryKind::Task),
    ]
}

fn numbers(parent: &Path, kind: EntryKind) -> Vec<u32> {
    scan(parent, kind)
        .expect("scan")
        .into_iter()
        .map(|e| e.number)
        .collect()
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(64))]

    #[test]
    fn numbers_stay_contiguous(kind in arb_kind(), ops in prop::collection::vec(arb_op(), 1..24)) {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let parent = tmp.path();
        let renumberer = Renumberer::new();
        let cancel = CancelToken::new();
        let mut count = 0u32;

        for op in ops {
            match op {
                Op::Insert { after, name } => {
                    let after = after % (count + 1);
                    let outcome = renumberer.insert(parent, kind, after, &name, &cancel).expect("insert");
                    prop_assert_eq!(outcome.number, after + 1);
                    count += 1;
                }
                Op::Remove { number } => {
                    if count == 0 {
                        continue;
                    }
                    renumberer.remove(parent, kind, number % count + 1, &cancel).expect("remove");
                    count -= 1;
                }
            }
            let expected: Vec<u32> = (1..=count).collect();
            prop_assert_eq!(numbers(parent, kind), expected);
        }
    }

    #[test]
    fn insert_preserves_neighbour_content(existing in 1u32..8, after in 0u32..8) {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let parent = tmp.path();
        for n in 1..=existing {
            fs::write(parent.join(format!("{n:02}_t{n}.md")), format!("body {n}")).expect("write");
        }
        let after = after.min(existing);
        Renumberer::new()
            .insert_task(parent, after, "fresh", &CancelToken::new())
            .expect("insert");

        for n in 1..=existing {
            let now = if n > after { n + 1 } else { n };
            let body = fs::read_to_string(parent.join(format!("{now:02}_t{n}.md"))).expect("read");
            prop_assert_eq!(body, format!("body {n}"));
        }
    }
}
