use proptest::prelude::*;
use tab_stash::{CollectionOptions, NewTab, StorageData, Timestamp, UrlIndex};
use tab_stash::tab_data::DAY_MS;

const START: Timestamp = 1_700_000_000_000;

#[derive(Debug, Clone)]
enum Op {
    Add(Vec<u8>),
    AddManual(usize, u8),
    RemoveTab(usize),
    MoveTab(usize, usize),
    MoveToMissing(usize),
    RemoveCollection(usize),
    ArchiveTab(usize, bool),
    ArchiveCollection(usize, bool),
    TogglePin(usize),
    Merge(u8, Option<usize>),
    MergeAll,
    Sweep,
}

fn url(n: u8) -> String {
    format!("https://site{}.example.com/", n % 4)
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 1..4).prop_map(Op::Add),
        (any::<usize>(), any::<u8>()).prop_map(|(c, u)| Op::AddManual(c, u)),
        any::<usize>().prop_map(Op::RemoveTab),
        (any::<usize>(), any::<usize>()).prop_map(|(t, c)| Op::MoveTab(t, c)),
        any::<usize>().prop_map(Op::MoveToMissing),
        any::<usize>().prop_map(Op::RemoveCollection),
        (any::<usize>(), any::<bool>()).prop_map(|(t, a)| Op::ArchiveTab(t, a)),
        (any::<usize>(), any::<bool>()).prop_map(|(c, a)| Op::ArchiveCollection(c, a)),
        any::<usize>().prop_map(Op::TogglePin),
        (any::<u8>(), any::<Option<usize>>()).prop_map(|(u, c)| Op::Merge(u, c)),
        Just(Op::MergeAll),
        Just(Op::Sweep),
    ]
}

fn tab_ids(storage: &StorageData) -> Vec<String> {
    storage
        .collections
        .iter()
        .flat_map(|c| c.tabs.iter().map(|t| t.id.clone()))
        .collect()
}

fn pick<T: Clone>(items: &[T], i: usize) -> Option<T> {
    if items.is_empty() { None } else { Some(items[i % items.len()].clone()) }
}

fn collection_id(storage: &StorageData, i: usize) -> Option<String> {
    pick(&storage.collections, i).map(|c| c.id)
}

fn apply(storage: &mut StorageData, op: &Op, now: Timestamp) {
    match op {
        Op::Add(urls) => {
            let tabs = urls.iter().map(|u| NewTab::new(url(*u), format!("Page {u}"))).collect();
            storage.add_collection("Saved", tabs, CollectionOptions::default(), now, 0);
        }
        Op::AddManual(c, u) => {
            if let Some(id) = collection_id(storage, *c) {
                storage.add_manual_tab(&id, "Manual", &url(*u), now);
            }
        }
        Op::RemoveTab(t) => {
            if let Some(id) = pick(&tab_ids(storage), *t) {
                storage.remove_tab(&id, now);
            }
        }
        Op::MoveTab(t, c) => {
            if let (Some(tab), Some(target)) = (pick(&tab_ids(storage), *t), collection_id(storage, *c)) {
                storage.move_tab(&tab, &target, now);
            }
        }
        Op::MoveToMissing(t) => {
            if let Some(id) = pick(&tab_ids(storage), *t) {
                storage.move_tab(&id, "missing-collection", now);
            }
        }
        Op::RemoveCollection(c) => {
            if let Some(id) = collection_id(storage, *c) {
                storage.remove_collection(&id, now);
            }
        }
        Op::ArchiveTab(t, archived) => {
            if let Some(id) = pick(&tab_ids(storage), *t) {
                storage.set_tab_archived(&id, *archived, now);
            }
        }
        Op::ArchiveCollection(c, archived) => {
            if let Some(id) = collection_id(storage, *c) {
                storage.set_collection_archived(&id, *archived, now);
            }
        }
        Op::TogglePin(c) => {
            if let Some(id) = collection_id(storage, *c) {
                storage.toggle_pin(&id);
            }
        }
        Op::Merge(u, target) => {
            let target = target.and_then(|c| collection_id(storage, c));
            storage.merge_duplicates(&url(*u), target.as_deref(), now);
        }
        Op::MergeAll => {
            storage.merge_all_duplicates(now);
        }
        Op::Sweep => {
            storage.archive_old_tabs(now);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn url_index_always_matches_a_full_rescan(ops in prop::collection::vec(op(), 1..40)) {
        let mut storage = StorageData::new();
        for (step, op) in ops.iter().enumerate() {
            apply(&mut storage, op, START + step as Timestamp * 3 * DAY_MS);
            prop_assert_eq!(&storage.url_index, &UrlIndex::rebuild(&storage.collections), "after {:?}", op);
        }
    }

    #[test]
    fn removals_never_leave_empty_unpinned_collections(ops in prop::collection::vec(op(), 1..40)) {
        let mut storage = StorageData::new();
        for (step, op) in ops.iter().enumerate() {
            apply(&mut storage, op, START + step as Timestamp * DAY_MS);
            prop_assert!(
                storage.collections.iter().all(|c| !c.tabs.is_empty() || c.is_pinned),
                "after {:?}", op
            );
        }
    }

    #[test]
    fn merge_all_is_idempotent(ops in prop::collection::vec(op(), 1..30)) {
        let mut storage = StorageData::new();
        for (step, op) in ops.iter().enumerate() {
            apply(&mut storage, op, START + step as Timestamp * DAY_MS);
        }
        let now = START + 100 * DAY_MS;

        storage.merge_all_duplicates(now);
        let after_first = storage.clone();

        prop_assert_eq!(storage.merge_all_duplicates(now), 0);
        prop_assert_eq!(&storage, &after_first);
        prop_assert!(storage.url_index.duplicate_urls().is_empty());
    }

    #[test]
    fn tab_ids_stay_unique(ops in prop::collection::vec(op(), 1..40)) {
        let mut storage = StorageData::new();
        for (step, op) in ops.iter().enumerate() {
            apply(&mut storage, op, START + step as Timestamp * DAY_MS);
        }
        let mut ids = tab_ids(&storage);
        let total = ids.len();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), total);
    }
}
