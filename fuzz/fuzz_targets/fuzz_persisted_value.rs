#![no_main]

//! Feed arbitrary stored text and writes through two documents and check
//! that every cell agrees with whatever the store ends up holding.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::rc::Rc;
use tabsync_runtime::{CellOptions, Document, SyncConfig, SyncError, SyncedCell};
use tabsync_storage::{SharedStore, StorageArea, StorageBackend};

#[derive(Arbitrary, Debug)]
enum Step {
    Raw(String),
    RawRemove,
    Set(u8, i32),
    Remove(u8),
}

#[derive(Arbitrary, Debug)]
struct Input {
    seed: Option<String>,
    steps: Vec<Step>,
}

fuzz_target!(|input: Input| {
    let store = SharedStore::new(StorageArea::Local);
    let raw = store.attach();
    if let Some(seed) = &input.seed {
        let _ = raw.set("k", seed);
    }
    let quiet: Rc<dyn Fn(&SyncError)> = Rc::new(|_: &SyncError| {});
    let docs = [
        Document::new(SyncConfig::default()).with_backend(store.attach()),
        Document::new(SyncConfig::default()).with_backend(store.attach()),
    ];
    let cells: Vec<SyncedCell<i32>> = docs
        .iter()
        .map(|d| d.local_cell("k", CellOptions::json().default_value(0).reporter(quiet.clone())))
        .collect();

    for step in input.steps.into_iter().take(64) {
        match step {
            Step::Raw(text) => {
                let _ = raw.set("k", &text);
            }
            Step::RawRemove => {
                let _ = raw.remove("k");
            }
            Step::Set(i, v) => cells[usize::from(i) % cells.len()].set(v),
            Step::Remove(i) => cells[usize::from(i) % cells.len()].remove(),
        }
        // Cells reject malformed text, so only well-formed stored values are
        // required to match.
        if let Some(text) = store.peek("k") {
            if let Ok(Some(stored)) = parse_stored(&text) {
                for cell in &cells {
                    assert_eq!(cell.read(), Some(stored));
                }
            }
        }
    }
});

fn parse_stored(text: &str) -> Result<Option<i32>, ()> {
    use tabsync_storage::{Codec, JsonCodec};
    JsonCodec.parse(text).map_err(|_| ())
}
