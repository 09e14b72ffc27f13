// Session-level tests against the in-memory store.

use std::path::Path;

use longtable_core::{Modifiers, SelectionMode};
use longtable_engine::clipboard::{Clipboard, MemoryClipboard};
use longtable_engine::memory::{MemoryStore, MemoryTable};
use longtable_engine::*;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn three_rows() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert(
        "data.csv",
        MemoryTable::new(&["id", "name"], &[vec!["z", "p"], vec!["a", "q"], vec!["c", "r"]]),
    );
    store
}

fn numbered(n: usize) -> MemoryStore {
    let store = MemoryStore::new();
    let rows: Vec<Vec<String>> = (0..n).map(|i| vec![i.to_string(), format!("v{i}")]).collect();
    store.insert("big.csv", MemoryTable { headers: strings(&["n", "v"]), rows });
    store
}

fn open(store: &MemoryStore, path: &str) -> EditSession<MemoryStore> {
    let mut session = EditSession::new(store.clone(), SessionConfig::default());
    session.open(path, Dialect::default()).unwrap();
    session
}

fn small_window() -> SessionConfig {
    SessionConfig {
        window: WindowConfig {
            memory_budget: 85_334,
            initial_rows: 400,
            ..WindowConfig::default()
        },
        ..SessionConfig::default()
    }
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[test]
fn edit_then_insert_blank_row_then_save() {
    let store = three_rows();
    let mut session = open(&store, "data.csv");
    let mut service = store.clone();

    assert_eq!(session.cell(1, 0).as_str(), "a");
    assert!(session.set_cell(1, 0, "b").unwrap());
    session.insert_row(1, &[]).unwrap();

    assert_eq!(session.overlay().len(), 1);
    assert_eq!(session.overlay().get(PatchKey::new(2, 0)), Some("b"));
    assert_eq!(session.cell(1, 0).as_str(), "");
    assert_eq!(session.row_count(), 4);

    session.save(&mut service, Path::new("out.csv"), &ExportOptions::default()).unwrap();
    let saved = store.table("out.csv").unwrap();
    assert_eq!(saved.headers, strings(&["id", "name"]));
    assert_eq!(
        saved.rows,
        vec![strings(&["z", "p"]), strings(&["", ""]), strings(&["b", "q"]), strings(&["c", "r"])]
    );
}

#[test]
fn save_keeps_session_state() {
    let store = three_rows();
    let mut session = open(&store, "data.csv");
    session.set_cell(0, 1, "edited").unwrap();
    session.save(&mut store.clone(), Path::new("out.csv"), &ExportOptions::default()).unwrap();
    assert!(session.is_modified());
    assert!(session.history().can_undo());
    assert_eq!(store.table("data.csv").unwrap().rows[0][1], "p");
}

#[test]
fn column_ops_and_patches_replay_in_order() {
    let store = three_rows();
    let mut session = open(&store, "data.csv");
    session.insert_column(1, "flag").unwrap();
    session.set_cell(0, 1, "yes").unwrap();
    session.rename_column(0, "ID").unwrap();
    session.delete_column(2).unwrap();
    session
        .insert_row(3, &strings(&["new", "maybe"]))
        .unwrap();

    assert_eq!(session.headers(), &strings(&["ID", "flag"]));
    assert_eq!(session.cell(3, 1).as_str(), "maybe");

    session.save(&mut store.clone(), Path::new("out.csv"), &ExportOptions::default()).unwrap();
    let saved = store.table("out.csv").unwrap();
    assert_eq!(saved.headers, strings(&["ID", "flag"]));
    assert_eq!(
        saved.rows,
        vec![strings(&["z", "yes"]), strings(&["a", ""]), strings(&["c", ""]), strings(&["new", "maybe"])]
    );
}

// ---------------------------------------------------------------------------
// Overlay and history
// ---------------------------------------------------------------------------

#[test]
fn writing_base_value_tombstones() {
    let store = three_rows();
    let mut session = open(&store, "data.csv");
    session.set_cell(2, 1, "changed").unwrap();
    assert!(session.cell(2, 1).is_patched());
    session.set_cell(2, 1, "r").unwrap();
    assert!(session.overlay().is_empty());
    assert_eq!(session.cell(2, 1), CellRead::Base("r"));
    assert!(!session.is_modified());
}

#[test]
fn undo_redo_through_session() {
    let store = three_rows();
    let mut session = open(&store, "data.csv");
    session.set_cell(0, 0, "1").unwrap();
    session.set_cell(0, 0, "2").unwrap();

    assert_eq!(session.undo(), Some(PatchKey::new(0, 0)));
    assert_eq!(session.cell(0, 0).as_str(), "1");
    session.undo();
    assert_eq!(session.cell(0, 0), CellRead::Base("z"));
    assert_eq!(session.undo(), None);
    session.redo();
    session.redo();
    assert_eq!(session.cell(0, 0).as_str(), "2");
}

#[test]
fn history_follows_row_delete() {
    let store = three_rows();
    let mut session = open(&store, "data.csv");
    session.set_cell(0, 0, "gone").unwrap();
    session.set_cell(2, 0, "kept").unwrap();
    session.delete_row(0).unwrap();

    assert_eq!(session.history().undo_len(), 1);
    assert_eq!(session.undo(), Some(PatchKey::new(1, 0)));
    assert_eq!(session.cell(1, 0).as_str(), "c");
}

#[test]
fn set_cell_requires_resident_row() {
    let store = numbered(5_000);
    let mut session = EditSession::new(store.clone(), small_window());
    session.open("big.csv", Dialect::default()).unwrap();
    assert_eq!(session.window().len(), 400);

    let err = session.set_cell(4_000, 0, "x").unwrap_err();
    assert!(matches!(err, EngineError::NotResident { row: 4_000, start: 0, end: 400 }));
    assert_eq!(session.cell(4_000, 0), CellRead::Unknown);
    assert!(matches!(
        session.set_cell(0, 2, "x"),
        Err(EngineError::InvalidIndex { axis: Axis::Column, .. })
    ));
    assert!(session.overlay().is_empty());
}

#[test]
fn invalid_structural_index_changes_nothing() {
    let store = three_rows();
    let mut session = open(&store, "data.csv");
    session.set_cell(1, 1, "x").unwrap();
    assert!(session.delete_row(3).is_err());
    assert!(session.insert_row(5, &[]).is_err());
    assert!(session.delete_column(2).is_err());
    assert_eq!(session.row_count(), 3);
    assert_eq!(session.overlay().get(PatchKey::new(1, 1)), Some("x"));
    assert!(session.edit_script().row_ops.is_empty());
}

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

#[test]
fn scroll_prefetch_moves_window() {
    let store = numbered(10_000);
    let mut session = EditSession::new(store.clone(), small_window());
    session.open("big.csv", Dialect::default()).unwrap();

    let outcome = session.scroll(360, 395).unwrap();
    assert_eq!(outcome, Some(FetchOutcome::Applied { start: 115, rows: 400 }));
    assert_eq!(session.cell(115, 0), CellRead::Base("115"));
    assert_eq!(store.reads(), vec![(0, 400), (115, 400)]);
}

#[test]
fn edits_survive_window_replacement() {
    let store = numbered(10_000);
    let mut session = EditSession::new(store.clone(), small_window());
    session.open("big.csv", Dialect::default()).unwrap();
    session.set_cell(10, 1, "edited").unwrap();

    session.load(5_000).unwrap();
    assert!(!session.window().contains(10));
    assert_eq!(session.cell(10, 1).as_str(), "edited");

    session.load(0).unwrap();
    assert_eq!(session.cell(10, 1), CellRead::Patched("edited"));
}

#[test]
fn stale_fetch_after_reopen_is_discarded() {
    let store = numbered(2_000);
    store.insert(
        "other.csv",
        MemoryTable::new(&["x"], &[vec!["only"]]),
    );
    let mut session = EditSession::new(store.clone(), small_window());
    session.open("big.csv", Dialect::default()).unwrap();

    let request = session.begin_fetch(1_000).unwrap();
    let rows = session.fetch_rows(request);
    assert!(session.begin_fetch(0).is_none());

    session.open("other.csv", Dialect::default()).unwrap();
    let outcome = session.complete_fetch(request, rows).unwrap();
    assert_eq!(outcome, FetchOutcome::Stale);
    assert_eq!(session.headers(), &strings(&["x"]));
    assert_eq!(session.cell(0, 0), CellRead::Base("only"));
    assert_eq!(session.window().len(), 1);
}

#[test]
fn failed_fetch_leaves_window_and_allows_retry() {
    let store = numbered(10_000);
    let mut session = EditSession::new(store.clone(), small_window());
    session.open("big.csv", Dialect::default()).unwrap();

    store.set_fail_reads(true);
    let err = session.scroll(360, 395).unwrap_err();
    assert!(matches!(err, EngineError::Fetch { start: 115, .. }));
    assert_eq!(session.window().start, 0);
    assert!(!session.window_manager().is_loading());

    store.set_fail_reads(false);
    assert!(session.scroll(360, 395).unwrap().is_some());
    assert_eq!(session.window().start, 115);
}

#[test]
fn window_fetch_sees_structural_edits() {
    let store = numbered(1_000);
    let mut session = EditSession::new(store.clone(), small_window());
    session.open("big.csv", Dialect::default()).unwrap();
    session.delete_row(0).unwrap();
    session.insert_row(1, &strings(&["ins", "row"])).unwrap();
    session.insert_column(0, "first").unwrap();

    session.load(0).unwrap();
    assert_eq!(session.cell(0, 1).as_str(), "1");
    assert_eq!(session.cell(1, 1).as_str(), "ins");
    assert_eq!(session.cell(1, 0).as_str(), "");
    assert_eq!(session.cell(2, 1).as_str(), "2");
    assert_eq!(session.row_count(), 1_000);
}

#[test]
fn row_insert_during_fetch_discards_response() {
    let store = three_rows();
    let mut session = open(&store, "data.csv");

    let request = session.begin_fetch(0).unwrap();
    let rows = session.fetch_rows(request);
    session.insert_row(0, &[]).unwrap();

    assert_eq!(session.complete_fetch(request, rows).unwrap(), FetchOutcome::Stale);
    assert!(!session.window_manager().is_loading());
    assert_eq!(session.row_count(), 4);
    assert_eq!(session.window().len(), session.row_count());
    assert_eq!(session.cell(0, 0).as_str(), "");
    assert_eq!(session.cell(1, 0), CellRead::Base("z"));
    assert_eq!(session.cell(3, 0), CellRead::Base("c"));
}

#[test]
fn row_delete_during_fetch_keeps_edits_on_current_rows() {
    let store = three_rows();
    let mut session = open(&store, "data.csv");
    let mut service = store.clone();

    let request = session.begin_fetch(0).unwrap();
    let rows = session.fetch_rows(request);
    session.delete_row(0).unwrap();
    assert_eq!(session.complete_fetch(request, rows).unwrap(), FetchOutcome::Stale);

    assert_eq!(session.cell(0, 0), CellRead::Base("a"));
    assert!(session.set_cell(0, 0, "z").unwrap());
    assert_eq!(session.overlay().get(PatchKey::new(0, 0)), Some("z"));

    session.save(&mut service, Path::new("out.csv"), &ExportOptions::default()).unwrap();
    let saved = store.table("out.csv").unwrap();
    assert_eq!(saved.rows, vec![strings(&["z", "q"]), strings(&["c", "r"])]);
}

#[test]
fn column_insert_during_fetch_discards_old_layout() {
    let store = three_rows();
    let mut session = open(&store, "data.csv");

    let request = session.begin_fetch(0).unwrap();
    let rows = session.fetch_rows(request);
    session.insert_column(0, "first").unwrap();

    assert_eq!(session.complete_fetch(request, rows).unwrap(), FetchOutcome::Stale);
    assert_eq!(session.headers(), &strings(&["first", "id", "name"]));
    assert_eq!(session.cell(0, 0), CellRead::Base(""));
    assert_eq!(session.cell(0, 1), CellRead::Base("z"));
    assert_eq!(session.cell(2, 2), CellRead::Base("r"));

    // The next fetch is resolved against the new layout.
    let request = session.begin_fetch(0).unwrap();
    let rows = session.fetch_rows(request);
    assert!(matches!(
        session.complete_fetch(request, rows).unwrap(),
        FetchOutcome::Applied { .. }
    ));
    assert_eq!(session.cell(1, 1), CellRead::Base("a"));
    assert_eq!(session.cell(1, 0), CellRead::Base(""));
}

#[test]
fn inserted_row_is_truncated_to_column_count() {
    let store = three_rows();
    let mut session = open(&store, "data.csv");
    let mut service = store.clone();

    session.insert_row(3, &strings(&["d", "s", "extra"])).unwrap();
    assert_eq!(session.cell(3, 1).as_str(), "s");
    assert_eq!(session.cell(3, 2).as_str(), "");

    session.save(&mut service, Path::new("out.csv"), &ExportOptions::default()).unwrap();
    let saved = store.table("out.csv").unwrap();
    assert_eq!(saved.rows.last(), Some(&strings(&["d", "s"])));
}

#[test]
fn reopen_resets_everything_together() {
    let store = three_rows();
    let mut session = open(&store, "data.csv");
    session.set_cell(0, 0, "x").unwrap();
    session.insert_column(0, "c").unwrap();
    session.update_selection((1, 1), SelectionMode::Cell, Modifiers::NONE);
    let generation = session.generation();

    session.set_dialect(Dialect::with_delimiter(b';')).unwrap();
    assert!(session.overlay().is_empty());
    assert!(!session.history().can_undo());
    assert!(session.edit_script().is_empty());
    assert!(session.selection().is_empty());
    assert!(session.generation() > generation);
    assert_eq!(store.open_sessions(), 1);

    session.close();
    assert!(!session.is_open());
    assert_eq!(store.open_sessions(), 0);
}

// ---------------------------------------------------------------------------
// Selection, clipboard, rules
// ---------------------------------------------------------------------------

#[test]
fn selection_shrinks_after_delete() {
    let store = three_rows();
    let mut session = open(&store, "data.csv");
    session.update_selection((1, 0), SelectionMode::Cell, Modifiers::NONE);
    session.update_selection((2, 1), SelectionMode::Cell, Modifiers::SHIFT);
    session.delete_row(2).unwrap();
    session.delete_column(1).unwrap();

    let range = session.selection().active_range().copied().unwrap();
    assert_eq!((range.start_row, range.end_row), (1, 1));
    assert_eq!((range.start_col, range.end_col), (0, 0));
}

#[test]
fn copy_and_paste_tsv() {
    let store = three_rows();
    let mut session = open(&store, "data.csv");
    let mut clipboard = MemoryClipboard::new();

    session.update_selection((0, 0), SelectionMode::Cell, Modifiers::NONE);
    session.update_selection((1, 1), SelectionMode::Cell, Modifiers::SHIFT);
    assert_eq!(session.copy_selection(&mut clipboard).unwrap(), 4);
    assert_eq!(clipboard.text(), "z\tp\na\tq");

    session.update_selection((2, 1), SelectionMode::Cell, Modifiers::NONE);
    clipboard.write_text("A\tB\tdropped\r\nC\r\n").unwrap();
    let written = session.paste(&mut clipboard).unwrap();
    assert_eq!(written, 2);
    assert_eq!(session.cell(2, 1).as_str(), "A");
    assert_eq!(session.row_count(), 4);
    assert_eq!(session.cell(3, 1).as_str(), "C");
    assert_eq!(session.cell(3, 0).as_str(), "");

    // Cell edits are undoable, the appended row is not.
    assert_eq!(session.history().undo_len(), 1);
}

#[test]
fn paste_rejects_non_resident_rows_before_writing() {
    let store = numbered(5_000);
    let mut session = EditSession::new(store.clone(), small_window());
    session.open("big.csv", Dialect::default()).unwrap();
    session.update_selection((399, 0), SelectionMode::Cell, Modifiers::NONE);

    let mut clipboard = MemoryClipboard::with_text("a\nb");
    let err = session.paste(&mut clipboard).unwrap_err();
    assert!(matches!(err, EngineError::NotResident { row: 400, .. }));
    assert!(session.overlay().is_empty());
}

#[test]
fn rules_project_resident_rows_and_disable_prefetch() {
    let store = numbered(10_000);
    let mut session = EditSession::new(store.clone(), small_window());
    session.open("big.csv", Dialect::default()).unwrap();

    session.set_rules(
        vec![SortRule { column: 0, direction: SortDirection::Descending }],
        vec![FilterRule {
            column: 1,
            mode: TextFilterMode::StartsWith,
            value: "V39".into(),
            case_sensitive: false,
        }],
    );
    // v39 and v390..v399 among the resident rows 0..400
    assert_eq!(session.visible_row_count(), 11);
    assert_eq!(session.logical_row(0), Some(399));
    assert_eq!(session.logical_row(10), Some(39));
    assert_eq!(session.scroll(0, 10).unwrap(), None);

    session.set_cell(399, 1, "other").unwrap();
    assert_eq!(session.visible_row_count(), 10);

    session.clear_rules();
    assert_eq!(session.visible_row_count(), 10_000);
    assert_eq!(session.logical_row(42), Some(42));
}

// ---------------------------------------------------------------------------
// Whole-file transforms
// ---------------------------------------------------------------------------

#[test]
fn macro_and_find_replace_include_unsaved_edits() {
    let store = three_rows();
    let mut session = open(&store, "data.csv");
    let mut service = store.clone();
    session.set_cell(0, 1, "pp").unwrap();

    let spec = MacroSpec { op: MacroOp::Uppercase, column: 1 };
    let result = session
        .apply_macro(&mut service, Path::new("upper.csv"), &spec, &ExportOptions::default())
        .unwrap();
    assert_eq!(result.applied, 3);
    let upper = store.table("upper.csv").unwrap();
    assert_eq!(upper.rows[0], strings(&["z", "PP"]));

    let spec = FindReplaceSpec { find: "P".into(), replace: "x".into(), ..Default::default() };
    let result = session
        .apply_find_replace(&mut service, Path::new("replaced.csv"), &spec, &ExportOptions::default())
        .unwrap();
    assert_eq!(result.applied, 1);
    assert_eq!(store.table("replaced.csv").unwrap().rows[0], strings(&["z", "xx"]));
}

#[test]
fn invalid_regex_rejected_before_service() {
    let store = three_rows();
    let session = open(&store, "data.csv");
    let spec = FindReplaceSpec { find: "([".into(), regex: true, ..Default::default() };
    let err = session
        .apply_find_replace(&mut store.clone(), Path::new("never.csv"), &spec, &ExportOptions::default())
        .unwrap_err();
    assert!(matches!(err, EngineError::Pattern(_)));
    assert!(store.table("never.csv").is_none());
}

#[test]
fn column_stats_from_service() {
    let store = three_rows();
    let session = open(&store, "data.csv");
    let stats = session.column_stats(&mut store.clone(), 5000).unwrap();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].name, "id");
    assert_eq!(stats[0].distinct, 3);
    assert_eq!(stats[0].inferred, InferredType::Text);
}

#[test]
fn operations_without_a_file() {
    let mut session = EditSession::new(MemoryStore::new(), SessionConfig::default());
    assert!(matches!(
        session.save(&mut MemoryStore::new(), Path::new("x"), &ExportOptions::default()),
        Err(EngineError::NoSession)
    ));
    assert!(session.begin_fetch(0).is_none());
    assert!(matches!(session.set_dialect(Dialect::default()), Err(EngineError::NoSession)));
    assert!(matches!(
        session.open("missing.csv", Dialect::default()),
        Err(EngineError::Open { .. })
    ));
}
