//! End-to-end editor session lifecycle: template metadata in, edits applied,
//! markup and line numbers out.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use texdown_engine::{
    Caret, Cmd, CommandCatalog, EditorSession, Node, SelectionSnapshot, TemplateMeta,
};

const META_JSON: &str = r#"{
    "variables": [
        {"tab": "Title", "name": "author", "label": "Author", "default": "", "type": "text"}
    ],
    "magic_commands": [
        {"label": "Figure", "args": "path:image:|caption:text:untitled", "tab": "Media"},
        {"label": "BeginFigure", "tab": "Formatting", "pairing": "begin", "group": "figure-block"},
        {"label": "EndFigure", "tab": "Formatting", "pairing": "end", "group": "figure-block"}
    ]
}"#;

fn session() -> EditorSession {
    let meta: TemplateMeta = serde_json::from_str(META_JSON).expect("valid template metadata");
    EditorSession::new(CommandCatalog::from_meta(&meta))
}

#[test]
fn paired_insert_into_empty_document_matches_expected_markup() {
    let mut session = session();
    let begin = session.catalog().find("BeginFigure").unwrap().clone();
    session.insert_at_caret(begin, HashMap::new());

    let lines: Vec<String> = session.markup().lines().map(str::to_string).collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("MAGIC:BeginFigure"));
    assert!(lines[1].is_empty());
    assert!(lines[2].contains("MAGIC:EndFigure"));
}

#[test]
fn argument_edit_updates_markup_and_display() {
    let mut session = session();
    let figure = session.catalog().find("Figure").unwrap().clone();
    session.insert_at_caret(figure, HashMap::new());

    let block_id = session.find_block("Figure").unwrap().id;
    session.apply(Cmd::EditArg {
        node: block_id,
        name: "caption".to_string(),
        value: "a rather verbose caption".to_string(),
    });

    assert!(session.markup().contains("caption=a rather verbose caption"));
    let block = session.find_block("Figure").unwrap();
    assert_eq!(block.arg("caption").unwrap().display(), "a rather ver...");
}

#[test]
fn deleting_begin_takes_its_partner_and_restores_blank_document() {
    let mut session = session();
    let begin = session.catalog().find("BeginFigure").unwrap().clone();
    session.insert_at_caret(begin, HashMap::new());

    let begin_id = session.find_block("BeginFigure").unwrap().id;
    let patch = session.apply(Cmd::DeleteBlock { node: begin_id });

    assert_eq!(patch.removed.len(), 2);
    assert!(session.find_block("BeginFigure").is_none());
    assert!(session.find_block("EndFigure").is_none());
    assert_eq!(session.markup(), "");
    assert!(!session.document().nodes().is_empty());
}

#[test]
fn caret_line_tracks_selection_and_feeds_debounced_sync() {
    let mut session = session();
    session.load_markup("one\n\ntwo\n\nthree");
    let third = session
        .document()
        .nodes()
        .iter()
        .filter_map(|n| match n {
            Node::Paragraph(p) if p.text == "three" => Some(p.id),
            _ => None,
        })
        .next()
        .unwrap();

    session.note_selection(SelectionSnapshot::collapsed(Caret {
        node: third,
        offset: 0,
    }));

    let start = Instant::now();
    session.note_sync_activity(start);
    assert_eq!(session.poll_sync(start + Duration::from_millis(100)), None);
    assert_eq!(session.poll_sync(start + Duration::from_secs(1)), Some(4));
}

#[test]
fn restore_cycle_preserves_saved_caret_through_noise() {
    let mut session = session();
    session.load_markup("alpha\n\nbeta");
    let alpha = session.document().nodes()[0].id();
    let beta = session.document().nodes()[2].id();

    session.note_selection(SelectionSnapshot::collapsed(Caret {
        node: beta,
        offset: 2,
    }));

    let plan = session.begin_restore(42.0).expect("no restore in flight");
    assert_eq!(plan.selection.unwrap().start.node, beta);

    // Noise raised while the host re-focuses the surface
    session.note_selection(SelectionSnapshot::collapsed(Caret {
        node: alpha,
        offset: 0,
    }));
    assert_eq!(session.selection().unwrap().start.node, beta);

    assert!(session.complete_restore(plan.token));
    assert_eq!(session.caret_line(), 2);
}
