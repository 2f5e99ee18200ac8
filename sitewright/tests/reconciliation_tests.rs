//! End-to-end behaviour of the tag → extract → merge pipeline and the two
//! stores.

use facet_testhelpers::test;
use sitewright::{
    ChangeKind, EditableElement, EditableMap, ManualEdit, NewVersion, PreviewStore, Styles,
    VersionChanges, VersionStore, extract_editable_content, merge_content_map,
    merge_editable_content, tag_editable,
};

const PAGE: &str = concat!(
    r#"<header class="flex justify-between"><span class="font-bold">Acme</span>"#,
    r#"<nav><a href="/">Home</a></nav></header>"#,
    r#"<main><h1 class="text-5xl">Fast sites</h1>"#,
    r#"<p class="text-gray-600">Built in minutes.</p>"#,
    r#"<div class="editable grid"><h3>Plan</h3><p>Hello</p></div></main>"#
);

fn generated(message: &str, html: &str) -> NewVersion {
    NewVersion {
        message_id: message.into(),
        html: html.into(),
        css: String::new(),
        changes: VersionChanges::generated(ChangeKind::Update, "AI update"),
    }
}

#[test]
fn tagging_twice_is_byte_identical() {
    let once = tag_editable(PAGE).unwrap();
    assert_eq!(tag_editable(&once).unwrap(), once);
    assert_eq!(tag_editable(&tag_editable(&once).unwrap()).unwrap(), once);
}

#[test]
fn extract_then_merge_is_byte_identical() {
    let tagged = tag_editable(PAGE).unwrap();
    let content = extract_editable_content(&tagged);
    assert_eq!(content.len(), 6);
    assert_eq!(merge_content_map(&tagged, &content).unwrap(), tagged);
}

#[test]
fn manual_edit_wins_and_nothing_else_changes() {
    let tagged = tag_editable(PAGE).unwrap();
    let before = extract_editable_content(&tagged);
    assert_eq!(before["editable-5"], "Hello");

    let mut saved = EditableMap::new();
    saved.insert(
        "editable-5".into(),
        EditableElement::new("editable-5", "Goodbye"),
    );
    let merged = merge_editable_content(&tagged, &saved).unwrap();
    let after = extract_editable_content(&merged);

    assert_eq!(after["editable-5"], "Goodbye");
    for (id, text) in &before {
        match id.as_str() {
            "editable-5" => {}
            // the container's text includes the edited paragraph
            "editable-3" => assert_eq!(after[id], "PlanGoodbye"),
            _ => assert_eq!(&after[id], text, "{id} changed"),
        }
    }
    assert_eq!(
        merged,
        tagged.replace(
            r#"<p data-editable-id="editable-5">Hello</p>"#,
            r#"<p data-editable-id="editable-5">Goodbye</p>"#
        )
    );
}

#[test]
fn revert_truncates_history() {
    let mut store = VersionStore::new();
    let v1 = store.add_version(generated("m1", "<p>1</p>"));
    let v2 = store.add_version(generated("m2", "<p>2</p>"));
    store.add_version(generated("m3", "<p>3</p>"));

    assert!(store.revert_to_version(&v2));
    let ids: Vec<&str> = store.versions().iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec![v1.as_str(), v2.as_str()]);
    assert_eq!(store.current_version_id(), Some(v2.as_str()));
}

#[test]
fn ai_change_removes_manual_branch() {
    let mut store = VersionStore::new();
    let v1 = store.add_version(generated("m1", "<p>1</p>"));
    store.add_version(NewVersion {
        message_id: "manual-1".into(),
        html: "<p>edited</p>".into(),
        css: String::new(),
        changes: VersionChanges::manual(
            r#"Updated text "editable-0" to "edited""#,
            vec![ManualEdit {
                id: "editable-0".into(),
                content: "edited".into(),
            }],
        ),
    });
    let v3 = store.add_version(generated("m3", "<p>3</p>"));

    let ids: Vec<&str> = store.versions().iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec![v1.as_str(), v3.as_str()]);
}

#[test]
fn edit_scenario_from_plain_paragraph() {
    let tagged = tag_editable("<p>Old</p>").unwrap();
    assert_eq!(tagged, r#"<p data-editable-id="editable-0">Old</p>"#);

    let content = extract_editable_content(&tagged);
    assert_eq!(content.len(), 1);
    assert_eq!(content["editable-0"], "Old");

    let mut preview = PreviewStore::new();
    preview.update_preview(&tagged, "").unwrap();
    assert!(
        preview
            .update_element("editable-0", "New", Some(Styles::default()))
            .unwrap()
    );
    assert_eq!(preview.html(), r#"<p data-editable-id="editable-0">New</p>"#);

    let map = preview.editable_elements();
    assert_eq!(map.len(), 1);
    assert_eq!(map["editable-0"].content, "New");
    assert_eq!(map["editable-0"].styles, None);
}

#[test]
fn regeneration_preserves_the_edit() {
    let mut preview = PreviewStore::new();
    preview
        .update_preview(r#"<p data-editable-id="editable-0">Old</p>"#, "")
        .unwrap();
    preview.update_element("editable-0", "New", None).unwrap();

    preview
        .update_preview(
            r#"<p data-editable-id="editable-0">Placeholder</p><h1>New Section</h1>"#,
            "h1 { margin: 0 }",
        )
        .unwrap();

    assert_eq!(
        preview.html(),
        r#"<p data-editable-id="editable-0">New</p><h1>New Section</h1>"#
    );
    assert_eq!(preview.css(), "h1 { margin: 0 }");
}

#[test]
fn styled_edit_survives_regeneration_with_new_classes() {
    let mut preview = PreviewStore::new();
    preview
        .update_preview(
            r#"<h1 class="text-4xl font-bold" data-editable-id="editable-0">Hi</h1>"#,
            "",
        )
        .unwrap();
    preview
        .update_element("editable-0", "Hi", Some(Styles::font_size("3rem")))
        .unwrap();

    // the model brings its own size utility back
    preview
        .update_preview(
            r#"<h1 class="text-6xl md:text-7xl tracking-tight" data-editable-id="editable-0">Hello</h1>"#,
            "",
        )
        .unwrap();
    assert_eq!(
        preview.html(),
        r#"<h1 class="tracking-tight" data-editable-id="editable-0" style="font-size: 3rem">Hi</h1>"#
    );
}
