use std::collections::HashMap;

use insta::assert_json_snapshot;
use tempfile::TempDir;

use noteweave_index::{
    CreateDocumentRequest, IndexEngine, IndexError, IndexSettings, UpdateDocumentRequest,
};

async fn setup_with(settings: IndexSettings) -> (IndexEngine, TempDir) {
    let temp = TempDir::new().expect("tempdir");
    let settings = IndexSettings {
        root_override: Some(temp.path().join("notes")),
        ..settings
    };
    let engine = IndexEngine::open(settings).await.expect("open engine");
    (engine, temp)
}

async fn setup() -> (IndexEngine, TempDir) {
    setup_with(IndexSettings::default()).await
}

fn doc(title: &str, content: &str, folder: Option<&str>) -> CreateDocumentRequest {
    CreateDocumentRequest {
        title: title.to_string(),
        content: content.to_string(),
        folder: folder.map(str::to_string),
    }
}

fn content_update(content: &str, new_title: Option<&str>) -> UpdateDocumentRequest {
    UpdateDocumentRequest {
        content: content.to_string(),
        new_title: new_title.map(str::to_string),
    }
}

async fn backlinks_by_title(engine: &IndexEngine, folder: Option<&str>) -> HashMap<String, Vec<String>> {
    engine
        .list_documents(folder)
        .await
        .expect("list documents")
        .into_iter()
        .map(|d| (d.title, d.backlinks))
        .collect()
}

/// Edges as (source title, target title), sorted.
async fn edges(engine: &IndexEngine) -> Vec<(String, String)> {
    let graph = engine.get_graph(false).await.expect("graph");
    let titles: HashMap<u64, String> = graph
        .nodes
        .values()
        .map(|n| (n.id, n.title.clone()))
        .collect();
    let mut edges: Vec<(String, String)> = graph
        .edges
        .iter()
        .map(|e| (titles[&e.source].clone(), titles[&e.target].clone()))
        .collect();
    edges.sort();
    edges
}

fn edge(a: &str, b: &str) -> (String, String) {
    (a.to_string(), b.to_string())
}

#[tokio::test]
async fn test_note_a_note_b_rename_scenario() {
    let (engine, temp) = setup().await;
    engine
        .create_document(doc("Note A", "See [[Note B]]", Some("default")))
        .await
        .unwrap();
    engine
        .create_document(doc("Note B", "No links", Some("default")))
        .await
        .unwrap();

    let backlinks = backlinks_by_title(&engine, Some("default")).await;
    assert_eq!(backlinks["Note B"], vec!["Note A"]);
    assert!(backlinks["Note A"].is_empty());
    assert_eq!(edges(&engine).await, vec![edge("Note A", "Note B")]);

    let outcome = engine
        .update_document(
            Some("default"),
            "Note B",
            content_update("No links", Some("Note B2")),
        )
        .await
        .unwrap();
    assert_eq!(outcome.document.title, "Note B2");
    assert_eq!(outcome.document.filename, "Note B2.md");
    let report = outcome.cascade.expect("rename reports its cascade");
    assert_eq!(report.rewritten, vec!["Note A.md"]);
    assert!(report.is_clean());

    let note_a = tokio::fs::read_to_string(temp.path().join("notes/default/Note A.md"))
        .await
        .unwrap();
    assert!(note_a.contains("[[Note B2]]"));
    assert!(!temp.path().join("notes/default/Note B.md").exists());

    assert_eq!(
        engine.list_titles(Some("default")).await.unwrap(),
        vec!["Note A", "Note B2"]
    );
    assert!(matches!(
        engine.get_document(Some("default"), "note b").await,
        Err(IndexError::NotFound { .. })
    ));

    assert_json_snapshot!(engine.get_graph(false).await.unwrap(), @r###"
    {
      "nodes": {
        "default/Note A.md": {
          "id": 0,
          "title": "Note A",
          "folder": "default",
          "filename": "Note A.md",
          "tags": [],
          "neighbors": [
            "Note B2"
          ],
          "backLinks": [],
          "size": 6,
          "color": "#9ca3af"
        },
        "default/Note B2.md": {
          "id": 1,
          "title": "Note B2",
          "folder": "default",
          "filename": "Note B2.md",
          "tags": [],
          "neighbors": [
            "Note A"
          ],
          "backLinks": [
            "Note A"
          ],
          "size": 6,
          "color": "#60a5fa"
        }
      },
      "edges": [
        {
          "source": 0,
          "target": 1
        }
      ]
    }
    "###);
}

#[tokio::test]
async fn test_backlinks_are_order_independent() {
    let (engine, _temp) = setup().await;
    engine.create_document(doc("A", "[[B]]", None)).await.unwrap();
    engine.create_document(doc("B", "", None)).await.unwrap();
    engine.create_document(doc("D", "", None)).await.unwrap();
    engine.create_document(doc("C", "[[D]]", None)).await.unwrap();

    let backlinks = backlinks_by_title(&engine, Some("default")).await;
    assert_eq!(backlinks["B"], vec!["A"]);
    assert_eq!(backlinks["D"], vec!["C"]);
    assert_eq!(edges(&engine).await, vec![edge("A", "B"), edge("C", "D")]);
}

#[tokio::test]
async fn test_rename_preserves_graph_connectivity() {
    let (engine, temp) = setup().await;
    engine.create_document(doc("A", "[[B|the b]]", None)).await.unwrap();
    engine.create_document(doc("B", "[[C]]", None)).await.unwrap();
    engine.create_document(doc("C", "", None)).await.unwrap();

    engine.rename_document(None, "B", "B2").await.unwrap();

    assert_eq!(edges(&engine).await, vec![edge("A", "B2"), edge("B2", "C")]);
    let graph = engine.get_graph(false).await.unwrap();
    assert_eq!(graph.nodes.len(), 3);
    assert_eq!(graph.edges.len(), 2);

    let a = tokio::fs::read_to_string(temp.path().join("notes/default/A.md"))
        .await
        .unwrap();
    assert_eq!(a, "[[B2|the b]]");

    // A rebuild from disk agrees with the incremental result.
    engine.get_graph(true).await.unwrap();
    assert_eq!(edges(&engine).await, vec![edge("A", "B2"), edge("B2", "C")]);
}

#[tokio::test]
async fn test_delete_does_not_orphan_unrelated_edges() {
    let (engine, temp) = setup().await;
    for (title, content) in [("A", "[[B]]"), ("B", ""), ("C", "[[D]]"), ("D", "")] {
        engine.create_document(doc(title, content, None)).await.unwrap();
    }

    let deleted = engine.delete_document(None, "B", false).await.unwrap();
    assert_eq!(deleted.trash_filename.as_deref(), Some("B.md"));
    assert!(temp.path().join("notes/.trash/B.md").exists());

    assert_eq!(edges(&engine).await, vec![edge("C", "D")]);
    let a = engine.get_document(Some("default"), "A").await.unwrap();
    assert_eq!(a.links, vec!["B"]);
    assert!(engine.get_graph(false).await.unwrap().nodes["default/A.md"].neighbors.is_empty());
}

#[tokio::test]
async fn test_folder_isolation() {
    let (engine, _temp) = setup().await;
    engine.create_document(doc("Plan", "[[Todo]]", Some("work"))).await.unwrap();
    engine.create_document(doc("Todo", "", Some("work"))).await.unwrap();
    engine.create_document(doc("Plan", "", Some("home"))).await.unwrap();
    engine.create_document(doc("Todo", "", Some("home"))).await.unwrap();

    assert_eq!(backlinks_by_title(&engine, Some("work")).await["Todo"], vec!["Plan"]);
    assert!(backlinks_by_title(&engine, Some("home")).await["Todo"].is_empty());

    engine.rename_document(Some("home"), "Plan", "Home Plan").await.unwrap();
    assert_eq!(engine.list_titles(Some("work")).await.unwrap(), vec!["Plan", "Todo"]);
    assert_eq!(backlinks_by_title(&engine, Some("work")).await["Todo"], vec!["Plan"]);

    engine.delete_document(Some("work"), "Todo", true).await.unwrap();
    assert_eq!(
        engine.list_titles(Some("home")).await.unwrap(),
        vec!["Home Plan", "Todo"]
    );
    assert!(engine.get_document(Some("home"), "Todo").await.is_ok());
}

#[tokio::test]
async fn test_legacy_listing_uses_global_backlinks() {
    let (engine, _temp) = setup().await;
    engine.create_document(doc("Target", "", None)).await.unwrap();
    engine.create_document(doc("Source", "[[target]]", Some("work"))).await.unwrap();

    assert!(backlinks_by_title(&engine, Some("default")).await["Target"].is_empty());
    assert_eq!(backlinks_by_title(&engine, None).await["Target"], vec!["Source"]);
    assert_eq!(
        engine.get_document(None, "Target").await.unwrap().backlinks,
        vec!["Source"]
    );
}

#[tokio::test]
async fn test_global_scope_setting_applies_to_folder_listing() {
    let settings = IndexSettings {
        backlink_scope: noteweave_index::BacklinkScope::Global,
        ..IndexSettings::default()
    };
    let (engine, _temp) = setup_with(settings).await;
    engine.create_document(doc("Target", "", None)).await.unwrap();
    engine.create_document(doc("Source", "[[Target]]", Some("work"))).await.unwrap();

    assert_eq!(
        backlinks_by_title(&engine, Some("default")).await["Target"],
        vec!["Source"]
    );
}

#[tokio::test]
async fn test_title_and_filename_collisions() {
    let (engine, _temp) = setup().await;
    engine.create_document(doc("Café", "", None)).await.unwrap();

    for title in ["Café", "CAFÉ", "Cafe\u{301}"] {
        assert!(matches!(
            engine.create_document(doc(title, "", None)).await,
            Err(IndexError::Collision { .. })
        ));
    }
    // Same title in another folder is fine.
    engine.create_document(doc("Café", "", Some("other"))).await.unwrap();

    engine.create_document(doc("A/B", "", None)).await.unwrap();
    assert!(matches!(
        engine.create_document(doc("AB", "", None)).await,
        Err(IndexError::FilenameCollision { .. })
    ));

    let a_b = engine.get_document(None, "A/B").await.unwrap();
    assert_eq!(a_b.filename, "AB.md");
}

#[tokio::test]
async fn test_rename_rejections_leave_disk_untouched() {
    let (engine, temp) = setup().await;
    engine.create_document(doc("First", "[[Second]]", None)).await.unwrap();
    engine.create_document(doc("Second", "", None)).await.unwrap();

    assert!(matches!(
        engine.rename_document(None, "Second", "first").await,
        Err(IndexError::Collision { .. })
    ));
    let first = tokio::fs::read_to_string(temp.path().join("notes/default/First.md"))
        .await
        .unwrap();
    assert_eq!(first, "[[Second]]");

    // Case-only rename of the document's own identity is allowed.
    let outcome = engine.rename_document(None, "Second", "SECOND").await.unwrap();
    assert_eq!(outcome.document.title, "SECOND");
    assert_eq!(engine.list_titles(Some("default")).await.unwrap(), vec!["First", "SECOND"]);
    assert_eq!(backlinks_by_title(&engine, Some("default")).await["SECOND"], vec!["First"]);
}

#[tokio::test]
async fn test_title_change_in_content_triggers_rename() {
    let (engine, temp) = setup().await;
    engine.create_document(doc("Draft", "# Draft\nbody", None)).await.unwrap();
    engine.create_document(doc("Index", "[[Draft]]", None)).await.unwrap();

    let outcome = engine
        .update_document(None, "Draft", content_update("# Final\nbody", None))
        .await
        .unwrap();
    assert_eq!(outcome.document.title, "Final");
    assert!(outcome.cascade.is_some());
    assert!(temp.path().join("notes/default/Final.md").exists());
    assert_eq!(
        tokio::fs::read_to_string(temp.path().join("notes/default/Index.md"))
            .await
            .unwrap(),
        "[[Final]]"
    );
}

#[tokio::test]
async fn test_partial_cascade_failure_is_reported() {
    let (engine, temp) = setup().await;
    engine.create_document(doc("Hub", "", None)).await.unwrap();
    engine.create_document(doc("Spoke", "[[Hub]]", None)).await.unwrap();
    // Not valid UTF-8, so it can be neither indexed nor rewritten.
    let mut broken = b"[[Hub]] ".to_vec();
    broken.extend_from_slice(&[0xff, 0xfe]);
    tokio::fs::write(temp.path().join("notes/default/Broken.md"), broken)
        .await
        .unwrap();

    let outcome = engine.rename_document(None, "Hub", "Center").await.unwrap();
    let report = outcome.cascade.unwrap();
    assert_eq!(report.rewritten, vec!["Spoke.md"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].filename, "Broken.md");

    assert!(temp.path().join("notes/default/Center.md").exists());
    assert_eq!(backlinks_by_title(&engine, Some("default")).await["Center"], vec!["Spoke"]);
}

#[tokio::test]
async fn test_tags_grow_on_add_and_shrink_after_delete() {
    let (engine, _temp) = setup().await;
    engine
        .create_document(doc("X", "---\ntags: [solo, shared]\n---\n", None))
        .await
        .unwrap();
    engine
        .create_document(doc("Y", "---\ntags: [shared]\n---\n", None))
        .await
        .unwrap();
    assert_eq!(engine.get_tags().await.unwrap(), vec!["shared", "solo"]);

    engine
        .update_document(None, "Y", content_update("---\ntags: [shared, extra]\n---\n", None))
        .await
        .unwrap();
    assert_eq!(engine.get_tags().await.unwrap(), vec!["extra", "shared", "solo"]);

    engine.delete_document(None, "X", false).await.unwrap();
    assert_eq!(engine.get_tags().await.unwrap(), vec!["extra", "shared"]);
}

#[tokio::test]
async fn test_initialize_is_idempotent() {
    let (engine, temp) = setup().await;
    let root = temp.path().join("notes");
    tokio::fs::create_dir_all(root.join("work")).await.unwrap();
    tokio::fs::write(root.join("default/One.md"), "---\ntitle: One\n---\n[[Two]]")
        .await
        .unwrap();
    tokio::fs::write(root.join("default/Two.md"), "# Two").await.unwrap();
    tokio::fs::write(root.join("work/Three.md"), "three").await.unwrap();

    engine.initialize().await.unwrap();
    let first = engine.list_documents(None).await.unwrap();
    // Files written after initialization are not picked up by a second call.
    tokio::fs::write(root.join("default/Late.md"), "late").await.unwrap();
    engine.initialize().await.unwrap();
    let second = engine.list_documents(None).await.unwrap();

    assert_eq!(first, second);
    let titles: Vec<&str> = first.iter().map(|d| d.title.as_str()).collect();
    assert_eq!(titles, vec!["One", "Two", "Three"]);

    engine.refresh().await.unwrap();
    assert_eq!(engine.list_documents(None).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_move_document_between_folders() {
    let (engine, temp) = setup().await;
    engine.create_document(doc("Mover", "[[Stay]]", None)).await.unwrap();
    engine.create_document(doc("Stay", "", None)).await.unwrap();
    engine.create_document(doc("Stay", "", Some("archive"))).await.unwrap();

    let moved = engine.move_document(None, "Mover", "archive").await.unwrap();
    assert_eq!(moved.folder, "archive");
    assert!(temp.path().join("notes/archive/Mover.md").exists());

    assert!(backlinks_by_title(&engine, Some("default")).await["Stay"].is_empty());
    assert_eq!(backlinks_by_title(&engine, Some("archive")).await["Stay"], vec!["Mover"]);

    engine.create_document(doc("Mover", "", None)).await.unwrap();
    assert!(matches!(
        engine.move_document(Some("default"), "Mover", "archive").await,
        Err(IndexError::Collision { .. })
    ));
}

#[tokio::test]
async fn test_trash_restore_and_purge() {
    let (engine, _temp) = setup().await;
    engine.create_document(doc("Keep", "[[Gone]]", None)).await.unwrap();
    engine.create_document(doc("Gone", "", None)).await.unwrap();
    engine.delete_document(None, "Gone", false).await.unwrap();

    let items = engine.list_trash().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].filename, "Gone.md");
    assert_eq!(items[0].title, "Gone");
    assert_eq!(items[0].days_remaining, 30);
    assert!(engine.purge_trash().await.unwrap().is_empty());

    let restored = engine.restore_from_trash("Gone.md", None).await.unwrap();
    assert_eq!(restored.backlinks, vec!["Keep"]);
    assert!(engine.list_trash().await.unwrap().is_empty());

    // A live document with the same title blocks the restore.
    engine.delete_document(None, "Gone", false).await.unwrap();
    engine.create_document(doc("Gone", "", None)).await.unwrap();
    assert!(matches!(
        engine.restore_from_trash("Gone.md", None).await,
        Err(IndexError::Collision { .. })
    ));

    engine.delete_from_trash("Gone.md").await.unwrap();
    assert!(matches!(
        engine.delete_from_trash("Gone.md").await,
        Err(IndexError::TrashItemNotFound(_))
    ));
}

#[tokio::test]
async fn test_trash_names_are_disambiguated_and_purged_after_retention() {
    let settings = IndexSettings {
        trash_retention_days: 0,
        ..IndexSettings::default()
    };
    let (engine, _temp) = setup_with(settings).await;
    engine.create_document(doc("Dup", "", None)).await.unwrap();
    engine.delete_document(None, "Dup", false).await.unwrap();
    engine.create_document(doc("Dup", "", None)).await.unwrap();
    let second = engine.delete_document(None, "Dup", false).await.unwrap();
    assert_eq!(second.trash_filename.as_deref(), Some("Dup 2.md"));

    let mut purged = engine.purge_trash().await.unwrap();
    purged.sort();
    assert_eq!(purged, vec!["Dup 2.md", "Dup.md"]);
}

#[tokio::test]
async fn test_folder_lifecycle() {
    let (engine, temp) = setup().await;
    engine.create_folder("projects").await.unwrap();
    assert!(matches!(
        engine.create_folder("projects").await,
        Err(IndexError::FolderExists(_))
    ));
    engine.create_document(doc("P1", "", Some("projects"))).await.unwrap();
    engine.create_document(doc("P2", "---\ntags: [p]\n---\n", Some("projects"))).await.unwrap();

    let folders = engine.list_folders().await.unwrap();
    let counts: Vec<(&str, usize)> = folders
        .iter()
        .map(|f| (f.name.as_str(), f.document_count))
        .collect();
    assert_eq!(counts, vec![("default", 0), ("projects", 2)]);

    assert!(matches!(
        engine.delete_folder("projects", false).await,
        Err(IndexError::FolderNotEmpty { count: 2, .. })
    ));
    let result = engine.delete_folder("projects", true).await.unwrap();
    assert_eq!(result.trashed, vec!["P1.md", "P2.md"]);
    assert!(!temp.path().join("notes/projects").exists());
    assert!(engine.list_titles(Some("projects")).await.unwrap().is_empty());
    assert!(engine.get_tags().await.unwrap().is_empty());
    assert_eq!(engine.list_trash().await.unwrap().len(), 2);

    assert!(matches!(
        engine.delete_folder("projects", false).await,
        Err(IndexError::FolderNotFound(_))
    ));
    assert!(matches!(
        engine.delete_folder("default", true).await,
        Err(IndexError::InvalidName(_))
    ));
}

#[tokio::test]
async fn test_concurrent_renames_in_one_folder_serialize() {
    let (engine, _temp) = setup().await;
    let engine = std::sync::Arc::new(engine);
    engine.create_document(doc("Left", "[[Right]]", None)).await.unwrap();
    engine.create_document(doc("Right", "[[Left]]", None)).await.unwrap();

    let a = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.rename_document(None, "Left", "Left 2").await })
    };
    let b = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.rename_document(None, "Right", "Right 2").await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let incremental = edges(&engine).await;
    assert_eq!(incremental, vec![edge("Left 2", "Right 2"), edge("Right 2", "Left 2")]);
    engine.refresh().await.unwrap();
    assert_eq!(edges(&engine).await, incremental);
}

#[tokio::test]
async fn test_dot_title_survives_refresh() {
    let (engine, temp) = setup().await;
    let created = engine.create_document(doc(".profile", "[[Other]]", None)).await.unwrap();
    assert_eq!(created.filename, "profile.md");
    assert!(temp.path().join("notes/default/profile.md").exists());

    engine.refresh().await.unwrap();
    assert_eq!(engine.list_titles(Some("default")).await.unwrap(), vec![".profile"]);
    assert_eq!(
        engine.get_document(Some("default"), ".profile").await.unwrap().links,
        vec!["Other"]
    );
}

#[tokio::test]
async fn test_forced_folder_delete_with_attachment() {
    let (engine, temp) = setup().await;
    engine.create_folder("work").await.unwrap();
    engine
        .create_document(doc("Plan", "---\ntags: [onlyhere]\n---\n", Some("work")))
        .await
        .unwrap();
    engine.create_document(doc("Kept", "---\ntags: [shared]\n---\n", None)).await.unwrap();
    let folder = temp.path().join("notes/work");
    tokio::fs::write(folder.join("diagram.png"), [0u8, 1, 2]).await.unwrap();

    let result = engine.delete_folder("work", true).await.unwrap();
    assert_eq!(result.trashed, vec!["Plan.md"]);
    assert!(!folder.exists());
    assert_eq!(engine.get_tags().await.unwrap(), vec!["shared"]);
    let trash = engine.list_trash().await.unwrap();
    assert_eq!(trash.len(), 1);
    assert_eq!(trash[0].filename, "Plan.md");
}

#[tokio::test]
async fn test_plain_folder_delete_refuses_leftover_files() {
    let (engine, temp) = setup().await;
    engine.create_folder("assets").await.unwrap();
    let folder = temp.path().join("notes/assets");
    tokio::fs::write(folder.join("logo.png"), [0u8]).await.unwrap();

    assert!(matches!(
        engine.delete_folder("assets", false).await,
        Err(IndexError::FolderNotEmpty { count: 0, .. })
    ));
    assert!(folder.join("logo.png").exists());
}

#[tokio::test]
async fn test_rename_leaves_hidden_files_alone() {
    let (engine, temp) = setup().await;
    engine.create_document(doc("Target", "", None)).await.unwrap();
    engine.create_document(doc("Visible", "[[Target]]", None)).await.unwrap();
    let hidden = temp.path().join("notes/default/.draft.md");
    tokio::fs::write(&hidden, "[[Target]]").await.unwrap();

    let outcome = engine
        .rename_document(Some("default"), "Target", "Goal")
        .await
        .unwrap();
    assert_eq!(outcome.cascade.unwrap().rewritten, vec!["Visible.md"]);
    assert_eq!(tokio::fs::read_to_string(&hidden).await.unwrap(), "[[Target]]");
}
