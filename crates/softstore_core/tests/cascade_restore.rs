use rusqlite::{params, Connection};
use softstore_core::db::open_db_in_memory;
use softstore_core::{
    ChainFlow, HookOutcome, MarkerScheme, RecordRef, RecordType, SoftDeleteEngine,
    SqliteRecordStore, StoreError, TypeRegistry, Visibility,
};
use std::collections::HashSet;
use uuid::Uuid;

fn setup_conn() -> Connection {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE authors (
            uuid TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            deleted_at INTEGER
        );
        CREATE TABLE posts (
            uuid TEXT PRIMARY KEY NOT NULL,
            author_uuid TEXT NOT NULL,
            title TEXT NOT NULL,
            deleted_at INTEGER
        );
        CREATE TABLE comments (
            uuid TEXT PRIMARY KEY NOT NULL,
            post_uuid TEXT NOT NULL,
            body TEXT NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE notes (
            uuid TEXT PRIMARY KEY NOT NULL,
            author_uuid TEXT NOT NULL,
            body TEXT NOT NULL,
            deleted_at INTEGER
        );
        CREATE TABLE attachments (
            uuid TEXT PRIMARY KEY NOT NULL,
            post_uuid TEXT NOT NULL,
            path TEXT NOT NULL
        );",
    )
    .unwrap();
    conn
}

/// Authors cascade into posts, posts into comments and attachments.
/// Notes hang off authors without cascade; attachments never opted into
/// soft deletion.
fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry
        .register(
            RecordType::new("authors", "authors")
                .with_soft_delete("deleted_at", MarkerScheme::Timestamp)
                .with_cascade_destroy("posts", "posts", "author_uuid")
                .with_association("notes", "notes", "author_uuid"),
        )
        .unwrap();
    registry
        .register(
            RecordType::new("posts", "posts")
                .with_soft_delete("deleted_at", MarkerScheme::Timestamp)
                .with_cascade_destroy("comments", "comments", "post_uuid")
                .with_cascade_destroy("attachments", "attachments", "post_uuid"),
        )
        .unwrap();
    registry
        .register(
            RecordType::new("comments", "comments").with_soft_delete("is_deleted", MarkerScheme::Flag),
        )
        .unwrap();
    registry
        .register(
            RecordType::new("notes", "notes").with_soft_delete("deleted_at", MarkerScheme::Timestamp),
        )
        .unwrap();
    registry
        .register(RecordType::new("attachments", "attachments"))
        .unwrap();
    registry
}

struct Graph {
    author: Uuid,
    post_a: Uuid,
    post_b: Uuid,
    comment_a: Uuid,
    comment_b: Uuid,
    note: Uuid,
    attachment: Uuid,
}

fn seed_graph(conn: &Connection) -> Graph {
    let graph = Graph {
        author: Uuid::new_v4(),
        post_a: Uuid::new_v4(),
        post_b: Uuid::new_v4(),
        comment_a: Uuid::new_v4(),
        comment_b: Uuid::new_v4(),
        note: Uuid::new_v4(),
        attachment: Uuid::new_v4(),
    };

    conn.execute(
        "INSERT INTO authors (uuid, name) VALUES (?1, 'ada');",
        [graph.author.to_string()],
    )
    .unwrap();
    for (post, title) in [(graph.post_a, "first"), (graph.post_b, "second")] {
        conn.execute(
            "INSERT INTO posts (uuid, author_uuid, title) VALUES (?1, ?2, ?3);",
            params![post.to_string(), graph.author.to_string(), title],
        )
        .unwrap();
    }
    for (comment, body) in [(graph.comment_a, "nice"), (graph.comment_b, "typo")] {
        conn.execute(
            "INSERT INTO comments (uuid, post_uuid, body) VALUES (?1, ?2, ?3);",
            params![comment.to_string(), graph.post_a.to_string(), body],
        )
        .unwrap();
    }
    conn.execute(
        "INSERT INTO notes (uuid, author_uuid, body) VALUES (?1, ?2, 'draft');",
        params![graph.note.to_string(), graph.author.to_string()],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO attachments (uuid, post_uuid, path) VALUES (?1, ?2, 'a.png');",
        params![graph.attachment.to_string(), graph.post_a.to_string()],
    )
    .unwrap();

    graph
}

fn visible_ids(engine: &SoftDeleteEngine<SqliteRecordStore<'_>>, type_name: &str) -> HashSet<Uuid> {
    engine
        .find_all(type_name, Visibility::Default)
        .unwrap()
        .into_iter()
        .map(|row| row.id)
        .collect()
}

#[test]
fn destroy_cascades_over_cascade_destroy_edges_only() {
    let conn = setup_conn();
    let registry = registry();
    let store = SqliteRecordStore::try_new(&conn, &registry).unwrap();
    let engine = SoftDeleteEngine::new(store);
    let graph = seed_graph(&conn);

    let author = RecordRef::persisted("authors", graph.author);
    assert_eq!(engine.destroy(&author).unwrap(), ChainFlow::Completed);

    assert!(visible_ids(&engine, "authors").is_empty());
    assert!(visible_ids(&engine, "posts").is_empty());
    assert!(visible_ids(&engine, "comments").is_empty());

    // The plain association edge and the non-capable dependent stay put.
    assert_eq!(visible_ids(&engine, "notes"), HashSet::from([graph.note]));
    assert_eq!(
        visible_ids(&engine, "attachments"),
        HashSet::from([graph.attachment])
    );
}

#[test]
fn restore_with_cascade_restores_the_whole_subtree() {
    let conn = setup_conn();
    let registry = registry();
    let store = SqliteRecordStore::try_new(&conn, &registry).unwrap();
    let engine = SoftDeleteEngine::new(store);
    let graph = seed_graph(&conn);

    let author = RecordRef::persisted("authors", graph.author);
    engine.destroy(&author).unwrap();
    assert_eq!(engine.restore(&author, true).unwrap(), ChainFlow::Completed);

    assert_eq!(visible_ids(&engine, "authors"), HashSet::from([graph.author]));
    assert_eq!(
        visible_ids(&engine, "posts"),
        HashSet::from([graph.post_a, graph.post_b])
    );
    assert_eq!(
        visible_ids(&engine, "comments"),
        HashSet::from([graph.comment_a, graph.comment_b])
    );
}

#[test]
fn restore_without_cascade_restores_only_the_owner() {
    let conn = setup_conn();
    let registry = registry();
    let store = SqliteRecordStore::try_new(&conn, &registry).unwrap();
    let engine = SoftDeleteEngine::new(store);
    let graph = seed_graph(&conn);

    let author = RecordRef::persisted("authors", graph.author);
    engine.destroy(&author).unwrap();
    assert_eq!(engine.restore(&author, false).unwrap(), ChainFlow::Completed);

    assert_eq!(visible_ids(&engine, "authors"), HashSet::from([graph.author]));
    assert!(visible_ids(&engine, "posts").is_empty());
    assert!(visible_ids(&engine, "comments").is_empty());
}

#[test]
fn halted_dependent_rolls_back_the_whole_restore() {
    let conn = setup_conn();
    let registry = registry();
    let store = SqliteRecordStore::try_new(&conn, &registry).unwrap();
    let mut engine = SoftDeleteEngine::new(store);
    engine.before_restore("comments", |_| HookOutcome::Halt);
    let graph = seed_graph(&conn);

    let author = RecordRef::persisted("authors", graph.author);
    engine.destroy(&author).unwrap();

    assert_eq!(engine.restore(&author, true).unwrap(), ChainFlow::Halted);

    // No partial restore is observable: the owner and every dependent
    // restored before the halt revert to deleted.
    assert!(visible_ids(&engine, "authors").is_empty());
    assert!(visible_ids(&engine, "posts").is_empty());
    assert!(visible_ids(&engine, "comments").is_empty());
}

#[test]
fn restore_by_ids_resolves_within_the_deleted_scope() {
    let conn = setup_conn();
    let registry = registry();
    let store = SqliteRecordStore::try_new(&conn, &registry).unwrap();
    let engine = SoftDeleteEngine::new(store);
    let graph = seed_graph(&conn);

    let post_a = RecordRef::persisted("posts", graph.post_a);
    engine.soft_delete(&post_a, true).unwrap();

    let missing = Uuid::new_v4();
    let results = engine.restore_by_ids(
        "posts",
        &[graph.post_a, graph.post_b, missing],
        false,
    );
    assert_eq!(results.len(), 3);

    assert!(matches!(results[0].1, Ok(ChainFlow::Completed)));
    // post_b is live, so it is not found among deleted records.
    assert!(matches!(results[1].1, Err(StoreError::NotFound { .. })));
    assert!(matches!(results[2].1, Err(StoreError::NotFound { .. })));

    assert!(visible_ids(&engine, "posts").contains(&graph.post_a));
}
