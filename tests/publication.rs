//! Publication Integration Tests
//!
//! Cleanliness decisions, slideshow normalization and feed window assembly.

mod common;

use common::{source_config, wp_post, wp_posts, ScriptedSource};
use feedmill::adapters::TermListOracle;
use feedmill::core::assemble;
use feedmill::domain::{ContentHash, ContentKind, ItemState, SkipReason};
use feedmill::{ContentStore, IngestionEngine, PublicationPipeline, StoreError};
use tempfile::TempDir;

const FAIL_UPDATES: &str = "CREATE TRIGGER fail_updates BEFORE UPDATE ON content_items
    BEGIN SELECT RAISE(ABORT, 'disk gone'); END;";

#[tokio::test]
async fn test_unclean_item_is_skipped_and_left_out_of_feed() {
    let store = ContentStore::open_in_memory().unwrap();
    let oracle = TermListOracle::new(["darn"]).unwrap();
    let config = source_config("acme");

    let posts = vec![
        wp_post(1, "Morning news", "<p>All quiet</p>", "2024-01-01T00:00:00", None),
        wp_post(2, "Darn this weather", "<p>Rain</p>", "2024-01-02T00:00:00", None),
        wp_post(3, "Evening news", "<p>Still quiet</p>", "2024-01-03T00:00:00", None),
    ];
    IngestionEngine::new(&store)
        .ingest(&config, &ScriptedSource::new(vec![posts]))
        .await
        .unwrap();

    let report = PublicationPipeline::new(&store, &oracle).run(&config, true).unwrap();
    assert_eq!(report.processed, 3);
    assert_eq!(report.skipped, 1);

    let dirty = ContentHash::compute("wordpress", "2");
    let row = store.find_by_key(&dirty, "acme").unwrap().unwrap();
    match row.state {
        ItemState::Skipped { reason, .. } => assert_eq!(reason, SkipReason::Profanity),
        other => panic!("expected skipped, got {:?}", other),
    }

    let feed = assemble(&store, "acme", "news", report.feed_items, 10).unwrap();
    assert_eq!(feed.len(), 2);
    assert!(feed.iter().all(|item| item.content_hash != dirty));
}

#[tokio::test]
async fn test_published_items_carry_normalized_metadata() {
    let store = ContentStore::open_in_memory().unwrap();
    let oracle = TermListOracle::default();
    let config = source_config("acme");

    let posts = vec![wp_post(7, "Fish &amp; Chips", "<p>Body</p>", "2024-01-01T00:00:00", None)];
    IngestionEngine::new(&store)
        .ingest(&config, &ScriptedSource::new(vec![posts]))
        .await
        .unwrap();

    let report = PublicationPipeline::new(&store, &oracle).run(&config, true).unwrap();
    let item = &report.feed_items[0];

    assert_eq!(item.data.title, "Fish & Chips");
    assert_eq!(item.data.description.as_deref(), Some("About Fish & Chips"));
    assert_eq!(item.data.author.as_deref(), Some("Editor"));
    assert_eq!(item.data.image.as_deref(), Some("https://example.com/img/7.jpg"));
    assert!(!item.data.body.is_slideshow);
}

#[tokio::test]
async fn test_slideshow_source_is_segmented() {
    let store = ContentStore::open_in_memory().unwrap();
    let oracle = TermListOracle::default();
    let mut config = source_config("slides");
    config.content_kind = ContentKind::Slideshow;

    let body = r#"
        <p>Ten places to visit.</p>
        <figure class="wp-block-image"><img src="https://example.com/1.jpg">
            <figcaption class="wp-element-caption">Photo one</figcaption></figure>
        <h2>First place</h2><p>Nice beach.</p>
        <figure><img data-src="https://example.com/2.jpg"></figure>
        <h2>Second place</h2><p>Old town.</p>
        <figure><img src="https://example.com/3.jpg"></figure>
        <h2>Third place</h2><p>Mountains.</p>
    "#;
    let posts = vec![wp_post(1, "Places", body, "2024-01-01T00:00:00", None)];
    IngestionEngine::new(&store)
        .ingest(&config, &ScriptedSource::new(vec![posts]))
        .await
        .unwrap();

    let report = PublicationPipeline::new(&store, &oracle).run(&config, true).unwrap();
    let normalized = &report.feed_items[0].data.body;

    assert!(normalized.is_slideshow);
    assert_eq!(normalized.intro, "Ten places to visit.");
    let titles: Vec<&str> = normalized.slides.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["First place", "Second place", "Third place"]);
    assert_eq!(normalized.slides[0].caption.as_deref(), Some("Photo one"));
    assert_eq!(normalized.slides[1].image_url, "https://example.com/2.jpg");
}

#[tokio::test]
async fn test_feed_window_keeps_freshest_published() {
    let store = ContentStore::open_in_memory().unwrap();
    let oracle = TermListOracle::default();
    let config = source_config("acme");

    // Post N is published on day N + 1
    IngestionEngine::new(&store)
        .ingest(&config, &ScriptedSource::paged(wp_posts(6), 10))
        .await
        .unwrap();
    PublicationPipeline::new(&store, &oracle).run(&config, true).unwrap();

    let feed = assemble(&store, "acme", "news", Vec::new(), 3).unwrap();
    let titles: Vec<&str> = feed.iter().map(|i| i.data.title.as_str()).collect();
    assert_eq!(titles, vec!["Post 6", "Post 5", "Post 4"]);
}

#[tokio::test]
async fn test_feed_window_never_exceeds_max_total() {
    let store = ContentStore::open_in_memory().unwrap();
    let oracle = TermListOracle::default();
    let config = source_config("acme");
    let engine = IngestionEngine::new(&store);

    engine
        .ingest(&config, &ScriptedSource::paged(wp_posts(4), 10))
        .await
        .unwrap();
    PublicationPipeline::new(&store, &oracle).run(&config, true).unwrap();

    engine
        .ingest(&config, &ScriptedSource::paged(wp_posts(8), 10))
        .await
        .unwrap();
    let report = PublicationPipeline::new(&store, &oracle).run(&config, false).unwrap();
    assert_eq!(report.feed_items.len(), 4);

    for max_total in [1, 3, 5, 8, 20] {
        let feed = assemble(&store, "acme", "news", report.feed_items.clone(), max_total).unwrap();
        assert_eq!(feed.len(), max_total.min(8));
    }
}

#[tokio::test]
async fn test_store_failure_aborts_publication_without_skipping() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("feedmill.db");
    let store = ContentStore::open(&db_path).unwrap();
    let oracle = TermListOracle::default();
    let config = source_config("acme");

    IngestionEngine::new(&store)
        .ingest(&config, &ScriptedSource::paged(wp_posts(3), 10))
        .await
        .unwrap();

    let side = rusqlite::Connection::open(&db_path).unwrap();
    side.execute_batch(FAIL_UPDATES).unwrap();

    let result = PublicationPipeline::new(&store, &oracle).run(&config, true);
    assert!(matches!(result, Err(StoreError::Database(_))));

    side.execute_batch("DROP TRIGGER fail_updates;").unwrap();
    let counts = store.status_counts("acme", "news").unwrap();
    assert_eq!(counts.pending, 3);
    assert_eq!(counts.skipped, 0);
}
