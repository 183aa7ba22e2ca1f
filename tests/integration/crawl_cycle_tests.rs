//! Integration tests for crawl cycles
//!
//! These tests use wiremock to serve listing pages and documents and run
//! consecutive crawl cycles against an on-disk database.

use docket::config::{parse_config, Config, SourceConfig};
use docket::crawler::run_crawl_cycle;
use docket::output::CycleStats;
use docket::storage::{DocumentLookup, SqliteStorage, Storage};
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Distinct subjects so unrelated documents never share a family
const SUBJECTS: &[&str] = &[
    "Inland fisheries licensing rules",
    "Rural road maintenance budget",
    "School admission schedule",
    "Groundwater extraction permits",
    "Public library opening hours",
    "Seasonal flood preparedness plan",
    "Market vendor registration drive",
    "Heritage building conservation survey",
    "Urban tree planting programme",
    "Solar subsidy disbursement status",
];

fn create_test_config(seed_url: &str, db_path: &Path, window_size: u32) -> Config {
    parse_config(&format!(
        r#"
[crawler]
window-size = {window_size}
max-pages = 20
politeness-delay-ms = 0

[retry]
max-attempts = 1
base-delay-ms = 1
max-delay-ms = 1

[user-agent]
identities = ["DocketTest/1.0"]

[output]
database-path = "{db}"

[[source]]
name = "notices"
seed-url = "{seed_url}"
"#,
        db = db_path.display()
    ))
    .expect("Failed to build test config")
}

/// Listing page body: document links inside `main`, optional next link
fn listing(links: &[(&str, &str)], next: Option<&str>) -> String {
    let anchors: String = links
        .iter()
        .map(|(href, title)| format!(r#"<li><a href="{}">{}</a></li>"#, href, title))
        .collect();
    let next = next
        .map(|href| format!(r#"<a rel="next" href="{}">Next</a>"#, href))
        .unwrap_or_default();
    format!(
        r#"<html><head><title>Notices</title></head><body>
        <nav><a href="/">Home</a></nav>
        <main><ul>{}</ul></main>
        <div class="pager">{}</div>
        <footer>Last updated: 12 March 2024</footer>
        </body></html>"#,
        anchors, next
    )
}

async fn serve(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

async fn serve_document(server: &MockServer, route: &str, text: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(text.as_bytes().to_vec()),
        )
        .mount(server)
        .await;
}

async fn run_cycle(config: &Config, source: &SourceConfig) -> CycleStats {
    run_crawl_cycle(config, "test-hash", source, CancellationToken::new())
        .await
        .expect("Crawl cycle setup failed")
}

/// Serves a linear listing of `pages` pages with one document each
async fn mount_paged_listing(server: &MockServer, pages: usize, page_two_extra: bool) {
    for n in 1..=pages {
        let route = if n == 1 {
            "/list".to_string()
        } else {
            format!("/list/page/{}", n)
        };
        let next = (n < pages).then(|| format!("/list/page/{}", n + 1));

        let doc_href = format!("/docs/notice-{}.pdf", n);
        let mut links = vec![(doc_href.as_str(), SUBJECTS[n - 1])];
        if n == 2 && page_two_extra {
            links.push(("/docs/notice-2b.pdf", "Emergency water rationing order"));
        }

        serve(server, &route, listing(&links, next.as_deref())).await;
        serve_document(
            server,
            &doc_href,
            &format!("{}. Full text of notice number {}.", SUBJECTS[n - 1], n),
        )
        .await;
    }
    if page_two_extra {
        serve_document(
            server,
            "/docs/notice-2b.pdf",
            "Water will be supplied on alternate days until further notice.",
        )
        .await;
    }
}

#[tokio::test]
async fn test_unchanged_source_admits_nothing_on_second_cycle() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        &format!("{}/list", server.uri()),
        &dir.path().join("docket.db"),
        3,
    );
    let source = config.sources[0].clone();

    serve(
        &server,
        "/list",
        listing(
            &[
                ("/docs/fisheries.pdf", SUBJECTS[0]),
                ("/docs/roads.pdf", SUBJECTS[1]),
            ],
            None,
        ),
    )
    .await;
    serve_document(&server, "/docs/fisheries.pdf", "Licences for inland fishing.").await;
    serve_document(&server, "/docs/roads.pdf", "Budget for rural roads.").await;

    let first = run_cycle(&config, &source).await;
    assert_eq!(first.mode, "full");
    assert_eq!(first.documents_new, 2);
    assert!(first.errors.is_empty(), "{:?}", first.errors);

    let second = run_cycle(&config, &source).await;
    assert_eq!(second.mode, "incremental");
    assert_eq!(second.pages_visited, 1);
    assert_eq!(second.pages_changed, 0);
    assert_eq!(second.documents_new, 0);
    assert_eq!(second.documents_updated, 0);
    assert_eq!(second.documents_skipped, 2);
    assert!(second.errors.is_empty(), "{:?}", second.errors);

    let storage = SqliteStorage::new(&dir.path().join("docket.db")).unwrap();
    let counts = storage.corpus_counts().unwrap();
    assert_eq!(counts.documents, 2);
    assert_eq!(counts.runs, 2);
}

#[tokio::test]
async fn test_changed_document_becomes_new_version() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("docket.db");
    let config = create_test_config(&format!("{}/list", server.uri()), &db_path, 3);
    let source = config.sources[0].clone();
    let x_url = format!("{}/docs/X.pdf", server.uri());
    let y_url = format!("{}/docs/Y.pdf", server.uri());

    // Cycle 1: two unrelated documents
    serve(
        &server,
        "/list",
        listing(
            &[
                ("/docs/X.pdf", "Annual fisheries report"),
                ("/docs/Y.pdf", "Municipal parking regulations"),
            ],
            None,
        ),
    )
    .await;
    serve_document(&server, "/docs/X.pdf", "Fish catch rose by four percent.").await;
    serve_document(&server, "/docs/Y.pdf", "Parking is prohibited near hydrants.").await;

    let first = run_cycle(&config, &source).await;
    assert_eq!(first.documents_new, 2);
    assert_eq!(first.families_created, 2);

    let (x_family, y_id) = {
        let storage = SqliteStorage::new(&db_path).unwrap();
        let x = storage.find_latest_by_url(&x_url).unwrap().unwrap();
        let y = storage.find_latest_by_url(&y_url).unwrap().unwrap();
        assert_ne!(x.family_id, y.family_id);
        assert!(x.is_latest_version && y.is_latest_version);
        assert_eq!(x.version, "1.0");
        (x.family_id, y.id)
    };

    // Cycle 2: only the content of X changes; the listing page is identical
    server.reset().await;
    serve(
        &server,
        "/list",
        listing(
            &[
                ("/docs/X.pdf", "Annual fisheries report"),
                ("/docs/Y.pdf", "Municipal parking regulations"),
            ],
            None,
        ),
    )
    .await;
    serve_document(&server, "/docs/X.pdf", "Fish catch rose by six percent.").await;
    serve_document(&server, "/docs/Y.pdf", "Parking is prohibited near hydrants.").await;

    let second = run_cycle(&config, &source).await;
    assert_eq!(second.mode, "incremental");
    assert_eq!(second.pages_changed, 0);
    assert_eq!(second.documents_updated, 1);
    assert_eq!(second.documents_skipped, 1);
    assert_eq!(second.documents_new, 0);
    assert!(second.errors.is_empty(), "{:?}", second.errors);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let versions = storage.family_documents(x_family).unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].version, "1.0");
    assert!(!versions[0].is_latest_version);
    assert_eq!(versions[0].superseded_by_id, Some(versions[1].id));
    assert_eq!(versions[1].version, "1.1");
    assert!(versions[1].is_latest_version);
    assert_eq!(versions[1].supersedes_id, Some(versions[0].id));

    let y = storage.get_document(y_id).unwrap();
    assert!(y.is_latest_version);
    assert_eq!(y.version, "1.0");
    assert_eq!(storage.family_documents(y.family_id).unwrap().len(), 1);
}

#[tokio::test]
async fn test_sliding_window_only_rechecks_leading_pages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("docket.db");
    let config = create_test_config(&format!("{}/list", server.uri()), &db_path, 3);
    let source = config.sources[0].clone();

    mount_paged_listing(&server, 10, false).await;

    let first = run_cycle(&config, &source).await;
    assert_eq!(first.mode, "full");
    assert_eq!(first.pages_visited, 10);
    assert_eq!(first.documents_new, 10);
    assert!(first.errors.is_empty(), "{:?}", first.errors);

    {
        let storage = SqliteStorage::new(&db_path).unwrap();
        let record = storage.get_source("notices").unwrap().unwrap();
        assert_eq!(record.frontier_depth, 10);
        assert!(record.last_full_scan_at.is_some());
    }

    // Cycle 2: only page 2 changes
    server.reset().await;
    mount_paged_listing(&server, 10, true).await;
    let earlier = server.received_requests().await.unwrap_or_default().len();

    let second = run_cycle(&config, &source).await;
    assert_eq!(second.mode, "incremental");
    assert_eq!(second.pages_changed, 1);
    // Documents on the unchanged window pages 1 and 3 are re-checked too
    assert_eq!(second.documents_discovered, 4);
    assert_eq!(second.documents_new, 1);
    assert_eq!(second.documents_skipped, 3);
    assert_eq!(second.documents_updated, 0);
    assert!(second.errors.is_empty(), "{:?}", second.errors);

    // Window pages plus the stored frontier page; pages 4-9 untouched
    assert_eq!(second.pages_visited, 4);
    let requested: Vec<String> = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .skip(earlier)
        .map(|r| r.url.path().to_string())
        .collect();
    for n in 4..=9 {
        assert!(!requested.contains(&format!("/list/page/{}", n)));
        assert!(!requested.contains(&format!("/docs/notice-{}.pdf", n)));
    }
    assert!(requested.contains(&"/list/page/10".to_string()));
    assert!(requested.contains(&"/docs/notice-3.pdf".to_string()));
    assert!(requested.contains(&"/docs/notice-2b.pdf".to_string()));
}
