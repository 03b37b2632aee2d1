//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a mock regulator site and test
//! the full discover, download, parse and store cycle end-to-end.

use chrono::{Datelike, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use sanctions_harvest::config::{
    Config, CrawlerConfig, LoggingConfig, SiteConfig, StorageConfig, UserAgentConfig, YearPolicy,
};
use sanctions_harvest::crawler::run_crawl;
use sanctions_harvest::query::{get_stats, search_by_name};
use sanctions_harvest::storage::{NewProfile, SqliteStorage, Storage};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a PDF with one page per entry of `pages`, one text line per `\n`
fn build_pdf(pages: &[String]) -> Vec<u8> {
    build_pdf_with_font(pages, "F1".into())
}

/// Builds a PDF whose pages all select their font with `font`
///
/// A non-name operand makes every page's text unextractable.
fn build_pdf_with_font(pages: &[String], font: Object) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let mut operations = Vec::new();
        for (i, line) in text.lines().enumerate() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec![font.clone(), 10.into()]));
            operations.push(Operation::new(
                "Td",
                vec![50.into(), (780 - 14 * i as i64).into()],
            ));
            operations.push(Operation::new("Tj", vec![Object::string_literal(line)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// A one-page circular listing a single person
fn circular(list_id: &str, first: &str, last: &str, nationality: &str) -> Vec<u8> {
    build_pdf(&[format!(
        "Security Council Sanctions List\n\
         {list_id} Name: 1: {first} 2: {last} 3: na 4: na\n\
         Nationality: {nationality} Passport no: na"
    )])
}

/// Creates a test configuration pointing at the mock server
fn create_test_config(server: &MockServer, dir: &TempDir) -> Config {
    Config {
        site: SiteConfig {
            index_url: format!("{}/circulars/index.html", server.uri()),
            year_link_pattern: "circulars_{year}".to_string(),
            year_page_template: format!("{}/circulars/fallback_{{year}}.html", server.uri()),
        },
        crawler: CrawlerConfig {
            epoch_year: current_year(),
            year_policy: YearPolicy::Auto,
            request_timeout_secs: 5,
            download_timeout_secs: 5,
            ..CrawlerConfig::default()
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: Some("https://example.com/contact".to_string()),
        },
        storage: StorageConfig {
            database_path: dir.path().join("harvest.db").display().to_string(),
            backup_path: None,
        },
        logging: LoggingConfig::default(),
    }
}

fn current_year() -> i32 {
    Utc::now().year()
}

/// Spells a number with letters, since name parts never contain digits
fn letters(n: i32) -> String {
    n.to_string()
        .bytes()
        .map(|digit| char::from(b'A' + (digit - b'0')))
        .collect()
}

async fn mount_html(server: &MockServer, at: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

async fn mount_pdf(server: &MockServer, at: &str, bytes: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(bytes)
                .insert_header("content-type", "application/pdf"),
        )
        .mount(server)
        .await;
}

/// Serves an index linking to each year page, with one circular per year
async fn mount_years(server: &MockServer, years: &[i32]) {
    let links: String = years
        .iter()
        .map(|y| format!(r#"<a href="circulars_{y}.html">{y}</a>"#))
        .collect();
    mount_html(server, "/circulars/index.html", format!("<html>{links}</html>")).await;

    for year in years {
        mount_html(
            server,
            &format!("/circulars/circulars_{year}.html"),
            format!(r#"<html><a href="files/{year}/sanctions.pdf">Circular</a></html>"#),
        )
        .await;
        mount_pdf(
            server,
            &format!("/circulars/files/{year}/sanctions.pdf"),
            circular(&format!("QDi.{year}"), "PERSON", &letters(*year), "Wakanda"),
        )
        .await;
    }
}

fn open(config: &Config) -> SqliteStorage {
    SqliteStorage::new(Path::new(&config.storage.database_path)).unwrap()
}

#[tokio::test]
async fn test_empty_store_backfills_from_epoch() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let year = current_year();
    let years = [year - 2, year - 1, year];
    mount_years(&server, &years).await;

    let mut config = create_test_config(&server, &dir);
    config.crawler.epoch_year = year - 2;

    let summary = run_crawl(config.clone(), "hash", None).await.unwrap();
    assert_eq!(summary.years_visited, years.to_vec());
    assert_eq!(summary.years_completed, years.to_vec());
    assert_eq!(summary.documents_processed, 3);
    assert_eq!(summary.profiles_added, 3);
    assert!(!summary.budget_exhausted);

    let storage = open(&config);
    assert_eq!(
        storage.distinct_years().unwrap().into_iter().collect::<Vec<_>>(),
        years.to_vec()
    );
    assert_eq!(storage.count_processed().unwrap(), 3);

    let found = search_by_name(&storage, &letters(year - 1).to_lowercase()).unwrap();
    assert_eq!(found.count, 1);
    assert_eq!(found.profiles[0].nationality, "Wakanda");
    assert_eq!(found.profiles[0].year, Some(year - 1));
}

#[tokio::test]
async fn test_second_run_adds_nothing() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let year = current_year();
    mount_years(&server, &[year - 1, year]).await;

    let mut config = create_test_config(&server, &dir);
    config.crawler.epoch_year = year - 1;

    let first = run_crawl(config.clone(), "hash", None).await.unwrap();
    assert_eq!(first.profiles_added, 2);

    // A populated store only revisits the current year
    let second = run_crawl(config.clone(), "hash", None).await.unwrap();
    assert_eq!(second.years_visited, vec![year]);
    assert_eq!(second.documents_skipped, 1);
    assert_eq!(second.documents_processed, 0);
    assert_eq!(second.profiles_added, 0);

    let storage = open(&config);
    assert_eq!(storage.count_profiles(None).unwrap(), 2);
    assert_eq!(storage.count_processed().unwrap(), 2);

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.profiles_added, 0);
    assert_eq!(run.status.to_db_string(), "completed");
}

#[tokio::test]
async fn test_missing_pdf_is_retried_next_run() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let year = current_year();

    mount_html(
        &server,
        "/circulars/index.html",
        format!(r#"<a href="circulars_{year}.html">{year}</a>"#),
    )
    .await;
    mount_html(
        &server,
        &format!("/circulars/circulars_{year}.html"),
        r#"<a href="good.pdf">good</a><a href="gone.pdf">gone</a>"#.to_string(),
    )
    .await;
    mount_pdf(
        &server,
        "/circulars/good.pdf",
        circular("QDi.1", "OMAR", "FAROUK", "Iraq"),
    )
    .await;

    let config = create_test_config(&server, &dir);
    let summary = run_crawl(config.clone(), "hash", None).await.unwrap();
    assert_eq!(summary.documents_processed, 1);
    assert_eq!(summary.documents_failed, 1);
    assert_eq!(summary.years_completed, vec![year]);

    let storage = open(&config);
    let gone = format!("{}/circulars/gone.pdf", server.uri());
    assert!(!storage.is_processed(&gone).unwrap());
    assert!(storage
        .is_processed(&format!("{}/circulars/good.pdf", server.uri()))
        .unwrap());
    assert_eq!(storage.count_profiles_for_document(&gone).unwrap(), 0);
}

#[tokio::test]
async fn test_long_circular_is_capped() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let year = current_year();

    let pages: Vec<String> = (1..=45)
        .map(|n| format!(
                "QDi.{n} Name: 1: LISTED 2: PERSON{} 3: na 4: na\nNationality: Oman",
                letters(n)
            ))
        .collect();

    mount_html(
        &server,
        "/circulars/index.html",
        format!(r#"<a href="circulars_{year}.html">{year}</a>"#),
    )
    .await;
    mount_html(
        &server,
        &format!("/circulars/circulars_{year}.html"),
        r#"<a href="annex.pdf">annex</a>"#.to_string(),
    )
    .await;
    mount_pdf(&server, "/circulars/annex.pdf", build_pdf(&pages)).await;

    let config = create_test_config(&server, &dir);
    let summary = run_crawl(config.clone(), "hash", None).await.unwrap();
    assert_eq!(summary.documents_processed, 1);
    assert_eq!(summary.profiles_added, 30);

    let storage = open(&config);
    let source = format!("{}/circulars/annex.pdf", server.uri());
    assert!(storage.is_processed(&source).unwrap());
    assert_eq!(storage.count_profiles_for_document(&source).unwrap(), 30);
    assert_eq!(storage.page_watermark(&source).unwrap(), None);
    assert_eq!(search_by_name(&storage, &format!("PERSON{}", letters(31))).unwrap().count, 0);
}

#[tokio::test]
async fn test_year_missing_from_index_uses_fallback_page() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let year = current_year();

    mount_html(&server, "/circulars/index.html", "<html>No years</html>".to_string()).await;
    mount_html(
        &server,
        &format!("/circulars/fallback_{year}.html"),
        r#"<a href="fallback.pdf">circular</a>"#.to_string(),
    )
    .await;
    mount_pdf(
        &server,
        "/circulars/fallback.pdf",
        circular("QDi.9", "AMIN", "HAQ", "Syria"),
    )
    .await;

    let config = create_test_config(&server, &dir);
    let summary = run_crawl(config.clone(), "hash", None).await.unwrap();
    assert_eq!(summary.profiles_added, 1);

    let stats = get_stats(&open(&config)).unwrap();
    assert_eq!(stats.total_profiles, 1);
    assert_eq!(stats.latest_year, Some(year));
    assert_eq!(stats.top_nationalities, vec![("Syria".to_string(), 1)]);
}

#[tokio::test]
async fn test_missing_year_page_yields_no_documents() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let year = current_year();
    mount_html(&server, "/circulars/index.html", "<html></html>".to_string()).await;

    let config = create_test_config(&server, &dir);
    let summary = run_crawl(config.clone(), "hash", Some(year)).await.unwrap();
    assert_eq!(summary.years_visited, vec![year]);
    assert_eq!(summary.years_completed, vec![year]);
    assert_eq!(summary.documents_processed, 0);
    assert_eq!(summary.documents_failed, 0);

    assert_eq!(open(&config).count_profiles(None).unwrap(), 0);
}

#[tokio::test]
async fn test_backup_is_uploaded_and_restored() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let year = current_year();
    mount_years(&server, &[year]).await;

    let backup = dir.path().join("backup/harvest.db");
    let mut config = create_test_config(&server, &dir);
    config.storage.backup_path = Some(backup.display().to_string());

    let first = run_crawl(config.clone(), "hash", None).await.unwrap();
    assert_eq!(first.profiles_added, 1);
    assert!(backup.is_file());

    // Lose the working copy; the next run restores it from the backup
    std::fs::remove_file(&config.storage.database_path).unwrap();
    let second = run_crawl(config.clone(), "hash", None).await.unwrap();
    assert_eq!(second.documents_skipped, 1);
    assert_eq!(second.profiles_added, 0);
    assert_eq!(open(&config).count_profiles(None).unwrap(), 1);
}

/// Serves one year page linking to `files`, each under `/circulars/`
async fn mount_year_page(server: &MockServer, year: i32, files: &[&str]) {
    let links: String = files
        .iter()
        .map(|f| format!(r#"<a href="{f}">{f}</a>"#))
        .collect();
    mount_html(
        server,
        "/circulars/index.html",
        format!(r#"<a href="circulars_{year}.html">{year}</a>"#),
    )
    .await;
    mount_html(
        server,
        &format!("/circulars/circulars_{year}.html"),
        format!("<html>{links}</html>"),
    )
    .await;
}

fn numbered_pages(count: i32) -> Vec<String> {
    (1..=count)
        .map(|n| {
            format!(
                "QDi.{n} Name: 1: LISTED 2: PERSON{} 3: na 4: na\nNationality: Oman",
                letters(n)
            )
        })
        .collect()
}

#[tokio::test]
async fn test_unreadable_circular_is_never_marked_processed() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let year = current_year();
    mount_year_page(&server, year, &["broken.pdf"]).await;
    mount_pdf(
        &server,
        "/circulars/broken.pdf",
        build_pdf_with_font(&numbered_pages(30), Object::Integer(1)),
    )
    .await;

    let config = create_test_config(&server, &dir);
    let source = format!("{}/circulars/broken.pdf", server.uri());

    let first = run_crawl(config.clone(), "hash", None).await.unwrap();
    assert_eq!(first.documents_failed, 1);
    assert_eq!(first.documents_processed, 0);
    {
        let storage = open(&config);
        assert!(!storage.is_processed(&source).unwrap());
        assert_eq!(storage.page_watermark(&source).unwrap(), None);
    }

    // A watermark left without profiles must not let the next run skip every page
    {
        let mut storage = open(&config);
        storage.record_watermark(&source, 30).unwrap();
        storage.close().unwrap();
    }

    let second = run_crawl(config.clone(), "hash", None).await.unwrap();
    assert_eq!(second.documents_failed, 1);
    assert_eq!(second.documents_processed, 0);
    assert!(!open(&config).is_processed(&source).unwrap());
}

#[tokio::test]
async fn test_resume_skips_pages_behind_watermark() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let year = current_year();
    mount_year_page(&server, year, &["annex.pdf"]).await;
    mount_pdf(&server, "/circulars/annex.pdf", build_pdf(&numbered_pages(12))).await;

    let config = create_test_config(&server, &dir);
    let source = format!("{}/circulars/annex.pdf", server.uri());

    // An earlier run committed pages 1..=10 before stopping
    {
        let mut storage = open(&config);
        storage
            .append_profile(&NewProfile {
                year,
                name: "EARLIER BATCH".to_string(),
                nationality: "Oman".to_string(),
                passport_no: "na".to_string(),
                source_document: source.clone(),
            })
            .unwrap();
        storage.record_watermark(&source, 10).unwrap();
        storage.close().unwrap();
    }

    let summary = run_crawl(config.clone(), "hash", None).await.unwrap();
    assert_eq!(summary.documents_processed, 1);
    assert_eq!(summary.profiles_added, 2);

    let storage = open(&config);
    assert!(storage.is_processed(&source).unwrap());
    assert_eq!(storage.page_watermark(&source).unwrap(), None);
    assert_eq!(storage.count_profiles_for_document(&source).unwrap(), 3);
    assert_eq!(search_by_name(&storage, &format!("PERSON{}", letters(5))).unwrap().count, 0);
    assert_eq!(search_by_name(&storage, &format!("PERSON{}", letters(11))).unwrap().count, 1);
}

#[tokio::test]
async fn test_time_budget_stops_after_current_document() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let year = current_year();
    mount_year_page(&server, year, &["slow.pdf", "later.pdf"]).await;
    Mock::given(method("GET"))
        .and(path("/circulars/slow.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(circular("QDi.1", "SLOW", "DOWNLOAD", "Iraq"))
                .set_delay(std::time::Duration::from_millis(1500)),
        )
        .mount(&server)
        .await;
    mount_pdf(
        &server,
        "/circulars/later.pdf",
        circular("QDi.2", "LATER", "CIRCULAR", "Syria"),
    )
    .await;

    let mut config = create_test_config(&server, &dir);
    config.crawler.time_budget_secs = 1;

    let first = run_crawl(config.clone(), "hash", None).await.unwrap();
    assert!(first.budget_exhausted);
    assert_eq!(first.documents_processed, 1);
    assert!(first.years_completed.is_empty());
    {
        let storage = open(&config);
        assert!(!storage
            .is_processed(&format!("{}/circulars/later.pdf", server.uri()))
            .unwrap());
        let run = storage.get_latest_run().unwrap().unwrap();
        assert_eq!(run.status.to_db_string(), "budget_exhausted");
        assert_eq!(run.documents_processed, 1);
    }

    // The next run picks up where the budget cut in
    config.crawler.time_budget_secs = 600;
    let second = run_crawl(config.clone(), "hash", None).await.unwrap();
    assert!(!second.budget_exhausted);
    assert_eq!(second.documents_skipped, 1);
    assert_eq!(second.documents_processed, 1);
    assert_eq!(second.years_completed, vec![year]);
    assert_eq!(open(&config).count_processed().unwrap(), 2);
}

#[tokio::test]
async fn test_zero_budget_visits_nothing() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let year = current_year();
    mount_years(&server, &[year]).await;

    let mut config = create_test_config(&server, &dir);
    config.crawler.time_budget_secs = 0;

    let summary = run_crawl(config.clone(), "hash", None).await.unwrap();
    assert!(summary.budget_exhausted);
    assert!(summary.years_visited.is_empty());

    let storage = open(&config);
    assert_eq!(storage.count_profiles(None).unwrap(), 0);
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status.to_db_string(), "budget_exhausted");
}
