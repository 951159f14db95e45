//! Anchor-paginated packet search, detail pages and attachment downloads
//! against a local mock of the RRC site.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use harvester::models::{CacheConfig, CrawlerConfig, PageRequest, SearchCriteria, SearchMode};
use harvester::pipeline::{CrawlOptions, run_crawl};
use harvester::services::{Fetcher, RateLimiter, RetryPolicy};
use harvester::sites::RrcSite;
use harvester::storage::{PageCache, open_cache};
use harvester::utils::{Shutdown, http};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RESULTS_1: &str = include_str!("fixtures/rrc/results_1.html");
const RESULTS_2: &str = include_str!("fixtures/rrc/results_2.html");
const PACKET_501: &str = include_str!("fixtures/rrc/packet_501.html");
const PACKET_502: &str = include_str!("fixtures/rrc/packet_502.html");
const HOME: &str = include_str!("fixtures/rrc/home.html");

const SEARCH_PATH: &str = "/CMPL/publicSearchAction.do";
const METHOD: &str = "formData.methodHndlr.inputValue";

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body)
}

fn document(content_type: &str, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", content_type)
        .set_body_bytes(body.as_bytes().to_vec())
}

fn fetcher(cache: Arc<dyn PageCache>) -> Arc<Fetcher> {
    let client = http::create_client(&CrawlerConfig::default()).unwrap();
    Arc::new(Fetcher::new(
        client,
        cache,
        RateLimiter::disabled(),
        RetryPolicy {
            max_retries: 0,
            base_delay: Duration::ZERO,
        },
        Shutdown::never(),
    ))
}

async fn disk_cache(dir: &TempDir) -> Arc<dyn PageCache> {
    open_cache(&CacheConfig {
        enabled: true,
        dir: dir.path().join("cache"),
    })
    .await
}

fn options(dir: &TempDir, download: bool) -> CrawlOptions {
    CrawlOptions {
        max_pages: 50,
        max_concurrent: 3,
        download_dir: dir.path().join("downloads"),
        skip_existing: true,
        download,
    }
}

fn site(server: &MockServer, mode: SearchMode) -> RrcSite {
    RrcSite::new(
        Url::parse(&format!("{}{SEARCH_PATH}", server.uri())).unwrap(),
        mode,
    )
}

fn criteria() -> SearchCriteria {
    SearchCriteria::new("01/01/2018", "12/31/2018", "251726").unwrap()
}

async fn mount_results(server: &MockServer) {
    Mock::given(method("GET"))
        .and(query_param(METHOD, "search"))
        .and(query_param("pager.offset", "0"))
        .respond_with(html(RESULTS_1))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("pager.offset", "100"))
        .respond_with(html(RESULTS_2))
        .mount(server)
        .await;
}

async fn mount_details(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("packetId", "501"))
        .respond_with(html(PACKET_501))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("packetId", "502"))
        .respond_with(html(PACKET_502))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dpimages/r/5001"))
        .respond_with(document("image/tiff", "II*\0tiff"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/dpimages/r/\d+$"))
        .respond_with(document("application/pdf", "%PDF-1.4 attachment"))
        .mount(server)
        .await;
}

/// Relative paths of every file under `root`.
fn files_under(root: &Path) -> BTreeSet<String> {
    fn walk(dir: &Path, root: &Path, out: &mut BTreeSet<String>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(&path, root, out);
            } else {
                let rel = path.strip_prefix(root).unwrap();
                out.insert(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    let mut out = BTreeSet::new();
    walk(root, root, &mut out);
    out
}

fn detail_requests(requests: &[wiremock::Request]) -> usize {
    requests
        .iter()
        .filter(|r| r.url.query().is_some_and(|q| q.contains("packetSummary")))
        .count()
}

#[tokio::test]
async fn test_query_search_reads_details_and_downloads() {
    let server = MockServer::start().await;
    mount_results(&server).await;
    mount_details(&server).await;
    let dir = TempDir::new().unwrap();

    let outcome = run_crawl(
        &site(&server, SearchMode::Query),
        fetcher(disk_cache(&dir).await),
        criteria(),
        &options(&dir, true),
    )
    .await
    .unwrap();

    assert_eq!(outcome.pages, 2);
    let ids: Vec<_> = outcome.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["501", "502"]);

    let first = &outcome.records[0];
    assert_eq!(first.api_no, "42-001-00001");
    assert_eq!(
        first.url,
        format!("{}{SEARCH_PATH}?packetSummary=1&packetId=501", server.uri())
    );
    assert_eq!(first.operator_name.as_deref(), Some("Acme Oil & Gas"));
    assert_eq!(first.forms.len(), 3);

    let report = outcome.report.unwrap();
    assert_eq!(report.downloaded, 4);
    assert_eq!(report.skipped, 0);
    assert!(report.failures.is_empty());

    let files = files_under(&dir.path().join("downloads"));
    let expected: BTreeSet<String> = [
        "42-001-00001/Acme Oil & Gas/W-2-4800.pdf",
        "42-001-00001/Acme Oil & Gas/Other-4821.pdf",
        "42-001-00001/Acme Oil & Gas/Other-4902.pdf",
        "42-001-00002/Acme Oil & Gas/G-1-5001.tif",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    assert_eq!(files, expected);

    let pdf = dir
        .path()
        .join("downloads/42-001-00001/Acme Oil & Gas/Other-4821.pdf");
    assert_eq!(std::fs::read(pdf).unwrap(), b"%PDF-1.4 attachment");
}

#[tokio::test]
async fn test_second_run_skips_downloads_and_hits_cache() {
    let server = MockServer::start().await;
    mount_results(&server).await;
    mount_details(&server).await;
    let dir = TempDir::new().unwrap();
    let site = site(&server, SearchMode::Query);

    let first = run_crawl(
        &site,
        fetcher(disk_cache(&dir).await),
        criteria(),
        &options(&dir, true),
    )
    .await
    .unwrap();
    let files_after_first = files_under(&dir.path().join("downloads"));
    let details_after_first = detail_requests(&server.received_requests().await.unwrap());
    assert_eq!(details_after_first, 2);

    let second = run_crawl(
        &site,
        fetcher(disk_cache(&dir).await),
        criteria(),
        &options(&dir, true),
    )
    .await
    .unwrap();

    let report = second.report.unwrap();
    assert_eq!(report.downloaded, 0);
    assert_eq!(report.skipped, first.report.unwrap().downloaded);
    assert_eq!(files_under(&dir.path().join("downloads")), files_after_first);

    // Detail pages came from the cache; search pages never do.
    let requests = server.received_requests().await.unwrap();
    assert_eq!(detail_requests(&requests), details_after_first);
    assert_eq!(second.records, first.records);
}

#[tokio::test]
async fn test_cached_page_is_byte_identical() {
    let server = MockServer::start().await;
    mount_details(&server).await;
    let dir = TempDir::new().unwrap();
    let fetcher = fetcher(disk_cache(&dir).await);

    let url = Url::parse(&format!(
        "{}{SEARCH_PATH}?packetSummary=1&packetId=501",
        server.uri()
    ))
    .unwrap();
    let live = fetcher.fetch(&PageRequest::cached_get(url.clone())).await.unwrap();
    let cached = fetcher.fetch(&PageRequest::cached_get(url)).await.unwrap();

    assert!(!live.from_cache);
    assert!(cached.from_cache);
    assert_eq!(live.body, PACKET_501);
    assert_eq!(cached.body, live.body);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_uncacheable_requests_always_hit_network() {
    let server = MockServer::start().await;
    mount_results(&server).await;
    let dir = TempDir::new().unwrap();
    let fetcher = fetcher(disk_cache(&dir).await);

    let url = Url::parse(&format!(
        "{}{SEARCH_PATH}?{METHOD}=search&pager.offset=0",
        server.uri()
    ))
    .unwrap();
    fetcher.fetch(&PageRequest::get(url.clone())).await.unwrap();
    let again = fetcher.fetch(&PageRequest::get(url)).await.unwrap();

    assert!(!again.from_cache);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_attachment_is_isolated_to_its_record() {
    let server = MockServer::start().await;
    mount_results(&server).await;
    Mock::given(method("GET"))
        .and(path("/dpimages/r/5001"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_details(&server).await;
    let dir = TempDir::new().unwrap();

    let outcome = run_crawl(
        &site(&server, SearchMode::Query),
        fetcher(disk_cache(&dir).await),
        criteria(),
        &options(&dir, true),
    )
    .await
    .unwrap();

    let report = outcome.report.unwrap();
    assert_eq!(report.downloaded, 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "502");
}

#[tokio::test]
async fn test_form_search_posts_home_form() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param(METHOD, "init"))
        .respond_with(html(HOME))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .and(body_string_contains("formData.methodHndlr.inputValue=search"))
        .respond_with(html(RESULTS_2))
        .mount(&server)
        .await;
    mount_details(&server).await;
    let dir = TempDir::new().unwrap();

    let outcome = run_crawl(
        &site(&server, SearchMode::Form),
        fetcher(disk_cache(&dir).await),
        criteria(),
        &options(&dir, false),
    )
    .await
    .unwrap();

    assert_eq!(outcome.pages, 1);
    assert!(outcome.report.is_none());
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].id, "502");
    assert_eq!(outcome.records[0].forms.len(), 1);

    let requests = server.received_requests().await.unwrap();
    let post = requests
        .iter()
        .find(|r| r.method.as_str() == "POST")
        .map(|r| String::from_utf8_lossy(&r.body).into_owned())
        .unwrap();
    assert!(post.contains("searchArgs.fromSubmitDtArgHndlr.inputValue=01%2F01%2F2018"));
    assert!(post.contains("searchArgs.toSubmitDtArgHndlr.inputValue=12%2F31%2F2018"));
    assert!(post.contains("searchArgs.operatorNoArgHndlr.inputValue=251726"));
    assert!(!post.contains("excludeStatusAndApprovedDtHndlr"));
    assert!(!post.contains("search=Search"));
    assert!(!post.contains("clear="));
}

#[tokio::test]
async fn test_redirected_detail_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/CMPL/detail.do"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/CMPL/expired.do"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/CMPL/expired.do"))
        .respond_with(html("<p>Session expired</p>"))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let cache = disk_cache(&dir).await;
    let fetcher = fetcher(Arc::clone(&cache));

    let url = Url::parse(&format!("{}/CMPL/detail.do?packetId=501", server.uri())).unwrap();
    let page = fetcher
        .fetch(&PageRequest::cached_get(url.clone()))
        .await
        .unwrap();

    assert_eq!(page.url.path(), "/CMPL/expired.do");
    assert!(cache.get(url.as_str()).await.is_none());
    assert!(cache.get(page.url.as_str()).await.is_none());
}

#[tokio::test]
async fn test_self_linking_next_page_is_not_revisited() {
    let server = MockServer::start().await;
    // Page two's [Next>] points back at itself.
    let looping = RESULTS_2.replace(
        "<td>[Next&gt;]</td>",
        r#"<td><a href="publicSearchAction.do;jsessionid=0A1B2C3D?pager.offset=100&amp;pager.pageSize=100">[Next&gt;]</a></td>"#,
    );
    Mock::given(method("GET"))
        .and(query_param(METHOD, "search"))
        .and(query_param("pager.offset", "0"))
        .respond_with(html(RESULTS_1))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("pager.offset", "100"))
        .respond_with(html(&looping))
        .mount(&server)
        .await;
    mount_details(&server).await;
    let dir = TempDir::new().unwrap();

    let outcome = run_crawl(
        &site(&server, SearchMode::Query),
        fetcher(disk_cache(&dir).await),
        criteria(),
        &options(&dir, false),
    )
    .await
    .unwrap();

    assert_eq!(outcome.pages, 2);
    let ids: Vec<_> = outcome.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["501", "502"]);

    let requests = server.received_requests().await.unwrap();
    let second_page_gets = requests
        .iter()
        .filter(|r| r.url.query().is_some_and(|q| q.contains("pager.offset=100")))
        .count();
    assert_eq!(second_page_gets, 1);
}

#[tokio::test]
async fn test_failed_write_leaves_no_partial_file() {
    let server = MockServer::start().await;
    mount_results(&server).await;
    mount_details(&server).await;
    let dir = TempDir::new().unwrap();

    // A directory in the way makes the final rename fail.
    let record_dir = dir.path().join("downloads/42-001-00001/Acme Oil & Gas");
    std::fs::create_dir_all(record_dir.join("Other-4821.pdf")).unwrap();

    let mut options = options(&dir, true);
    options.skip_existing = false;
    let outcome = run_crawl(
        &site(&server, SearchMode::Query),
        fetcher(disk_cache(&dir).await),
        criteria(),
        &options,
    )
    .await
    .unwrap();

    let report = outcome.report.unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "501");

    let files = files_under(&dir.path().join("downloads"));
    assert!(files.iter().all(|f| !f.ends_with(".part")), "{files:?}");
    assert!(files.contains("42-001-00002/Acme Oil & Gas/G-1-5001.tif"));
}
