//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the portal and tempfile for the
//! output root, and run jobs end-to-end through the real fetcher and sink.

use portal_harvest::config::{JobEntry, OutputConfig};
use portal_harvest::crawler::{
    run_parallel, Coordinator, CrawlJob, FetchError, FetchSettings, Fetcher, PageMarker,
};
use portal_harvest::output::{index, FileSink};
use portal_harvest::sites::{discover_issues, SiteKind};
use portal_harvest::{HarvestError, JobState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_settings() -> FetchSettings {
    FetchSettings {
        timeout: Duration::from_secs(5),
        retry_delay: Duration::from_millis(10),
        max_retries: 3,
    }
}

fn fetcher() -> Arc<Fetcher> {
    Arc::new(Fetcher::new(test_settings(), None).unwrap())
}

fn coordinator(fetcher: Arc<Fetcher>) -> Coordinator {
    let sink = Arc::new(FileSink::new(Arc::clone(&fetcher)));
    Coordinator::new(fetcher, sink, vec!["mp4".to_string()])
}

fn output(root: &Path) -> OutputConfig {
    OutputConfig {
        root: root.to_path_buf(),
        index: PathBuf::from("index.db"),
        parallel_workers: 0,
    }
}

fn entry(name: &str, site: SiteKind, url: String, save_dir: &str, marker: Option<PageMarker>) -> JobEntry {
    JobEntry {
        name: name.to_string(),
        site,
        url,
        save_dir: PathBuf::from(save_dir),
        sheet: None,
        page_marker: marker,
    }
}

/// Wraps a body in a page that declares UTF-8
fn page(body: &str) -> String {
    format!(
        r#"<html><head><meta charset="utf-8"></head><body>{}</body></html>"#,
        body
    )
}

async fn mount_page(server: &MockServer, at: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(page(body))
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

fn news_listing(pages: usize, links: &[(&str, &str)]) -> String {
    let items: String = links
        .iter()
        .map(|(href, title)| format!(r#"<li><span class="tit"><a href="{}">{}</a></span></li>"#, href, title))
        .collect();
    format!(
        r#"<div class="zx_ml_list"><ul>{}</ul></div>
        <script>createPageHTML({}, 0, "index", "htm");</script>"#,
        items, pages
    )
}

fn article(paragraphs: &[&str]) -> String {
    let ps: String = paragraphs.iter().map(|p| format!("<p>{}</p>", p)).collect();
    format!(r#"<div class="TRS_Editor">{}</div>"#, ps)
}

// ===== Fetcher =====

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&server)
        .await;

    let url = format!("{}/flaky", server.uri());
    let err = fetcher().fetch_text(&url).await.unwrap_err();

    match err {
        FetchError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 4),
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_timeouts_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .expect(4)
        .mount(&server)
        .await;

    let settings = FetchSettings {
        timeout: Duration::from_millis(200),
        ..test_settings()
    };
    let fetcher = Fetcher::new(settings, None).unwrap();

    let url = format!("{}/slow", server.uri());
    match fetcher.fetch_text(&url).await.unwrap_err() {
        FetchError::RetriesExhausted { attempts, last, .. } => {
            assert_eq!(attempts, 4);
            assert_eq!(last, "Request timeout");
        }
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_recovers_after_transient_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/recovering"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_page(&server, "/recovering", "恢复了").await;

    let url = format!("{}/recovering", server.uri());
    let text = fetcher().fetch_text(&url).await.unwrap();
    assert!(text.contains("恢复了"));
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/gone", server.uri());
    let err = fetcher().fetch_text(&url).await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_connection_refused_is_not_retried() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let slow_retries = FetchSettings {
        timeout: Duration::from_secs(5),
        retry_delay: Duration::from_secs(5),
        max_retries: 3,
    };
    let fetcher = Fetcher::new(slow_retries, None).unwrap();

    let started = Instant::now();
    let err = fetcher
        .fetch_text(&format!("http://127.0.0.1:{}/", port))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Connect { .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_every_request_sends_a_user_agent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ua"))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page("ok")))
        .expect(3)
        .mount(&server)
        .await;

    let fetcher = fetcher();
    for _ in 0..3 {
        fetcher.fetch_text(&format!("{}/ua", server.uri())).await.unwrap();
    }
}

#[tokio::test]
async fn test_undeclared_pages_decode_as_gbk() {
    let server = MockServer::start().await;
    let (bytes, _, _) = encoding_rs::GBK.encode("<p>深圳市人民政府</p>");

    Mock::given(method("GET"))
        .and(path("/gbk"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes.into_owned()))
        .mount(&server)
        .await;

    let text = fetcher().fetch_text(&format!("{}/gbk", server.uri())).await.unwrap();
    assert!(text.contains("深圳市人民政府"));
}

// ===== Coordinator =====

#[tokio::test]
async fn test_news_job_end_to_end() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    mount_page(
        &server,
        "/news/index.htm",
        &news_listing(3, &[("./a1.htm", "第一条"), ("./a2.htm", "空白稿"), ("./a4.htm", "失踪稿")]),
    )
    .await;
    // index_1.htm is not mounted and answers 404
    mount_page(&server, "/news/index_2.htm", &news_listing(3, &[("./a3.htm", "第三条")])).await;
    mount_page(&server, "/news/a1.htm", &article(&["一段", "二段"])).await;
    mount_page(&server, "/news/a2.htm", &article(&["   "])).await;
    mount_page(&server, "/news/a3.htm", &article(&["三段"])).await;

    let job = CrawlJob::from_entry(
        &entry(
            "news",
            SiteKind::News,
            format!("{}/news/index.htm", server.uri()),
            "新闻发布/新闻发布稿",
            Some(PageMarker::create_page_html()),
        ),
        &output(root.path()),
    )
    .unwrap();

    let summary = coordinator(fetcher()).run(&job).await.unwrap();

    assert_eq!(summary.state, JobState::Completed);
    assert_eq!(summary.pages_total, 3);
    assert_eq!(summary.pages_skipped, 1);
    assert_eq!(summary.items_seen, 4);
    assert_eq!(summary.items_fetch_failed, 1);
    assert_eq!(summary.records_empty, 1);
    assert_eq!(summary.records_written, 2);
    assert_eq!(summary.index_rows_appended, 2);

    let dir = root.path().join("新闻发布/新闻发布稿");
    let first = std::fs::read_to_string(dir.join("第一条.md")).unwrap();
    assert!(first.contains("一段"));
    assert!(first.contains("二段"));
    assert!(dir.join("第三条.md").exists());
    assert!(!dir.join("空白稿.md").exists());

    let rows = index::read_rows(&root.path().join("index.db"), "新闻发布_新闻发布稿").unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], "第一条");
    assert_eq!(rows[0][1], format!("{}/news/a1.htm", server.uri()));
    assert_eq!(rows[1][0], "第三条");
}

#[tokio::test]
async fn test_second_run_appends_rows() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    mount_page(&server, "/news/index.htm", &news_listing(1, &[("./a1.htm", "稿件")])).await;
    mount_page(&server, "/news/a1.htm", &article(&["正文"])).await;

    let job = CrawlJob::from_entry(
        &entry(
            "news",
            SiteKind::News,
            format!("{}/news/index.htm", server.uri()),
            "新闻",
            Some(PageMarker::create_page_html()),
        ),
        &output(root.path()),
    )
    .unwrap();

    let coordinator = coordinator(fetcher());
    coordinator.run(&job).await.unwrap();
    coordinator.run(&job).await.unwrap();

    let rows = index::read_rows(&root.path().join("index.db"), "新闻").unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_pagination_failure_writes_nothing() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    mount_page(&server, "/files/index.htm", "<p>no page script here</p>").await;

    let job = CrawlJob::from_entry(
        &entry(
            "files",
            SiteKind::GovernmentFiles,
            format!("{}/files/index.htm", server.uri()),
            "政府文件",
            Some(PageMarker::create_page_html()),
        ),
        &output(root.path()),
    )
    .unwrap();

    let err = coordinator(fetcher()).run(&job).await.unwrap_err();

    assert!(matches!(err, HarvestError::Pagination { .. }));
    assert!(!root.path().join("政府文件").exists());
    assert!(!root.path().join("index.db").exists());
}

#[tokio::test]
async fn test_notice_attachments_skip_video() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    mount_page(
        &server,
        "/zfwj/szfl/index.htm",
        r#"<div class="zx_ml_list"><ul>
            <li><div><a href="../../docs/t1.htm">通知</a></div></li>
        </ul></div>
        <script>createPageHTML(1, 0, "index", "htm");</script>"#,
    )
    .await;
    mount_page(
        &server,
        "/docs/t1.htm",
        r#"<div class="xx_con">
            <p><b>索引号：</b>000-1</p>
            <p><b>分类：</b>通知公告</p>
            <p><b>发布机构：</b>市政府</p>
            <p><b>发布日期：</b>2019-07-08</p>
            <p><b>名称：</b>关于试行的通知</p>
            <p><b>文号：</b>深府〔2019〕1号</p>
            <p><b>主题词：</b></p>
        </div>
        <div class="news_cont_d_wrap"><p>正文内容。</p></div>
        <div class="fjdown"><script>
            var linkdesc="附件1;宣传片";
            var linkurl="./f1.pdf;./v.mp4";
        </script></div>"#,
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/docs/f1.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/v.mp4"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let job = CrawlJob::from_entry(
        &entry(
            "files",
            SiteKind::GovernmentFiles,
            format!("{}/zfwj/szfl/index.htm", server.uri()),
            "政府文件/市府令",
            Some(PageMarker::create_page_html()),
        ),
        &output(root.path()),
    )
    .unwrap();

    let summary = coordinator(fetcher()).run(&job).await.unwrap();

    assert_eq!(summary.records_written, 1);
    assert_eq!(summary.attachments_downloaded, 1);
    assert_eq!(summary.attachments_skipped, 1);

    let doc_dir = root.path().join("政府文件/市府令/关于试行的通知");
    assert!(doc_dir.join("关于试行的通知.md").exists());
    assert_eq!(std::fs::read(doc_dir.join("附件1.pdf")).unwrap(), b"%PDF-1.4");
    assert!(!doc_dir.join("宣传片.mp4").exists());

    let rows = index::read_rows(&root.path().join("index.db"), "政府文件_市府令").unwrap();
    assert_eq!(
        rows[0],
        vec!["000-1", "广东省", "深圳市", "通知公告", "深府〔2019〕1号", "市政府", "2019-07-08", "关于试行的通知", " "]
    );
}

#[tokio::test]
async fn test_bulletin_issue_job() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    mount_page(
        &server,
        "/zfgb/2019/gb2/",
        r#"<select name="select3">
            <option value="">往期回顾</option>
            <option value="./gb2/">2019年第2期</option>
            <option value="./gb1/">2019年第1期</option>
        </select>
        <div class="zx_zwgb_left"><script>
            opath.push("./201902/t1.htm");
        </script></div>"#,
    )
    .await;
    mount_page(
        &server,
        "/zfgb/2019/gb2/201902/t1.htm",
        r#"<div class="xx_con">
            <p>索引号：</p><p>市政府令</p><p>市政府</p><p>2019-02-01</p><p>深圳市某某规定</p><p>令第1号</p><p>规定</p>
        </div>
        <div class="news_cont_d_wrap"><p>第一条。</p></div>"#,
    )
    .await;

    let bulletin = entry(
        "bulletin",
        SiteKind::Bulletin,
        format!("{}/zfgb/2019/gb2/", server.uri()),
        "政府公报",
        None,
    );

    let fetcher = fetcher();
    let issues = discover_issues(&fetcher, &bulletin.url).await.unwrap();
    assert_eq!(issues.len(), 2);
    assert_eq!(issues[0].title, "2019年第2期");
    assert_eq!(issues[1].url, format!("{}/zfgb/2019/gb1/", server.uri()));

    let job = CrawlJob::for_issue(&bulletin, &output(root.path()), &issues[0]).unwrap();
    let summary = coordinator(fetcher).run(&job).await.unwrap();
    assert_eq!(summary.records_written, 1);

    let doc = root.path().join("政府公报/2019年第2期/市政府令/深圳市某某规定.md");
    assert!(doc.exists(), "missing {}", doc.display());

    let rows = index::read_rows(&root.path().join("index.db"), "政府公报").unwrap();
    assert_eq!(rows[0][0], "2019年第2期");
    assert_eq!(rows[0].len(), 10);
}

#[tokio::test]
async fn test_parallel_outcomes_keep_job_order() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    mount_page(&server, "/a/index.htm", &news_listing(1, &[("./x.htm", "甲")])).await;
    mount_page(&server, "/a/x.htm", &article(&["甲文"])).await;
    mount_page(&server, "/b/index.htm", "<p>broken listing</p>").await;
    mount_page(&server, "/c/index.htm", &news_listing(1, &[("./y.htm", "丙")])).await;
    mount_page(&server, "/c/y.htm", &article(&["丙文"])).await;

    let out = output(root.path());
    let jobs: Vec<CrawlJob> = ["a", "b", "c"]
        .iter()
        .map(|name| {
            CrawlJob::from_entry(
                &entry(
                    name,
                    SiteKind::News,
                    format!("{}/{}/index.htm", server.uri(), name),
                    name,
                    Some(PageMarker::create_page_html()),
                ),
                &out,
            )
            .unwrap()
        })
        .collect();

    let outcomes = run_parallel(Arc::new(coordinator(fetcher())), jobs, 2).await;

    let names: Vec<&str> = outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert!(outcomes[0].is_success());
    assert!(!outcomes[1].is_success());
    assert!(outcomes[2].is_success());

    assert!(root.path().join("a/甲.md").exists());
    assert!(root.path().join("c/丙.md").exists());
}
