// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 预检请求测试
///
/// 使用 wiremock 验证状态码与内容类型判定、HEAD 回退以及
/// 被拒绝页面不会进入浏览器
use super::helpers::*;
use a11y_crawler::audits::registry::AuditPluginRegistry;
use a11y_crawler::config::settings::{Settings, DEFAULT_AUDIT};
use a11y_crawler::utils::preflight::{PreflightChecker, PreflightVerdict};
use a11y_crawler::workers::audit_worker::{BROKEN_LINKS_STREAM, UNEXPECTED_RESPONSE_STREAM};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = "<html><body>ok</body></html>";

fn html() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(PAGE, "text/html; charset=utf-8")
}

fn checker() -> PreflightChecker {
    PreflightChecker::new("a11y-crawler-test", Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_html_page_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/ok"))
        .respond_with(html())
        .expect(1)
        .mount(&server)
        .await;

    let verdict = checker().check(&format!("{}/ok", server.uri()), true).await;

    assert!(verdict.is_admitted());
    assert!(matches!(verdict, PreflightVerdict::Accepted { status: 200, .. }));
}

#[tokio::test]
async fn test_error_status_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let verdict = checker()
        .check(&format!("{}/missing", server.uri()), true)
        .await;

    match verdict {
        PreflightVerdict::Rejected { status, .. } => assert_eq!(status, 404),
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_html_content_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(path("/report"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.7", "application/pdf"))
        .mount(&server)
        .await;

    let verdict = checker()
        .check(&format!("{}/report", server.uri()), true)
        .await;

    match verdict {
        PreflightVerdict::Rejected {
            status,
            content_type,
            ..
        } => {
            assert_eq!(status, 200);
            assert_eq!(content_type, "application/pdf");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_redirect_is_followed_to_final_page() {
    let server = MockServer::start().await;
    Mock::given(path("/moved"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("Location", format!("{}/ok", server.uri()).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(path("/ok"))
        .respond_with(html())
        .mount(&server)
        .await;

    let verdict = checker()
        .check(&format!("{}/moved", server.uri()), true)
        .await;

    match verdict {
        PreflightVerdict::Accepted { status, final_url } => {
            assert_eq!(status, 200);
            assert_eq!(final_url, format!("{}/ok", server.uri()));
        }
        other => panic!("expected acceptance, got {:?}", other),
    }
}

#[tokio::test]
async fn test_head_not_allowed_falls_back_to_get() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/no-head"))
        .respond_with(ResponseTemplate::new(405))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/no-head"))
        .respond_with(html())
        .expect(1)
        .mount(&server)
        .await;

    let verdict = checker()
        .check(&format!("{}/no-head", server.uri()), true)
        .await;

    assert!(verdict.is_admitted());
}

#[tokio::test]
async fn test_no_head_site_uses_get_directly() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(html())
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(html())
        .expect(1)
        .mount(&server)
        .await;

    let verdict = checker()
        .check(&format!("{}/page", server.uri()), false)
        .await;

    assert!(verdict.is_admitted());
}

#[tokio::test]
async fn test_unreachable_host_is_admitted() {
    // Nothing listens on the discard port
    let verdict = checker().check("http://127.0.0.1:9/", true).await;

    assert!(matches!(verdict, PreflightVerdict::Unreachable { .. }));
    assert!(verdict.is_admitted());
}

#[tokio::test]
async fn test_rejected_seed_never_reaches_the_browser() {
    let server = MockServer::start().await;
    Mock::given(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let seed = format!("{}/missing", server.uri());
    let site = MockSite::new();

    let settings = Settings {
        perform_header_check: true,
        ..test_settings()
    };
    let registry = crawl_registry(&settings, vec![crawl_row("Org", &seed, "Health")]);
    let run = run_audit(
        settings,
        &registry,
        site.clone(),
        AuditPluginRegistry::with_builtins(),
    )
    .await;

    assert!(site.navigations().is_empty());
    assert!(run.results.rows(DEFAULT_AUDIT).is_empty());
    assert_eq!(run.results.column(UNEXPECTED_RESPONSE_STREAM, "status"), vec!["404"]);
    assert_eq!(run.results.column(UNEXPECTED_RESPONSE_STREAM, "url"), vec![seed]);
    assert_eq!(
        run.report
            .workers
            .iter()
            .map(|w| w.skipped_by_preflight)
            .sum::<usize>(),
        1
    );
    assert_eq!(run.progress.snapshot().percent, 100);
}

#[tokio::test]
async fn test_accepted_seed_is_audited() {
    let server = MockServer::start().await;
    Mock::given(path("/ok"))
        .respond_with(html())
        .mount(&server)
        .await;
    let seed = format!("{}/ok", server.uri());
    let site = MockSite::new();
    site.page_with_links(&seed, "Fixture", &[]);

    let settings = Settings {
        perform_header_check: true,
        ..test_settings()
    };
    let registry = crawl_registry(&settings, vec![crawl_row("Org", &seed, "Health")]);
    let run = run_audit(
        settings,
        &registry,
        site.clone(),
        AuditPluginRegistry::with_builtins(),
    )
    .await;

    assert_eq!(site.navigation_count(&seed), 2);
    assert!(run.results.rows(UNEXPECTED_RESPONSE_STREAM).is_empty());
    assert_eq!(
        run.results.column(DEFAULT_AUDIT, "page_title"),
        vec!["Fixture", "Fixture"]
    );
}

#[tokio::test]
async fn test_broken_internal_links_are_recorded() {
    let server = MockServer::start().await;
    Mock::given(path("/fine"))
        .respond_with(html())
        .mount(&server)
        .await;
    Mock::given(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    let seed = format!("{}/", server.uri());
    let site = MockSite::new();
    site.page_with_links(&seed, "Home", &["/fine", "/gone", "https://elsewhere.test/"]);

    // No link budget: only the seed is loaded, its links are probed over HTTP
    let settings = Settings {
        check_for_broken_internal_links: true,
        max_links_per_domain: 0,
        ..test_settings()
    };
    let registry = crawl_registry(&settings, vec![crawl_row("Org", &seed, "Health")]);
    let run = run_audit(
        settings,
        &registry,
        site.clone(),
        AuditPluginRegistry::with_builtins(),
    )
    .await;

    assert_eq!(site.visited_urls(), vec![seed.clone()]);
    assert_eq!(
        run.results.column(BROKEN_LINKS_STREAM, "broken_link"),
        vec![format!("{}/gone", server.uri())]
    );
    assert_eq!(run.results.column(BROKEN_LINKS_STREAM, "status"), vec!["410"]);
    assert_eq!(run.results.column(BROKEN_LINKS_STREAM, "url"), vec![seed]);
}

#[tokio::test]
async fn test_link_status_respects_no_head_sites() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let status = checker()
        .status_of(&format!("{}/gone", server.uri()), false)
        .await;

    assert_eq!(status, Some(404));
}

#[tokio::test]
async fn test_link_status_uses_head_when_allowed() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/fine"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(html())
        .expect(0)
        .mount(&server)
        .await;

    let status = checker()
        .status_of(&format!("{}/fine", server.uri()), true)
        .await;

    assert_eq!(status, Some(200));
}
