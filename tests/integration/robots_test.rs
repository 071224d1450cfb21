// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// robots.txt 测试
///
/// 验证抓取失败时的放行策略，以及前沿与 worker 对 robots 规则的遵守
use super::helpers::*;
use a11y_crawler::audits::registry::AuditPluginRegistry;
use a11y_crawler::config::settings::{Settings, DEFAULT_AUDIT};
use a11y_crawler::utils::robots::{RobotsFetcher, MAX_ROBOTS_BYTES};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRIVATE_RULES: &str = "User-agent: *\nDisallow: /private\n";

async fn robots_server(response: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(response)
        .mount(&server)
        .await;
    server
}

fn plain_text(body: impl Into<Vec<u8>>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/plain; charset=utf-8")
}

fn fetcher() -> RobotsFetcher {
    RobotsFetcher::new("a11y-crawler-test").unwrap()
}

#[tokio::test]
async fn test_fetch_parses_plain_text_rules() {
    let server = robots_server(plain_text(PRIVATE_RULES)).await;
    let base = server.uri();

    let rules = fetcher().fetch(&base).await;

    assert!(!rules.is_permissive());
    assert!(!rules.allows(&format!("{}/private/page", base), "accessibility-crawler"));
    assert!(rules.allows(&format!("{}/public", base), "accessibility-crawler"));
}

#[tokio::test]
async fn test_agent_specific_group_applies_to_default_product_token() {
    let token = Settings::default().user_agent_product_token;
    let body = format!(
        "User-agent: {}\nDisallow: /\n\nUser-agent: *\nAllow: /\n",
        token
    );
    let server = robots_server(plain_text(body)).await;
    let base = server.uri();

    let rules = fetcher().fetch(&base).await;

    assert!(!rules.allows(&format!("{}/page", base), &token));
    assert!(rules.allows(&format!("{}/page", base), "other-bot"));
}

#[tokio::test]
async fn test_agent_group_blocks_default_crawl() {
    let token = Settings::default().user_agent_product_token;
    let body = format!(
        "User-agent: *\nAllow: /\n\nUser-agent: {}\nDisallow: /members\n",
        token
    );
    let server = robots_server(plain_text(body)).await;
    let seed = format!("{}/", server.uri());
    let site = MockSite::new();
    site.page_with_links(&seed, "Home", &["/members/login", "/news"]);

    let settings = Settings {
        follow_robots_txt: true,
        ..test_settings()
    };
    let registry = crawl_registry(&settings, vec![crawl_row("Org", &seed, "Health")]);
    run_audit(
        settings,
        &registry,
        site.clone(),
        AuditPluginRegistry::with_builtins(),
    )
    .await;

    assert_eq!(
        site.visited_urls(),
        vec![seed.clone(), format!("{}/news", server.uri())]
    );
}

#[tokio::test]
async fn test_html_robots_is_treated_as_allow_all() {
    let server = robots_server(
        ResponseTemplate::new(200).set_body_raw("<html>Disallow: /</html>", "text/html"),
    )
    .await;

    assert!(fetcher().fetch(&server.uri()).await.is_permissive());
}

#[tokio::test]
async fn test_missing_robots_is_treated_as_allow_all() {
    let server = robots_server(ResponseTemplate::new(404)).await;

    assert!(fetcher().fetch(&server.uri()).await.is_permissive());
}

#[tokio::test]
async fn test_oversized_robots_is_treated_as_allow_all() {
    let body = format!("User-agent: *\nDisallow: /\n#{}", "x".repeat(MAX_ROBOTS_BYTES));
    let server = robots_server(plain_text(body)).await;

    assert!(fetcher().fetch(&server.uri()).await.is_permissive());
}

#[tokio::test]
async fn test_unreachable_robots_is_treated_as_allow_all() {
    assert!(fetcher().fetch("http://127.0.0.1:9").await.is_permissive());
}

async fn crawl_with_robots(follow_robots_txt: bool) -> (Arc<MockSite>, String) {
    let server = robots_server(plain_text(PRIVATE_RULES)).await;
    let base = server.uri();
    let seed = format!("{}/", base);
    let site = MockSite::new();
    site.page_with_links(&seed, "Home", &["/private/report", "/public"]);

    let settings = Settings {
        follow_robots_txt,
        ..test_settings()
    };
    let registry = crawl_registry(&settings, vec![crawl_row("Org", &seed, "Health")]);
    run_audit(
        settings,
        &registry,
        site.clone(),
        AuditPluginRegistry::with_builtins(),
    )
    .await;
    (site, base)
}

#[tokio::test]
async fn test_disallowed_links_are_not_admitted_when_following_robots() {
    let (site, base) = crawl_with_robots(true).await;

    assert_eq!(
        site.visited_urls(),
        vec![format!("{}/", base), format!("{}/public", base)]
    );
}

#[tokio::test]
async fn test_robots_ignored_when_disabled() {
    let (site, base) = crawl_with_robots(false).await;

    assert_eq!(site.visited_urls().len(), 3);
    assert_eq!(site.navigation_count(&format!("{}/private/report", base)), 2);
}

#[tokio::test]
async fn test_disallowed_seed_is_skipped_without_loading() {
    let server = robots_server(plain_text(PRIVATE_RULES)).await;
    let seed = format!("{}/private/start", server.uri());
    let site = MockSite::new();

    let settings = Settings {
        follow_robots_txt: true,
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
    assert_eq!(
        run.report
            .workers
            .iter()
            .map(|w| w.skipped_by_robots)
            .sum::<usize>(),
        1
    );
    // No browser is needed for a page robots.txt rules out
    assert_eq!(site.launches(), 0);
}
