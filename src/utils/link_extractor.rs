// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

use crate::utils::url_utils::{is_same_domain, resolve_url};

/// 从渲染后的页面源码中提取链接
///
/// 页面内的 `<base href>` 仅在与页面同站点、同协议时才参与解析。
/// 返回绝对URL，按出现顺序去重，不做站点或协议过滤。
pub fn extract_links(html: &str, page_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let base = effective_base(&document, page_url);

    let Ok(anchor) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for element in document.select(&anchor) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        if let Ok(url) = resolve_url(&base, href) {
            if seen.insert(url.as_str().to_string()) {
                links.push(url);
            }
        }
    }
    links
}

fn effective_base(document: &Html, page_url: &Url) -> Url {
    let Ok(selector) = Selector::parse("base[href]") else {
        return page_url.clone();
    };
    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| resolve_url(page_url, href.trim()).ok())
        .filter(|base| base.scheme() == page_url.scheme() && is_same_domain(base, page_url))
        .unwrap_or_else(|| page_url.clone())
}
