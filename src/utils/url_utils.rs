// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;
use url::{ParseError, Url};

/// 不进行审计的资源扩展名（小写，包含点号）
const DISALLOWED_EXTENSIONS: &[&str] = &[
    ".xml", ".gif", ".csv", ".xls", ".xlsx", ".dmg", ".exe", ".wmv", ".wma", ".flv", ".ppt",
    ".py", ".pptx", ".jpg", ".jpeg", ".png", ".avi", ".mov", ".m4a", ".m4v", ".mp3", ".mp4",
    ".doc", ".docx", ".pdf", ".swf", ".jar", ".tar.gz", ".zip", ".iso", ".crt", ".crl", ".pem",
    ".key", ".pfx", ".p12", ".der", ".cer", ".psd", ".ai", ".eps", ".ttf", ".otf", ".woff",
    ".woff2", ".eot", ".svg", ".srt", ".wav", ".brf", ".txt",
];

/// URL 规范化错误
#[derive(Error, Debug, PartialEq)]
pub enum UrlError {
    #[error("无法解析URL: {0}")]
    Parse(#[from] ParseError),

    #[error("不支持的协议: {0}")]
    UnsupportedScheme(String),

    #[error("URL缺少主机名")]
    MissingHost,
}

/// 将可能为相对路径的URL转换为绝对路径URL
pub fn resolve_url(base_url: &Url, path: &str) -> Result<Url, ParseError> {
    base_url.join(path)
}

/// 规范化一个 http(s) URL
///
/// 协议与主机名转为小写（由 `url` 解析完成），路径中的点段被折叠，片段被移除
pub fn normalize(raw: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(raw.trim())?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::UnsupportedScheme(other.to_string())),
    }
    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(UrlError::MissingHost);
    }
    url.set_fragment(None);
    Ok(url)
}

/// 计算域名键：小写主机名并去掉前导 `www.`
pub fn domain_key(url: &Url) -> Option<String> {
    url.host_str().map(|host| {
        let host = host.to_ascii_lowercase();
        match host.strip_prefix("www.") {
            Some(stripped) => stripped.to_string(),
            None => host,
        }
    })
}

/// 从字符串形式的URL计算域名键，无法解析时返回 `None`
pub fn domain_of(raw: &str) -> Option<String> {
    Url::parse(raw.trim()).ok().as_ref().and_then(domain_key)
}

/// 判断两个URL是否属于同一站点（忽略 `www.` 前缀）
pub fn is_same_domain(a: &Url, b: &Url) -> bool {
    match (domain_key(a), domain_key(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// 判断URL路径是否指向不进行审计的文件类型
pub fn has_disallowed_extension(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    DISALLOWED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// 爬取范围前缀：域名键加上去掉文件名的路径
///
/// 例如 `https://www.example.com/abc/def.html` 的范围为 `example.com/abc/`
pub fn scope_prefix(url: &Url) -> Option<String> {
    let domain = domain_key(url)?;
    let path = url.path();
    let directory = match path.rfind('/') {
        Some(index) => &path[..=index],
        None => "/",
    };
    Some(format!("{}{}", domain, directory))
}

/// 站点根地址，例如 `https://example.com`
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}
