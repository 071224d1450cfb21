// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::fmt;

/// 拦截页面所属的反爬服务
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingService {
    Imperva,
    Cloudflare,
    AzureFrontDoor,
}

impl fmt::Display for BlockingService {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BlockingService::Imperva => write!(f, "Imperva"),
            BlockingService::Cloudflare => write!(f, "Cloudflare"),
            BlockingService::AzureFrontDoor => write!(f, "Azure Front Door"),
        }
    }
}

const SIGNATURES: &[(&str, BlockingService)] = &[
    ("Incapsula incident ID", BlockingService::Imperva),
    ("Cloudflare Ray ID", BlockingService::Cloudflare),
    (
        "The request is blocked.</h2></div><div id=\"errorref\">",
        BlockingService::AzureFrontDoor,
    ),
];

/// 检测页面源码是否为反爬拦截页
pub fn detect(page_source: &str) -> Option<BlockingService> {
    SIGNATURES
        .iter()
        .find(|(signature, _)| page_source.contains(signature))
        .map(|(_, service)| *service)
}
