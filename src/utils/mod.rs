// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod errors;
pub mod link_extractor;
pub mod preflight;
pub mod robots;
pub mod telemetry;
pub mod url_utils;
