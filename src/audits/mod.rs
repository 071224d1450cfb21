// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod anti_bot;
pub mod default_audit;
pub mod element_audit;
pub mod registry;
pub mod traits;
