// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod audit_outcome;
pub mod page_job;
pub mod progress;
pub mod seed;
