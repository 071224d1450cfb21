// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod frontier;
pub mod progress_tracker;
pub mod seed_registry;
