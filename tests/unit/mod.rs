// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod dispatcher_test;
pub mod progress_watch_test;
pub mod worker_manager_test;
