// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

pub mod common;
pub mod context;
pub mod error;
pub mod graph;
pub mod logger;
pub mod mail;
pub mod rest;
pub mod settings;
pub mod token;
pub mod utils;
