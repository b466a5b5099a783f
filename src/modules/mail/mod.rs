// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

pub mod asset;
pub mod attachment;
pub mod composer;
pub mod message;
pub mod upload;
