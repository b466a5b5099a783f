// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use code::ErrorCode;
use snafu::{Location, Snafu};

pub mod code;
pub mod handler;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum GatewayError {
    #[snafu(display("{message}"))]
    Generic {
        message: String,
        #[snafu(implicit)]
        location: Location,
        code: ErrorCode,
    },
}

pub type GatewayResult<T, E = GatewayError> = std::result::Result<T, E>;

impl GatewayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GatewayError::Generic { code, .. } => *code,
        }
    }
}
