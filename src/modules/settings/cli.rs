// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use clap::{builder::ValueParser, Parser, ValueEnum};
use std::{collections::HashSet, fmt, sync::LazyLock};
use url::Url;

#[cfg(not(test))]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::parse);

#[cfg(test)]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::new_for_test);

fn parse_url(s: &str) -> Result<String, String> {
    Url::parse(s).map_err(|e| format!("Invalid URL '{}': {}", s, e))?;
    Ok(s.trim_end_matches('/').to_string())
}

#[derive(Debug, Parser)]
#[clap(
    name = "graphmail-gateway",
    about = "An authenticated HTTP gateway that sends mail with attachments through Microsoft Graph on behalf of a delegated user.",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Settings {
    /// Log level (default: "info")
    #[clap(long, default_value = "info", env, help = "Set the log level")]
    pub gateway_log_level: String,

    /// HTTP port (default: 3000)
    #[clap(long, default_value = "3000", env, help = "Set the HTTP port")]
    pub gateway_http_port: u16,

    #[clap(
        long,
        env,
        default_value = "0.0.0.0",
        help = "The IP address that the server binds to, in IPv4 format (e.g., 192.168.1.1).",
        value_parser = ValueParser::new(|s: &str| {
            if s.parse::<std::net::Ipv4Addr>().is_err() {
                return Err("The bind IP address must be a valid IPv4 address.".to_string());
            }
            Ok(s.to_string())
        })
    )]
    pub gateway_bind_ip: String,

    #[clap(
        long,
        default_value = "*",
        env,
        help = "Set the allowed CORS origins (comma-separated list, e.g., \"https://example.com, https://another.com\")",
        value_parser = ValueParser::new(|s: &str| -> Result<HashSet<String>, String> {
            let set: HashSet<String> = s.split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
            Ok(set)
        })
    )]
    pub gateway_cors_origins: HashSet<String>,

    #[clap(long, default_value = "86400", env, help = "Set the CORS max age in seconds")]
    pub gateway_cors_max_age: i32,

    #[clap(long, default_value = "true", env, help = "Enable ANSI formatted logs")]
    pub gateway_ansi_logs: bool,

    /// If false, logs will be printed to stdout
    #[clap(
        long,
        default_value = "false",
        env,
        help = "Enable log file output (otherwise logs go to stdout)"
    )]
    pub gateway_log_to_file: bool,

    #[clap(long, default_value = "false", env, help = "Enable JSON formatted logs")]
    pub gateway_json_logs: bool,

    #[clap(
        long,
        default_value = "5",
        env,
        help = "Set the maximum number of server log files"
    )]
    pub gateway_max_server_log_files: usize,

    /// Base directory. Relative paths of the other file settings resolve against it.
    #[clap(long, default_value = ".", env, help = "Set the gateway data directory")]
    pub gateway_root_dir: String,

    #[clap(
        long,
        default_value = "appSettings.json",
        env,
        help = "Path of the JSON file holding the Graph identity configuration"
    )]
    pub gateway_identity_file: String,

    #[clap(
        long,
        default_value = "assets",
        env,
        help = "Directory of static text assets (signature, canned bodies)"
    )]
    pub gateway_assets_dir: String,

    #[clap(
        long,
        default_value = "uploads",
        env,
        help = "Directory where uploaded files are spooled until the send attempt completes"
    )]
    pub gateway_uploads_dir: String,

    #[clap(
        long,
        default_value = "signature.html",
        env,
        help = "Asset appended to every outgoing body"
    )]
    pub gateway_signature_asset: String,

    #[clap(
        long,
        env,
        help = "Optional asset (e.g. a <head><style> block) prefixed to every outgoing body"
    )]
    pub gateway_head_asset: Option<String>,

    #[clap(
        long,
        default_value = "endTicket.html",
        env,
        help = "Asset used as the body of /endTicket mails"
    )]
    pub gateway_end_ticket_asset: String,

    #[clap(
        long,
        default_value = "Support - Ticket closed",
        env,
        help = "Subject used for /endTicket mails"
    )]
    pub gateway_end_ticket_subject: String,

    #[clap(long, env, help = "Username accepted by /login")]
    pub gateway_login_username: Option<String>,

    #[clap(long, env, help = "Password accepted by /login")]
    pub gateway_login_password: Option<String>,

    #[clap(long, env, help = "Secret used to sign session tokens (HS256)")]
    pub gateway_jwt_secret: Option<String>,

    #[clap(
        long,
        default_value = "900",
        env,
        help = "Lifetime of issued session tokens in seconds",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub gateway_session_ttl_seconds: u64,

    #[clap(
        long,
        default_value = "password",
        env,
        help = "How the delegated Graph session is acquired"
    )]
    pub gateway_graph_auth_flow: GraphAuthFlow,

    #[clap(long, env, help = "Mailbox user for the password flow")]
    pub gateway_outlook_username: Option<String>,

    #[clap(long, env, help = "Mailbox password for the password flow")]
    pub gateway_outlook_password: Option<String>,

    #[clap(
        long,
        default_value = "https://login.microsoftonline.com",
        env,
        help = "Identity platform authority host",
        value_parser = ValueParser::new(parse_url)
    )]
    pub gateway_authority_host: String,

    #[clap(
        long,
        default_value = "https://graph.microsoft.com/v1.0",
        env,
        help = "Microsoft Graph base URL",
        value_parser = ValueParser::new(parse_url)
    )]
    pub gateway_graph_base_url: String,

    #[clap(
        long,
        default_value = "120",
        env,
        help = "Default per-request timeout in seconds (overridable by header, max 600)",
        value_parser = clap::value_parser!(u64).range(1..=600)
    )]
    pub gateway_request_timeout_seconds: u64,

    #[clap(
        long,
        default_value = "60",
        env,
        help = "Timeout in seconds for calls to the identity provider and Graph",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub gateway_provider_timeout_seconds: u64,

    #[clap(
        long,
        default_value = "26214400",
        env,
        help = "Maximum accepted request body size in bytes"
    )]
    pub gateway_max_upload_bytes: usize,

    #[clap(
        long,
        default_value = "true",
        env,
        help = "Enable compression for HTTP responses"
    )]
    pub gateway_http_compression_enabled: bool,

    #[clap(
        long,
        default_value = "false",
        env,
        help = "Log the delegated access token once at startup (diagnostics only)"
    )]
    pub gateway_log_access_token: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum GraphAuthFlow {
    #[clap(name = "password")]
    Password,
    #[clap(name = "device-code")]
    DeviceCode,
}

impl fmt::Display for GraphAuthFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphAuthFlow::Password => write!(f, "password"),
            GraphAuthFlow::DeviceCode => write!(f, "device-code"),
        }
    }
}

impl Settings {
    #[cfg(test)]
    pub fn new_for_test() -> Self {
        Self {
            gateway_log_level: "info".to_string(),
            gateway_http_port: 3000,
            gateway_bind_ip: "127.0.0.1".into(),
            gateway_cors_origins: Default::default(),
            gateway_cors_max_age: 86400,
            gateway_ansi_logs: false,
            gateway_log_to_file: false,
            gateway_json_logs: false,
            gateway_max_server_log_files: 5,
            gateway_root_dir: std::env::temp_dir()
                .join("graphmail-gateway-test")
                .to_string_lossy()
                .into_owned(),
            gateway_identity_file: "appSettings.json".into(),
            gateway_assets_dir: "assets".into(),
            gateway_uploads_dir: "uploads".into(),
            gateway_signature_asset: "signature.html".into(),
            gateway_head_asset: None,
            gateway_end_ticket_asset: "endTicket.html".into(),
            gateway_end_ticket_subject: "Support - Ticket closed".into(),
            gateway_login_username: Some("operator".into()),
            gateway_login_password: Some("operator-password".into()),
            gateway_jwt_secret: Some("test-secret".into()),
            gateway_session_ttl_seconds: 900,
            gateway_graph_auth_flow: GraphAuthFlow::Password,
            gateway_outlook_username: None,
            gateway_outlook_password: None,
            gateway_authority_host: "https://login.microsoftonline.com".into(),
            gateway_graph_base_url: "https://graph.microsoft.com/v1.0".into(),
            gateway_request_timeout_seconds: 120,
            gateway_provider_timeout_seconds: 60,
            gateway_max_upload_bytes: 26214400,
            gateway_http_compression_enabled: true,
            gateway_log_access_token: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let settings = Settings::parse_from(["graphmail-gateway"]);
        assert_eq!(settings.gateway_http_port, 3000);
        assert_eq!(settings.gateway_graph_auth_flow, GraphAuthFlow::Password);
        assert_eq!(settings.gateway_signature_asset, "signature.html");
        assert_eq!(settings.gateway_session_ttl_seconds, 900);
        assert_eq!(
            settings.gateway_graph_base_url,
            "https://graph.microsoft.com/v1.0"
        );
        assert!(settings.gateway_head_asset.is_none());
    }

    #[test]
    fn device_code_flow_and_trailing_slash_are_parsed() {
        let settings = Settings::parse_from([
            "graphmail-gateway",
            "--gateway-graph-auth-flow",
            "device-code",
            "--gateway-authority-host",
            "https://login.example.com/",
        ]);
        assert_eq!(settings.gateway_graph_auth_flow, GraphAuthFlow::DeviceCode);
        assert_eq!(settings.gateway_authority_host, "https://login.example.com");
    }

    #[test]
    fn invalid_bind_ip_is_rejected() {
        let result =
            Settings::try_parse_from(["graphmail-gateway", "--gateway-bind-ip", "not-an-ip"]);
        assert!(result.is_err());
    }
}
