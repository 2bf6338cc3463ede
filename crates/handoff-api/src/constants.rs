//! API constants

/// Versioned prefix for every backend-facing route.
pub const API_PREFIX: &str = "/api/v1";

/// Prefix of the phone-facing routes; session URLs are `{BASE_URL}/s/{id}`.
pub const PHONE_PREFIX: &str = "/s";

pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build commit, injected through `HANDOFF_COMMIT` at compile time.
pub const BUILD_COMMIT: &str = match option_env!("HANDOFF_COMMIT") {
    Some(commit) => commit,
    None => "unknown",
};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const API_KEY_QUERY: &str = "api_key";
