//! # Demogate (Access-Code Gated Demo Sessions)
//!
//! `demogate` sits in front of a demo application and only lets visitors in who
//! hold a current access code.
//!
//! ## Access Codes
//!
//! Codes are generated from an alphabet without look-alikes (no `0`, `O`, `1`, `I`),
//! normalized to uppercase on submission and redeemed with a single conditional
//! update, so a code with `max_uses` can never be consumed more than that many times.
//! A scheduled `demogate rotate` replaces the active code and purges expired sessions.
//! Operators can also hand out one-off codes with their own lifetime and cap
//! (`demogate create-code` or `POST /v1/admin/codes`).
//!
//! ## Sessions
//!
//! A successful redemption issues an opaque session token. Only the `SHA-256`
//! fingerprint of the token is stored. Verification fails closed: when the store is
//! unreachable the visitor is sent back to the access page.
//!
//! ## Anomaly Detection & Audit
//!
//! Every redemption attempt is written to the audit log on a best-effort basis.
//! When a session comes back from a different network or browser, the change is
//! scored and recorded as an anomaly. Anomalies never end the session.
//!
//! ## Development Bypass
//!
//! Bypass codes and self-contained local tokens exist for offline demos. They are
//! rejected unless the server runs with `--allow-bypass`.

pub mod access;
pub mod api;
pub mod assistant;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
