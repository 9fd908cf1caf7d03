//! sensorpoll - Core building blocks for polled sensor adapters.
//!
//! A sensor adapter authenticates against a third-party HTTP API, fetches
//! JSON on a fixed interval and reduces it to a single primary value plus a
//! flat set of named attributes. This crate holds the pieces that do not
//! depend on any particular provider:
//!
//! ```text
//!   Config (TOML) ──► Credential Store (<dir>/<provider>.json)
//!                              ↑ load / save
//!                     OAuth helpers (auth URL, code + refresh exchange)
//!                              ↑
//!                     HttpClient capability (reqwest / scripted double)
//!                              ↓
//!                     Reading ──► Snapshot ──► SensorView
//! ```
//!
//! Provider adapters, the polling state machine and the host binary live in
//! the `sensor-manager` crate.

// Shared error taxonomy
pub mod error;

// Persisted OAuth credentials
pub mod credentials;

// Outbound HTTP capability
pub mod http;

// OAuth authorization URL, token exchange and CSRF state
pub mod oauth;

// Snapshot and view types exposed to the host
pub mod snapshot;

// TOML configuration
pub mod config;

pub use error::AdapterError;
