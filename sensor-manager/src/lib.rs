//! Sensor Manager - polling adapters for third-party sensor APIs.
//!
//! Each adapter authenticates against one provider (OAuth with persisted
//! credentials, or a static API key), fetches JSON on a fixed interval and
//! maps it onto a [`Snapshot`](sensorpoll::snapshot::Snapshot) the host can
//! display.
//!
//! # Architecture
//!
//! ```text
//! Provider API (Withings, Questrade, TekSavvy)
//!          ↑
//!     ApiFetcher ── CredentialSession ── TokenRefresher ── CredentialStore
//!          ↑
//! ┌─────────────────────────────────────────┐
//! │       PollingAdapter                     │
//! │  - State machine (authorize, poll, fail) │
//! │  - Provider maps response → Reading      │
//! │  - Holds the latest Snapshot             │
//! └─────────────────────────────────────────┘
//!          ↑
//! ┌─────────────────────────────────────────┐
//! │       SensorManager                      │
//! │  - Schedule polling                      │
//! │  - Route OAuth callbacks                 │
//! └─────────────────────────────────────────┘
//!          ↑
//!       Host HTTP API
//! ```
//!
//! # Core Types
//!
//! - [`Provider`] - Trait every provider implements
//! - [`PollingAdapter`] - Drives one provider through its lifecycle
//! - [`SensorManager`] - Owns all adapters
//! - [`AuthorizationPrompt`] - Where authorization requests go

pub mod api;
pub mod fetcher;
pub mod manager;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod refresher;
pub mod registry;
pub mod runners;
pub mod session;
pub mod types;

pub use manager::SensorManager;
pub use prompt::{AuthorizationBoard, AuthorizationFailure, AuthorizationPrompt, AuthorizationRequest};
pub use provider::Provider;
pub use runners::{AdapterState, AdapterStatus, PollingAdapter, TickOutcome};
