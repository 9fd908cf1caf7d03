pub mod adapter;

pub use adapter::{AdapterState, AdapterStatus, PollingAdapter, TickOutcome};
