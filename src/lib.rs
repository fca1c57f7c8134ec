//! Gemstone ownership history with interval-consistency checks and SQLite journaling.
//!
//! # Examples
//!
//! Date windows and validation over a sorted chain:
//! ```
//! use chrono::NaiveDate;
//! use ownerlog::{
//!     core::store::OwnershipStore,
//!     interval::{validate, DateError, OwnershipChain, ValidationContext},
//!     owner::OwnershipDraft,
//! };
//!
//! let day = |m, d| NaiveDate::from_ymd_opt(2024, m, d).expect("date");
//! let mut store = OwnershipStore::new();
//! store.add(7, OwnershipDraft {
//!     owner_name: "A. Jeweller".to_string(),
//!     owner_phone: "555-0100".to_string(),
//!     owner_email: None,
//!     owner_address: None,
//!     notes: None,
//!     ownership_start_date: day(1, 10),
//!     ownership_end_date: None,
//! }, true).expect("add");
//!
//! let chain = OwnershipChain::from_records(store.list_cloned(7));
//! let bounds = chain.add_constraints(true);
//! let ctx = ValidationContext::for_add(&chain, true);
//! let errors = validate(Some(day(1, 5)), None, &bounds, &ctx);
//! assert_eq!(errors.start, Some(DateError::StartBeforeMin(day(1, 10))));
//! ```
//!
//! Runtime usage with the SQLite journal:
//! ```no_run
//! use ownerlog::{config::LedgerConfig, service::{OwnershipEditor, OwnershipForm}};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = LedgerConfig::from_toml_str("database_path = \"ownership.db\"").expect("config");
//! config.init_tracing().expect("tracing");
//! let handle = config.spawn().expect("open ledger");
//! let mut editor = OwnershipEditor::load(handle.clone(), 7).await.expect("load");
//! let form = OwnershipForm {
//!     owner_name: "B. Collector".to_string(),
//!     start: chrono::NaiveDate::from_ymd_opt(2024, 2, 1),
//!     ..OwnershipForm::default()
//! };
//! editor.submit_add(&form, true).await.expect("transfer");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![deny(missing_docs)]

/// TOML configuration, tracing setup, and ledger bootstrap.
pub mod config;
/// Core in-memory store and index helpers.
pub mod core;
/// Calendar-date parsing and formatting.
pub mod dates;
/// Interval constraints, validation, and cascade planning.
pub mod interval;
/// Mutation op model and persistence wrapper types.
pub mod op;
/// Ownership records and patches.
pub mod owner;
/// Persistence abstraction and SQLite implementation.
pub mod persist;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Form submission flow over the REST collaborator.
pub mod service;
/// Shared primitive identifiers.
pub mod types;
/// REST payload shapes.
pub mod wire;
