//! Data access for pharmaceutical sales analytics.
//!
//! This crate provides:
//! - CSV loading and writing of sale records
//! - Record cleaning and normalization
//! - An in-memory sales store and TTL cache
//! - The cached, single-flight dashboard service

pub mod cleaning;
pub mod csv_storage;
pub mod memory_cache;
pub mod memory_store;
pub mod service;
pub mod single_flight;

pub use cleaning::{clean_records, CleaningReport, CleaningRules, RemovalReason};
pub use csv_storage::{CsvStorage, LoadError, RejectedRow, SalesFile};
pub use memory_cache::MemoryCache;
pub use memory_store::MemorySalesStore;
pub use service::DashboardService;
pub use single_flight::SingleFlight;
