pub mod app;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod log_store;
pub mod naming;
pub mod output;
pub mod sqlite;
pub mod store;
pub mod table;
