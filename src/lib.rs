pub mod balance;
pub mod config;
pub mod directory;
pub mod error;
pub mod exchange;
pub mod ledger;
pub mod memory;
pub mod mongo;
pub mod routes;
pub mod schemas;
pub mod store;
