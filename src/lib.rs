pub mod abi;
pub mod aggregator;
pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod ledger;
pub mod metrics;
pub mod quoter;
pub mod server;
pub mod service;
pub mod types;
pub mod units;
pub mod utils;
