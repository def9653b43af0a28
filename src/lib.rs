// Library for tests to access modules

pub mod aggregate;
pub mod cache;
pub mod collector;
pub mod config;
pub mod error;
pub mod host_repo;
pub mod models;
pub mod parse;
pub mod probe;
pub mod routes;
pub mod version;
