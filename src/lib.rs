// Library for tests to access modules

pub mod collector;
pub mod config;
pub mod fanout;
pub mod host;
pub mod maintenance;
pub mod models;
pub mod push;
pub mod query;
pub mod routes;
pub mod runtime;
pub mod store;
pub mod version;
