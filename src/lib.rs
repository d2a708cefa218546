pub mod arbiter;
pub mod backend;
pub mod config;
pub mod error;
pub mod model;
pub mod poller;
pub mod routes;
pub mod server;
pub mod setter;

#[cfg(test)]
pub mod testutil;
