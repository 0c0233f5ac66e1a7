#[macro_use]
extern crate diesel;

#[macro_use]
extern crate serde_derive;

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod payloads;
pub mod schema;
pub mod shopping;
pub mod shortlink;
pub mod store;
