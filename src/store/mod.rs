//! Queries against the relational store. Every function takes an explicit
//! connection and returns plain structs.

pub mod catalog;
pub mod recipes;
pub mod relations;
pub mod users;

#[cfg(test)]
pub mod testing;
