//! Controllers resolving the newest acceptable upstream version of fleet components.
//!
//! Resolvers discover versions from registries and inventories, controllers drive them and
//! publish the results as desired state records.

pub mod core;
pub mod dto;
pub mod http;
pub mod model;
pub mod resolver;
pub mod service;
pub mod state;
pub mod store;
