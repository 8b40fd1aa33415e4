//! Command handlers

pub mod backend;
pub mod history;
pub mod location;
pub mod rollback;
pub mod store;
