//! Domain model module declarations.

pub mod decision;
pub mod inventory;
pub mod pending;
pub mod vendor;
