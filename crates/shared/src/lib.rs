//! Types shared between the entity service client and the admin controller.

pub mod domain;
pub mod error;
