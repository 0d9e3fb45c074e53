//! Core data model types: addresses, attachments, bodies and meeting fields.

pub mod address;
pub mod attachment;
pub mod mail;
