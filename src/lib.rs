//! `mailnorm`: normalizes inbound mail items from a store into one
//! uniform message model.
//!
//! A [`store::MailStore`] loads raw items, and [`adapter::MessageAdapter`]
//! hydrates them into [`adapter::IncomingMessage`] values with resolved
//! conversation ids, decoded bodies, typed attachments and meeting fields.

pub mod adapter;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod parser;
pub mod store;
