//! Normalization logic layered on top of raw store items: conversation
//! identity, body selection, HTML conversion and attachment classification.

pub mod attachment;
pub mod body;
pub mod conversation;
pub mod html;
