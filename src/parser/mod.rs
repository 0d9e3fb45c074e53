//! Raw message parsing for file-backed stores: headers, MIME parts and
//! calendar invitations.

pub mod calendar;
pub mod header;
pub mod mime;
