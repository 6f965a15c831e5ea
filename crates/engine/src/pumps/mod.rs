//! Background tasks driving one engine connection.

pub(crate) mod read;
pub(crate) mod write;
