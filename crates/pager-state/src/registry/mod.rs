//! Storage providers for each served resource.

pub mod alert;
