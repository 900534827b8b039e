pub mod address;
pub mod email;
pub mod headers;
