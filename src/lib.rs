pub mod server;
pub mod source;
