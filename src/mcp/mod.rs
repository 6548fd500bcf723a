pub mod catalog;
pub mod envelope;
pub mod protocol;
pub mod resources;
pub mod server;
