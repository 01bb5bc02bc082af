pub mod executor;
pub mod handler;
pub mod upstream;
