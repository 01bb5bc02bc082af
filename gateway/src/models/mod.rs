pub mod cnsi;
pub mod token;
