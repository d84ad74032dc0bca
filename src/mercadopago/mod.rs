pub mod client;
pub mod preference;
pub mod signature;
pub mod types;
