pub mod cts;
pub mod models;
pub mod settings;
