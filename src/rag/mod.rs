pub mod context;
pub mod executor;
pub mod models;
pub mod orchestrator;
pub mod safety;
pub mod viz;
