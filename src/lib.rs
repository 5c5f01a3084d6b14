pub mod api;
pub mod models;
pub mod options;
pub mod orchestrator;
pub mod queue;
pub mod sqlmap;
pub mod worker;
