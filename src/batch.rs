pub mod fetch;
pub mod orchestrator;
pub mod publish;
