pub mod cache;
pub mod memory;
pub mod repositories;

mod deadline;
