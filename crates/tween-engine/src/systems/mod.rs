pub mod batch;
pub mod tasks;
