pub mod arena;
pub mod frame;
pub mod scheduler;
pub mod time;
