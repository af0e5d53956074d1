pub mod processor;
pub mod queue;
pub mod storage;
pub mod tasks;
pub mod worker;
