pub mod queue;
pub mod recovery;
pub mod storage;
pub mod transcoder;
