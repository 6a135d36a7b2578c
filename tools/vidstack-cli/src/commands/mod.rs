pub mod cache;
pub mod check;
pub mod compose;
pub mod init;
pub mod plan;
pub mod probe;
