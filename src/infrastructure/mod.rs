pub mod dataset;
pub mod embeddings;
pub mod memory;
pub mod redis;
pub mod retry;
pub mod sqlite;
