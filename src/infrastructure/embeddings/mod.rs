pub mod hashing;
#[cfg(feature = "local-embeddings")]
pub mod local;
pub mod openai;
