pub mod metric;
pub mod staleness;
pub mod vector_blob;
