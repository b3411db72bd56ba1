pub mod deadline;
pub mod duplicates;
pub mod embed;
pub mod ingest;
pub mod query;
pub mod reembed;
pub mod search;
