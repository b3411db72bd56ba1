pub mod command;
pub mod connector;
pub mod vector_store;
