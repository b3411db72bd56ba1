pub mod ask;
pub mod commands;
