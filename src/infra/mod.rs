pub mod llm;
pub mod smtp;
pub mod sqlite;
