pub mod analyzers;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod output;
pub mod parser;
pub mod records;
