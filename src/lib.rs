pub mod error;
pub mod exclude;
pub mod manifest;
pub mod report;
pub mod settings;
