pub mod annotation;
pub mod annotator;
pub mod cli;
pub mod config;
pub mod confirm;
pub mod document;
pub mod intake;
pub mod metadata;
pub mod pipeline;
pub mod prompt;
pub mod report;
pub mod util;
