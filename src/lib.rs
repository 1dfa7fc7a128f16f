pub mod classify;
pub mod cli;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod language;
pub mod pipeline;
pub mod policy;
pub mod postprocess;
pub mod preprocess;
pub mod quality;
pub mod report;
pub mod service;
pub mod translate;
pub mod translit;
pub mod util;
