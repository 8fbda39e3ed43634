pub mod assets;
pub mod config;
pub mod domain;
pub mod entity;
pub mod error;
pub mod fixtures;
pub mod output;
pub mod pipeline;
pub mod query;
pub mod report;
pub mod resolver;
pub mod s3;
pub mod store;
pub mod version;
