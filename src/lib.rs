//! Annotate carbohydrate-active enzymes in a KBase genome with dbCAN and
//! publish the hits as a workspace report.

pub mod annotator;
pub mod config;
pub mod consts;
pub mod error;
pub mod genome;
pub mod report;
pub mod service;
pub mod workspace;

pub use error::{Result, RunError};
pub use service::{CallContext, DbcanParams, DbcanService, Status};
