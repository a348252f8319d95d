pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod etag;
pub mod list;
pub mod ops;
pub mod resources;
pub mod spec;
pub mod task;
pub mod telemetry;
pub mod upload;

pub mod prelude {
    pub use crate::error::{Error, ErrorKind, Result};

    pub use crate::client::{NutanixApi, Session};
    pub use crate::ops::{Context, Module, OperationResult};
}
