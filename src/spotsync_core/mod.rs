pub mod auth;
pub mod cli;
pub mod config;
pub mod drive;
pub mod error;
pub mod exif;
pub mod folders;
pub mod gallery;
pub mod publish;
pub mod sidecar;
pub mod station;
pub mod tagging;
pub mod upload;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use drive::{DriveApi, DriveClient, DriveFile};
pub use error::{Result, SpotsyncError};
pub use sidecar::Sidecar;
pub use tagging::{Session, TaskRunner};
pub use upload::UploadRequest;
