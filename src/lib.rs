//! Smart contract toolkit: scaffold a project, compile its contracts, deploy
//! them in one operation and generate typed callers from `.proto` files.

pub mod compiler;
pub mod config;
pub mod project;
pub mod proto;

pub use compiler::{CompileError, Compiler, CompilerConfig};
pub use config::{ConfigError, ConfigManager, DeployConfig, Environment};
pub use project::{InitReport, ProjectError, ProjectInitializer, Template};
pub use proto::{fetch_proto_files, generate_callers, FetchError};
