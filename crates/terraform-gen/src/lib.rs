//! # terraform-gen
//!
//! Reads a software project, works out the cloud infrastructure it needs and
//! writes Terraform for it, using a small team of agents driven by
//! `agent_core::Orchestrator`.
//!
//! ## Output
//!
//! ```text
//! <dest>/terraform/
//! ├── main.tf
//! ├── outputs.tf
//! ├── terraform.tfvars
//! ├── variables.tf
//! └── modules/
//!     ├── network/
//!     │   ├── main.tf
//!     │   ├── outputs.tf
//!     │   └── variables.tf
//!     └── database/
//!         └── ...
//! ```
//!
//! The source project is only read; writes are confined to the destination.

pub mod config;
pub mod error;
pub mod gateway;
pub mod layout;
pub mod prompts;
pub mod runner;
pub mod tools;
pub mod workflow;

pub use config::{DestinationLayout, GeneratorConfig, ResolvedDirs};
pub use error::{GeneratorError, Result};
pub use gateway::{FileContent, ToolGateway};
pub use layout::{check_layout, LayoutReport};
pub use runner::ScriptRunnerAgent;
pub use workflow::{generate, GenerationReport};
