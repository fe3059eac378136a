//! cloudstack-tf - Terraform provider for Apache CloudStack
//!
//! Maps Terraform's resource lifecycle onto the CloudStack management API:
//! every resource type declares a schema and implements create, read,
//! update and delete with one or a few signed API calls.

pub mod cloudstack;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod filters;
pub mod provider;
pub mod resolve;
pub mod resource;
pub mod resources;
pub mod schema;
pub mod tags;
pub mod terraform;
pub mod userdata;
pub mod wait;

pub use cloudstack::{ClientConfig, CloudStackClient, CloudStackError, Params};
pub use config::ProviderConfig;
pub use error::{ProviderError, Result};
pub use provider::CloudStackProvider;
pub use resource::{DataSource, Resource};
