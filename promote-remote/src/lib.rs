//! HTTP implementation of the target-server collaborators.
//!
//! [`TrackerServer`] implements the user directory, the project directory and
//! the deployment driver on top of a basic-auth [`HttpClient`].

pub mod client;
pub mod server;

pub use client::{Credentials, HttpClient, DEFAULT_TIMEOUT, ENV_PASSWORD, ENV_USERNAME};
pub use server::TrackerServer;
