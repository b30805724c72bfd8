//! Registry/gateway: the directory of live services and the server that
//! routes calls to them.

pub mod directory;
pub mod server;

pub use directory::{RegistryEntry, ServiceDirectory};
pub use server::{RegistryHandle, RegistryServer};
