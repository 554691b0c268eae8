pub mod connection;
pub mod dao;
pub mod directory;
pub mod entities;
pub mod memory;

pub use directory::{NewOAuthCredential, NewUser, OAuthCredentialStore, RbacStore, UserDirectory};
pub use memory::MemoryDirectory;
