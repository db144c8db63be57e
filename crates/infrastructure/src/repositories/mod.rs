//! PostgreSQL repositories for the document-store collections

pub mod addon;
pub mod library;
pub mod user;

pub use addon::{AddonRecord, AddonRepository};
pub use library::{LibraryEntry, LibraryRepository};
pub use user::{User, UserRepository};
