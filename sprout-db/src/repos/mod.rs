//! Repository modules for database operations

pub mod suggestions;

pub use suggestions::SuggestionRepo;
