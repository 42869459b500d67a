//! Manifest operations on remote repositories

pub mod delete;

pub use delete::{delete_manifest, Confirm, DeleteOptions, DeleteOutcome, Prompter};
