//! HTTP client for the stash content-addressed file store.
//!
//! Files are uploaded as fixed-size blocks keyed by their SHA-256 digest.
//! Blocks the store already holds are skipped, and the ordered digest list
//! is committed as a file in a single final request.
//!
//! This crate provides:
//! - [`StashClient`]: the session object for upload, info, download, delete
//! - [`BlockStore`]: the seam between the upload pipeline and the store
//! - [`Uploader`] and [`BlockReader`]: the digest/decide/transfer pipeline
//! - [`TokenAdmin`]: service-key authorized token grant and revoke

pub mod client;
pub mod error;
pub mod retrieve;
pub mod store;
pub mod token;
pub mod upload;

pub use client::StashClient;
pub use error::{ClientError, ClientResult};
pub use retrieve::FILE_NAME_HEADER;
pub use store::BlockStore;
pub use token::TokenAdmin;
pub use upload::{BlockReader, Uploader, decide, transfer};
