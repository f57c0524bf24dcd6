//! # statustag-core
//!
//! Shared vocabulary for the statustag device streaming engine.
//!
//! - **Branded IDs**: [`DeviceId`] and [`ConnectionId`] newtypes
//! - **Display model**: [`DisplayTarget`] negotiated at connect time
//! - **Source images**: [`SourceImage`] with an opaque [`ImageIdentity`] and [`ImageFormat`] tag
//! - **Patches**: [`Patch`] variants and the immutable [`PatchList`]
//! - **Wire protocol**: [`protocol`] framing for server and device messages
//! - **Collaborator contract**: the [`ImageSource`] trait
//! - **Errors**: the [`StreamError`] taxonomy

#![deny(unsafe_code)]

pub mod display;
pub mod errors;
pub mod ids;
pub mod image;
pub mod patch;
pub mod protocol;
pub mod source;

pub use display::{DEFAULT_BUFFER_SIZE, DEFAULT_MAX_FILE_SIZE, DisplayTarget};
pub use errors::StreamError;
pub use ids::{ConnectionId, DeviceId};
pub use image::{ImageFormat, ImageIdentity, SourceImage};
pub use patch::{AnimatedStrategy, Patch, PatchKind, PatchList, PixelBand};
pub use source::{ImageSource, SourceError};
