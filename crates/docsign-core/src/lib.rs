//! Document review and signing core
//!
//! Three subsystems carry the logic:
//!
//! - [`lifecycle`]: the document state machine and the role guards that run
//!   before every network call
//! - [`placement`], [`fields`] and [`overlay`]: positioned fields on a fixed
//!   1240 x 1754 page raster, their edits, and how they render at any
//!   container width
//! - [`capture`] and [`vault`]: freehand and camera signature capture, pen
//!   extraction, and locally saved signatures
//!
//! [`session`] ties them to the persistence API in [`api`]. Local state goes
//! through the [`storage`] seam.

pub mod api;
pub mod capture;
pub mod config;
pub mod error;
pub mod fields;
pub mod lifecycle;
pub mod overlay;
pub mod placement;
pub mod raster;
pub mod session;
pub mod storage;
pub mod vault;

pub use api::{ApiError, DocumentApi, HttpDocumentApi, MemoryDocumentApi};
pub use capture::CaptureError;
pub use config::{ClientConfig, ConfigError};
pub use error::DocsignError;
pub use lifecycle::{Action, Actor, GuardViolation};
pub use overlay::{OverlayRenderer, ScaleStrategy, Viewport};
pub use placement::{CoordinateFieldEditor, FieldError, PlacementDraft, PlacementOutcome};
pub use session::{DocumentSession, Outcome};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use vault::{SignatureVault, VaultError};
