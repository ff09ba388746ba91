#![forbid(unsafe_code)]

pub mod config;
pub mod lister;
pub mod model;
pub mod render;
pub mod resolve;
pub mod source;

pub use config::{FailurePolicy, ListerConfig};
pub use lister::{ListError, Lister, Listing, RowOutcome, StreamRow};
pub use model::{Manifest, StreamId, StreamKind, StreamMetadata, MIME_DASH, MIME_PEERSHARE};
pub use render::{
    inject, inject_error, render_error_page, render_page, render_rows, RenderError,
};
pub use resolve::{LinkBuilder, ResolveError, Resolution, Resolver};
pub use source::{HttpSource, SourceError, StreamSource};
