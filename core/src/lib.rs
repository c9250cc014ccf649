//! Blocking fetch, upload and download over an asynchronous transport.
//!
//! # Overview
//! A [`Transport`] starts transfers and reports each one through a one-shot
//! completion on a worker thread. [`SynchronousTransfer`] turns that into
//! plain blocking calls: the caller is parked on a [`CompletionGate`] until
//! the completion has written the [`Outcome`] into a [`ResultCell`].
//!
//! # Design
//! - One generic bridge, [`bridge::block_on_completion`], does all the
//!   blocking; the seven call shapes are thin adapters over it.
//! - Each call owns its own gate and cell. Concurrent calls share nothing.
//! - The transport is an explicit receiver, never ambient global state.
//! - Transport errors are passed through untouched. Only malformed
//!   descriptors produce a [`DescriptorError`], before the transport runs.
//! - No timeout and no cancellation: a call returns when the transport calls
//!   back. Calling from a thread the transport needs to deliver its
//!   completion deadlocks.

pub mod bridge;
pub mod error;
pub mod gate;
pub mod http;
pub mod session;
pub mod transport;
pub mod types;

pub use bridge::{Completion, Outcome, ResultCell};
pub use error::DescriptorError;
pub use gate::CompletionGate;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use session::{DataOutcome, DownloadOutcome, SynchronousTransfer};
pub use transport::{DataCompletion, DownloadCompletion, Transport};
pub use types::{ResumeToken, UploadSource};
