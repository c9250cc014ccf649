//! A concrete asynchronous transport for `synctransfer-core`.
//!
//! # Overview
//! [`ThreadedTransport`] executes requests with ureq on a private tokio
//! blocking pool and reports each one through its completion on a worker
//! thread. Pair it with [`SynchronousTransfer`](synctransfer_core::SynchronousTransfer)
//! for blocking calls:
//!
//! ```no_run
//! use synctransfer_core::SynchronousTransfer;
//! use synctransfer_transport::{ThreadedTransport, TransportConfig};
//!
//! let transport = ThreadedTransport::new(TransportConfig::default())?;
//! let outcome = transport.fetch_url("http://localhost:3000/hello")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Design
//! - Downloads stream into `<download_dir>/<uuid>.download`.
//! - A download that fails after writing part of the body reports a
//!   [`TransferError`] carrying a resume token; passing that token to
//!   `resume_download` continues with a `Range` request.
//! - Completions run on the transport's own threads, so blocking calls may
//!   be made from any thread that is not one of them.

pub mod config;
pub mod error;
pub mod resume;
pub mod threaded;

pub use config::TransportConfig;
pub use error::{TransferError, TransferErrorKind};
pub use resume::ResumeState;
pub use threaded::ThreadedTransport;
