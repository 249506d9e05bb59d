//! Request/response middleware: logging, trusted subnet, transparent gzip,
//! integrity digests.

pub(crate) mod gzip;
pub(crate) mod integrity;
pub(crate) mod logging;
pub(crate) mod subnet;

/// Upper bound when buffering request/response bodies.
pub(crate) const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
