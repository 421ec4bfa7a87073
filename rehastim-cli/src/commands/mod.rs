//! CLI command implementations.

pub(crate) mod completions;
pub(crate) mod decode;
pub(crate) mod errors;
pub(crate) mod monitor;
