//! Subcommand implementations for the `geoshape` binary.

pub(crate) mod features;
pub(crate) mod get;
pub(crate) mod inspect;
pub(crate) mod remove;
