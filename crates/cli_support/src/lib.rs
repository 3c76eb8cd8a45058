//! Shared CLI argument groups.

pub mod common;

pub use common::{parse_modalities, ModalityArgs};
