//! Data models for the ArkABA backend.
//!
//! Field names serialize in camelCase to match the website's fetch payloads.

mod blog;
mod contact;
mod course;
mod dashboard;
mod event;
mod job;
mod member;
mod message;
mod payment;
mod registration;

pub use blog::*;
pub use contact::*;
pub use course::*;
pub use dashboard::*;
pub use event::*;
pub use job::*;
pub use member::*;
pub use message::*;
pub use payment::*;
pub use registration::*;

use serde::{Deserialize, Deserializer};

/// Deserialize an optional field an update may clear: absent stays `None`,
/// an explicit `null` becomes `Some(None)`.
pub(crate) fn clearable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
