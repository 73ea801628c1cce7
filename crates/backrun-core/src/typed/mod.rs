//! Typed - job API.
//!
//! - **Surface (typed)**: `Job` trait, arguments checked at compile time.
//! - **Internal (dyn)**: `DynJob`, object-safe, used by registry and strategies.

pub mod codec;
pub mod job;
pub mod registry;

pub use self::codec::{ArgsCodec, CodecError};
pub use self::job::{DynJob, Job, TypedJob};
pub use self::registry::{JobRegistry, RegistryError};
