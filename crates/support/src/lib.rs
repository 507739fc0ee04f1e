//! # tidepool-support
//!
//! Small runtime support types that sit next to the memory pool but do not
//! depend on it:
//!
//! - [`DynValue`]: a slot holding one value of runtime-chosen type
//! - [`JsonTree`]: an insertion-ordered JSON object with fill / overwrite merge
//! - [`ScopeExit`]: run a closure at end of scope unless dismissed
//! - [`Singleton`]: at most one installed instance per type
//! - [`crc16`]: CRC-16/XMODEM checksum
//! - [`SharedPtr`]: intrusive atomically reference-counted pointer

#![allow(unsafe_code)]
#![warn(missing_docs)]

pub mod crc16;
pub mod error;
pub mod guard;
pub mod json;
pub mod shared;
pub mod singleton;
pub mod value;

pub use crate::crc16::{Crc16, crc16};
pub use crate::error::{SupportError, SupportResult};
pub use crate::guard::{ScopeExit, on_scope_exit};
pub use crate::json::JsonTree;
pub use crate::shared::{RefCount, RefCounted, SharedPtr};
pub use crate::singleton::{Singleton, SingletonOwner};
pub use crate::value::DynValue;
