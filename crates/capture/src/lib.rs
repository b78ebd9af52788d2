//! Camera Capture - frame sources for camsnap
//!
//! Provides abstraction over camera backends:
//! - Synthetic: built-in test pattern, always available
//! - Native: attached devices via nokhwa (`native` feature)

mod camera;
mod discovery;
mod error;
mod frame;
mod synthetic;
mod traits;

#[cfg(feature = "native")]
mod native;

pub use camera::*;
pub use discovery::*;
pub use error::*;
pub use frame::*;
pub use synthetic::*;
pub use traits::*;

#[cfg(feature = "native")]
pub use native::NativeCamera;
