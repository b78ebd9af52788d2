//! Scratch Space - self-cleaning temporary storage for camsnap
//!
//! Owns a single process-scoped scratch directory:
//! - hands out uniquely named empty files on request
//! - reaps files older than the retention window on a recurring timer
//! - removes the whole directory on teardown, guard drop, or process exit

mod error;
mod exit_hook;
mod guard;
mod space;
mod sweep;

pub use error::*;
pub use guard::*;
pub use space::*;
pub use sweep::*;

/// Prefix of every scratch directory created under the temp root
pub const DIR_PREFIX: &str = "camsnap-scratch-";

/// Prefix used for scratch files when the caller gives none
pub const DEFAULT_FILE_PREFIX: &str = "tmp";
