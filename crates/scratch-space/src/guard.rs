//! Scoped acquisition of a scratch space

use std::ops::Deref;

use crate::{ScratchResult, ScratchSpace};

/// Active scratch space that tears itself down when dropped.
///
/// Covers normal return, early `?` return and panic unwinding alike.
#[must_use = "the scratch directory is removed as soon as the guard is dropped"]
pub struct ScratchGuard {
    space: ScratchSpace,
}

impl ScratchSpace {
    /// Activate and return a guard that runs [`ScratchSpace::teardown`] on drop
    pub fn enter(&self) -> ScratchResult<ScratchGuard> {
        self.activate()?;
        Ok(ScratchGuard {
            space: self.clone(),
        })
    }
}

impl ScratchGuard {
    /// Underlying scratch space handle
    pub fn space(&self) -> &ScratchSpace {
        &self.space
    }
}

impl Deref for ScratchGuard {
    type Target = ScratchSpace;

    fn deref(&self) -> &ScratchSpace {
        &self.space
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        self.space.teardown();
    }
}
