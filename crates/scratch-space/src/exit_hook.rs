//! Process-exit cleanup for live scratch spaces
//!
//! Every scratch space registers a weak handle here when constructed. A
//! single `atexit` callback, installed on first registration, tears down
//! whatever is still alive when the process exits normally. Killed
//! processes are out of reach.

use parking_lot::Mutex;
use std::sync::{Arc, Once, Weak};
use tracing::debug;

use crate::space::Shared;

static LIVE: Mutex<Vec<Weak<Shared>>> = parking_lot::const_mutex(Vec::new());
static INSTALL: Once = Once::new();

pub(crate) fn register(shared: &Arc<Shared>) {
    INSTALL.call_once(install);

    let mut live = LIVE.lock();
    live.retain(|weak| weak.strong_count() > 0);
    live.push(Arc::downgrade(shared));
}

#[cfg(unix)]
fn install() {
    // SAFETY: `run_at_exit` takes no arguments and never unwinds across the
    // FFI boundary.
    let rc = unsafe { libc::atexit(run_at_exit) };
    if rc == 0 {
        debug!("Scratch cleanup exit hook installed");
    } else {
        tracing::warn!("Failed to install scratch cleanup exit hook");
    }
}

#[cfg(not(unix))]
fn install() {
    debug!("No exit hook on this platform, relying on guard drop");
}

#[cfg(unix)]
extern "C" fn run_at_exit() {
    if std::panic::catch_unwind(teardown_all).is_err() {
        eprintln!("scratch-space: cleanup panicked during process exit");
    }
}

#[cfg_attr(not(unix), allow(dead_code))]
fn teardown_all() {
    let live = std::mem::take(&mut *LIVE.lock());
    teardown_registered(live);
}

fn teardown_registered(live: Vec<Weak<Shared>>) {
    for shared in live.iter().filter_map(Weak::upgrade) {
        shared.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ScratchConfig, ScratchSpace};

    #[test]
    fn test_registration_prunes_dead_entries() {
        let space = ScratchSpace::new(ScratchConfig::default());
        let weak = Arc::downgrade(&space.shared);
        assert!(LIVE.lock().iter().any(|w| w.ptr_eq(&weak)));

        drop(space);
        let _other = ScratchSpace::new(ScratchConfig::default());
        assert!(!LIVE.lock().iter().any(|w| w.ptr_eq(&weak)));
    }

    #[tokio::test]
    async fn test_exit_teardown_removes_live_directories() {
        let space = ScratchSpace::new(ScratchConfig::default());
        space.activate().unwrap();
        let dir = space.dir().unwrap();
        space.request_file(None, Some(".jpg")).unwrap();

        let weak = LIVE
            .lock()
            .iter()
            .find(|w| w.upgrade().is_some_and(|s| Arc::ptr_eq(&s, &space.shared)))
            .cloned()
            .unwrap();

        teardown_registered(vec![weak.clone(), weak]);

        assert!(!dir.exists());
        assert!(!space.is_active());
        // Explicit teardown after the exit hook is still safe
        space.teardown();
    }
}
