//! Scratch space manager
//!
//! One instance owns one temporary directory for its whole life:
//! `Idle -> Active -> TornDown`. While active, a single deferred sweep task
//! is pending at any time; each sweep arms the next one when it finishes.

use parking_lot::Mutex;
use std::io;
use std::mem;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::sweep::{self, SweepReport};
use crate::{DEFAULT_FILE_PREFIX, DIR_PREFIX, ScratchError, ScratchResult, exit_hook};

/// Scratch space configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchConfig {
    /// Delay between the end of one sweep and the start of the next
    pub sweep_interval: Duration,
    /// Minimum age before a file may be reaped
    pub retention: Duration,
}

impl ScratchConfig {
    pub fn from_secs(sweep_interval_secs: u64, retention_secs: u64) -> Self {
        Self {
            sweep_interval: Duration::from_secs(sweep_interval_secs),
            retention: Duration::from_secs(retention_secs),
        }
    }
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self::from_secs(60, 600)
    }
}

enum Phase {
    Idle,
    Active(ActiveSpace),
    TornDown,
}

struct ActiveSpace {
    dir: TempDir,
    runtime: Handle,
    sweeper: Option<AbortHandle>,
}

pub(crate) struct Shared {
    config: ScratchConfig,
    phase: Mutex<Phase>,
}

/// Handle to a scratch space. Clones share the same directory.
///
/// The directory is removed by [`ScratchSpace::teardown`], by dropping a
/// [`crate::ScratchGuard`], when the last handle is dropped, or at process
/// exit, whichever comes first.
#[derive(Clone)]
pub struct ScratchSpace {
    pub(crate) shared: Arc<Shared>,
}

impl ScratchSpace {
    /// Create an inactive scratch space and register it for exit cleanup
    pub fn new(config: ScratchConfig) -> Self {
        let shared = Arc::new(Shared {
            config,
            phase: Mutex::new(Phase::Idle),
        });
        exit_hook::register(&shared);
        Self { shared }
    }

    pub fn config(&self) -> &ScratchConfig {
        &self.shared.config
    }

    /// Create the scratch directory and schedule the first sweep.
    ///
    /// Must be called from within a tokio runtime.
    pub fn activate(&self) -> ScratchResult<()> {
        let mut phase = self.shared.phase.lock();
        match *phase {
            Phase::Idle => {}
            Phase::Active(_) => return Err(ScratchError::AlreadyActive),
            Phase::TornDown => return Err(ScratchError::TornDown),
        }

        let runtime = Handle::try_current().map_err(|_| ScratchError::NoRuntime)?;
        let dir = tempfile::Builder::new().prefix(DIR_PREFIX).tempdir()?;
        info!("Temporary directory created at {}", dir.path().display());

        *phase = Phase::Active(ActiveSpace {
            dir,
            runtime,
            sweeper: None,
        });
        arm_sweep(&self.shared, &mut phase);

        Ok(())
    }

    /// Create a new empty file in the scratch directory and return its path.
    ///
    /// The caller owns the contents; the manager only ever deletes the file.
    pub fn request_file(
        &self,
        prefix: Option<&str>,
        suffix: Option<&str>,
    ) -> ScratchResult<PathBuf> {
        let phase = self.shared.phase.lock();
        let Phase::Active(active) = &*phase else {
            return Err(ScratchError::NotActive);
        };

        let file = tempfile::Builder::new()
            .prefix(prefix.unwrap_or(DEFAULT_FILE_PREFIX))
            .suffix(suffix.unwrap_or(""))
            .tempfile_in(active.dir.path())?;
        let (_, path) = file.keep().map_err(|e| e.error)?;

        debug!("Issued scratch file {}", path.display());
        Ok(path)
    }

    /// Cancel sweeping and remove the directory with everything in it.
    ///
    /// No-op before activation and after a previous teardown.
    pub fn teardown(&self) {
        self.shared.teardown();
    }

    pub fn is_active(&self) -> bool {
        matches!(*self.shared.phase.lock(), Phase::Active(_))
    }

    /// Path of the scratch directory while active
    pub fn dir(&self) -> Option<PathBuf> {
        self.shared.dir()
    }
}

impl Shared {
    fn dir(&self) -> Option<PathBuf> {
        match &*self.phase.lock() {
            Phase::Active(active) => Some(active.dir.path().to_path_buf()),
            _ => None,
        }
    }

    /// One reaping pass. `None` when not active.
    fn sweep(&self) -> Option<SweepReport> {
        let dir = self.dir()?;
        Some(sweep::sweep_dir(
            &dir,
            self.config.retention,
            SystemTime::now(),
        ))
    }

    async fn run_sweep(self: Arc<Self>) {
        let shared = Arc::clone(&self);
        match tokio::task::spawn_blocking(move || shared.sweep()).await {
            Ok(Some(report)) => debug!(
                examined = report.examined,
                removed = report.removed,
                failed = report.failed,
                "Sweep finished"
            ),
            Ok(None) => return,
            Err(e) => warn!("Sweep task failed: {}", e),
        }

        let mut phase = self.phase.lock();
        arm_sweep(&self, &mut phase);
    }

    pub(crate) fn teardown(&self) {
        let mut active = {
            let mut phase = self.phase.lock();
            match mem::replace(&mut *phase, Phase::TornDown) {
                Phase::Active(active) => active,
                other => {
                    *phase = other;
                    return;
                }
            }
        };

        if let Some(sweeper) = active.sweeper.take() {
            sweeper.abort();
            debug!("Sweep timer cancelled");
        }

        let path = active.dir.path().to_path_buf();
        let report = sweep::clear_dir(&path);

        match active.dir.close() {
            Ok(()) => info!(
                "Temporary directory {} deleted ({} files removed)",
                path.display(),
                report.removed
            ),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Temporary directory {} already gone", path.display())
            }
            Err(e) => warn!(
                "Failed to delete temporary directory {}: {}",
                path.display(),
                e
            ),
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Schedule the next sweep. Does nothing unless the space is active.
fn arm_sweep(shared: &Arc<Shared>, phase: &mut Phase) {
    let Phase::Active(active) = phase else {
        return;
    };

    let weak = Arc::downgrade(shared);
    let interval = shared.config.sweep_interval;
    let task = active.runtime.spawn(async move {
        tokio::time::sleep(interval).await;
        if let Some(shared) = weak.upgrade() {
            shared.run_sweep().await;
        }
    });

    active.sweeper = Some(task.abort_handle());
}
