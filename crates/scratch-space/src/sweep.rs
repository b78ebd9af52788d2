//! Age-based reaping of scratch files

use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Outcome of one pass over the scratch directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries looked at
    pub examined: usize,
    /// Entries deleted
    pub removed: usize,
    /// Entries that could not be inspected or deleted
    pub failed: usize,
}

/// Outcome of deleting a single entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Removed,
    Vanished,
    Failed,
}

/// A file is expired once its age strictly exceeds the retention window.
///
/// Modification times in the future count as age zero.
pub fn is_expired(modified: SystemTime, retention: Duration, now: SystemTime) -> bool {
    now.duration_since(modified)
        .map(|age| age > retention)
        .unwrap_or(false)
}

/// Delete every entry directly inside `dir` whose last modification is older
/// than `retention` relative to `now`.
///
/// Never fails: entries that vanish concurrently are skipped, other errors
/// are logged and counted, and the pass continues.
pub fn sweep_dir(dir: &Path, retention: Duration, now: SystemTime) -> SweepReport {
    sweep_dir_with(dir, retention, now, remove_entry)
}

fn sweep_dir_with(
    dir: &Path,
    retention: Duration,
    now: SystemTime,
    mut remove: impl FnMut(&Path) -> Removal,
) -> SweepReport {
    let mut report = SweepReport::default();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Scratch directory {} gone, nothing to sweep", dir.display());
            return report;
        }
        Err(e) => {
            warn!("Failed to list scratch directory {}: {}", dir.display(), e);
            return report;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to read scratch entry: {}", e);
                report.failed += 1;
                continue;
            }
        };

        report.examined += 1;
        let path = entry.path();

        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Scratch file vanished before inspection: {}", path.display());
                continue;
            }
            Err(e) => {
                warn!("Failed to stat {}: {}", path.display(), e);
                report.failed += 1;
                continue;
            }
        };

        if !is_expired(modified, retention, now) {
            continue;
        }

        match remove(&path) {
            Removal::Removed => {
                info!("Removed old file: {}", path.display());
                report.removed += 1;
            }
            Removal::Vanished => {}
            Removal::Failed => report.failed += 1,
        }
    }

    report
}

/// Delete every entry directly inside `dir`, regardless of age.
pub(crate) fn clear_dir(dir: &Path) -> SweepReport {
    let mut report = SweepReport::default();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return report,
        Err(e) => {
            warn!("Failed to list scratch directory {}: {}", dir.display(), e);
            return report;
        }
    };

    for entry in entries.flatten() {
        report.examined += 1;
        let path = entry.path();
        match remove_entry(&path) {
            Removal::Removed => {
                debug!("Removed file: {}", path.display());
                report.removed += 1;
            }
            Removal::Vanished => {}
            Removal::Failed => report.failed += 1,
        }
    }

    report
}

fn remove_entry(path: &Path) -> Removal {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => Removal::Removed,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Already removed: {}", path.display());
            Removal::Vanished
        }
        Err(e) => {
            warn!("Failed to remove {}: {}", path.display(), e);
            Removal::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::path::PathBuf;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        File::create(&path).unwrap();
        path
    }

    fn set_mtime(path: &Path, time: SystemTime) -> SystemTime {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(time).unwrap();
        drop(file);
        fs::metadata(path).unwrap().modified().unwrap()
    }

    #[test]
    fn test_expiry_is_strictly_greater_than_retention() {
        let now = SystemTime::now();
        let retention = Duration::from_secs(600);

        assert!(!is_expired(now - retention, retention, now));
        assert!(is_expired(
            now - retention - Duration::from_millis(1),
            retention,
            now
        ));
        assert!(!is_expired(now, retention, now));
        // Clock skew: file from the future is never expired
        assert!(!is_expired(now + Duration::from_secs(5), retention, now));
    }

    #[test]
    fn test_sweep_reaps_only_files_past_retention() {
        let dir = tempfile::tempdir().unwrap();
        let retention = Duration::from_secs(10);
        let epsilon = Duration::from_secs(1);
        let now = SystemTime::now();

        let old = touch(dir.path(), "old.jpg");
        let young = touch(dir.path(), "young.jpg");
        set_mtime(&old, now - retention - epsilon);
        set_mtime(&young, now - retention + epsilon);

        let report = sweep_dir(dir.path(), retention, now);

        assert_eq!(report.examined, 2);
        assert_eq!(report.removed, 1);
        assert_eq!(report.failed, 0);
        assert!(!old.exists());
        assert!(young.exists());
    }

    #[test]
    fn test_sweep_boundary_age_equal_to_retention_survives() {
        let dir = tempfile::tempdir().unwrap();
        let retention = Duration::from_secs(2);

        let file = touch(dir.path(), "boundary.mp4");
        let modified = set_mtime(&file, SystemTime::now() - Duration::from_secs(60));

        // Age exactly equal to retention
        let report = sweep_dir(dir.path(), retention, modified + retention);
        assert_eq!(report.removed, 0);
        assert!(file.exists());

        // One tick later it goes
        let report = sweep_dir(
            dir.path(),
            retention,
            modified + retention + Duration::from_millis(1),
        );
        assert_eq!(report.removed, 1);
        assert!(!file.exists());
    }

    #[test]
    fn test_sweep_scenario_one_second_interval_two_second_retention() {
        let dir = tempfile::tempdir().unwrap();
        let retention = Duration::from_secs(2);

        let file = touch(dir.path(), "a.jpg");
        let t0 = fs::metadata(&file).unwrap().modified().unwrap();

        // t=1: age 1 < 2
        sweep_dir(dir.path(), retention, t0 + Duration::from_secs(1));
        assert!(file.exists());

        // t=2: age 2 == 2, survives under strict comparison
        sweep_dir(dir.path(), retention, t0 + Duration::from_secs(2));
        assert!(file.exists());

        // t=3: age 3 > 2
        sweep_dir(dir.path(), retention, t0 + Duration::from_secs(3));
        assert!(!file.exists());
    }

    #[test]
    fn test_sweep_missing_directory_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone");

        let report = sweep_dir(&gone, Duration::ZERO, SystemTime::now());
        assert_eq!(report, SweepReport::default());
    }

    #[test]
    fn test_vanished_entry_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = touch(dir.path(), "raced.jpg");
        fs::remove_file(&path).unwrap();

        assert_eq!(remove_entry(&path), Removal::Vanished);

        // Directory stays sweepable afterwards
        let old = touch(dir.path(), "old.jpg");
        let now = set_mtime(&old, SystemTime::now()) + Duration::from_secs(5);
        let report = sweep_dir(dir.path(), Duration::from_secs(1), now);
        assert_eq!(report.removed, 1);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn test_vanished_entry_during_sweep_is_not_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "a.jpg");
        let b = touch(dir.path(), "b.jpg");
        let now = SystemTime::now() + Duration::from_secs(60);

        // Whichever entry comes first deletes the other behind the sweep's back
        let report = sweep_dir_with(dir.path(), Duration::from_secs(1), now, |path| {
            let other = if path == a { &b } else { &a };
            let _ = fs::remove_file(other);
            remove_entry(path)
        });

        assert_eq!(report.failed, 0);
        assert!(report.removed >= 1);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_removal_does_not_stop_the_pass() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "a.jpg");
        let stuck = touch(dir.path(), "stuck.jpg");
        let c = touch(dir.path(), "c.jpg");
        let now = SystemTime::now() + Duration::from_secs(60);

        let report = sweep_dir_with(dir.path(), Duration::from_secs(1), now, |path| {
            if path == stuck {
                Removal::Failed
            } else {
                remove_entry(path)
            }
        });

        assert_eq!(report.examined, 3);
        assert_eq!(report.removed, 2);
        assert_eq!(report.failed, 1);
        assert!(!a.exists());
        assert!(stuck.exists());
        assert!(!c.exists());
    }

    #[test]
    fn test_clear_dir_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.jpg");
        touch(dir.path(), "b.mp4");
        fs::create_dir(dir.path().join("nested")).unwrap();
        touch(&dir.path().join("nested"), "c.png");

        let report = clear_dir(dir.path());

        assert_eq!(report.examined, 3);
        assert_eq!(report.removed, 3);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
