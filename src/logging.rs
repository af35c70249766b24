use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use tracing_subscriber::fmt::MakeWriter;

type Slot = Arc<Mutex<Option<File>>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Option<File>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A `MakeWriter` that discards everything until a project log file is
/// attached with [`DeferredFileHandle::set_file`].
///
/// The subscriber is installed before the project ID is known (it may
/// come from a prompt), so the file layer starts out inert.
#[derive(Clone)]
pub struct DeferredFileWriter {
    inner: Slot,
}

/// Activation side of a [`DeferredFileWriter`].
#[derive(Clone)]
pub struct DeferredFileHandle {
    inner: Slot,
}

impl DeferredFileWriter {
    pub fn new() -> (Self, DeferredFileHandle) {
        let inner = Arc::new(Mutex::new(None));
        (
            Self {
                inner: inner.clone(),
            },
            DeferredFileHandle { inner },
        )
    }
}

impl DeferredFileHandle {
    /// Append to `path` from now on, starting with a session marker line.
    /// Switching projects in one process just moves to the new file.
    pub fn set_file(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "=== gcex session {} ===", utc_timestamp())?;
        *lock(&self.inner) = Some(file);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn is_active(&self) -> bool {
        lock(&self.inner).is_some()
    }
}

pub struct DeferredWriter {
    inner: Slot,
}

impl Write for DeferredWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match lock(&self.inner).as_mut() {
            Some(f) => f.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match lock(&self.inner).as_mut() {
            Some(f) => f.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for DeferredFileWriter {
    type Writer = DeferredWriter;

    fn make_writer(&'a self) -> Self::Writer {
        DeferredWriter {
            inner: self.inner.clone(),
        }
    }
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SSZ`, computed without a datetime
/// dependency.
pub fn utc_timestamp() -> String {
    let secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format_utc(secs)
}

fn format_utc(secs: u64) -> String {
    let days = (secs / 86400) as i64;
    let rem = secs % 86400;
    let (hours, minutes, seconds) = (rem / 3600, (rem % 3600) / 60, rem % 60);

    // Howard Hinnant's civil_from_days.
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe as i64 + era * 400 + i64::from(month <= 2);

    format!("{year:04}-{month:02}-{day:02}T{hours:02}:{minutes:02}:{seconds:02}Z")
}
