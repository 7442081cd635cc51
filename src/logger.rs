//! Session logger: a `log` backend writing one file per run.
//!
//! The log lives next to the settings file (`digitpad.log` beside
//! `digitpad.cfg`) and is truncated at each launch. Records at warn and above
//! are mirrored to stderr.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::settings::PadSettings;

static LOGGER: OnceLock<SessionLogger> = OnceLock::new();

struct SessionLogger {
    sink: Mutex<Option<File>>,
    path: Option<PathBuf>,
}

impl SessionLogger {
    fn open(path: Option<PathBuf>) -> Self {
        let file = path.as_deref().and_then(|p| match create_truncated(p) {
            Ok(f) => Some(f),
            Err(e) => {
                eprintln!("[logger] cannot open {}: {}", p.display(), e);
                None
            }
        });
        Self {
            path: if file.is_some() { path } else { None },
            sink: Mutex::new(file),
        }
    }

    fn write(&self, line: &str) {
        if let Ok(mut guard) = self.sink.lock()
            && let Some(file) = guard.as_mut()
        {
            let _ = writeln!(file, "{}", line);
        }
    }
}

impl Log for SessionLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(
            &clock(),
            record.level(),
            record.target(),
            &record.args().to_string(),
        );
        self.write(&line);
        if record.level() <= Level::Warn {
            eprintln!("{}", line);
        }
    }

    fn flush(&self) {
        if let Ok(mut guard) = self.sink.lock()
            && let Some(file) = guard.as_mut()
        {
            let _ = file.flush();
        }
    }
}

fn create_truncated(path: &Path) -> std::io::Result<File> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
}

/// `[HH:MM:SS.mmm] [LEVEL] [target] message`
fn format_line(clock: &str, level: Level, target: &str, msg: &str) -> String {
    format!("[{}] [{}] [{}] {}", clock, level, target, msg)
}

/// Wall-clock time of day (UTC) with milliseconds.
fn clock() -> String {
    let Ok(since) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return "--:--:--.---".to_string();
    };
    let day_secs = since.as_secs() % 86_400;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        day_secs / 3600,
        day_secs / 60 % 60,
        day_secs % 60,
        since.subsec_millis()
    )
}

/// Default log location: beside the settings file.
fn default_log_path() -> Option<PathBuf> {
    PadSettings::settings_path().map(|p| p.with_file_name("digitpad.log"))
}

/// Path of the file this session is logging to, once initialised.
pub fn log_path() -> Option<&'static Path> {
    LOGGER.get()?.path.as_deref()
}

/// Install the session logger at `level`. Later calls are no-ops.
///
/// Also chains a panic hook so a crash leaves its message in the log.
pub fn init(level: LevelFilter) {
    let mut installed = false;
    let logger = LOGGER.get_or_init(|| {
        installed = true;
        SessionLogger::open(default_log_path())
    });
    if !installed || log::set_logger(logger).is_err() {
        return;
    }
    log::set_max_level(level);

    logger.write(&format!(
        "--- DigitPad {} session, level {} ---",
        env!("CARGO_PKG_VERSION"),
        level
    ));

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if let Some(l) = LOGGER.get() {
            l.write(&format!("[{}] [PANIC] {}", clock(), info));
            l.flush();
        }
        previous(info);
    }));
}
