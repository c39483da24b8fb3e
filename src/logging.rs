use simplelog::*;
use std::fs::{self, OpenOptions};
use std::io::{Error, ErrorKind};
use std::path::PathBuf;
use std::sync::OnceLock;

static INIT: OnceLock<bool> = OnceLock::new();

/// Directory the binary writes `app.log` into.
pub fn log_dir() -> Result<PathBuf, Error> {
    let home = std::env::var("HOME")
        .map_err(|_| Error::new(ErrorKind::NotFound, "HOME environment variable not set"))?;

    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("ticksyncrs")
        .join("logs"))
}

/// Logs to `~/.local/share/ticksyncrs/logs/app.log`, and warnings to stderr.
/// `verbose` raises the file level from debug to trace.
pub fn init_logger(verbose: bool) -> Result<(), Error> {
    let log_dir = log_dir()?;
    fs::create_dir_all(&log_dir)?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("app.log"))?;

    let file_level = if verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };

    let initialized = INIT.get_or_init(|| {
        CombinedLogger::init(vec![
            TermLogger::new(
                LevelFilter::Warn,
                Config::default(),
                TerminalMode::Stderr,
                ColorChoice::Auto,
            ),
            WriteLogger::new(file_level, Config::default(), log_file),
        ])
        .is_ok()
    });

    if *initialized {
        Ok(())
    } else {
        Err(Error::new(ErrorKind::Other, "Logger initialization failed"))
    }
}

/// Routes `log` output through env_logger's test writer. Safe to call from
/// every test.
pub fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
