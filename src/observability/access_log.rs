//! Access log writer.
//!
//! One pipe-delimited line per request:
//! `|<timestamp>|<request uri>|<user agent>|<header value>|<remote addr>|<client ip:port>|`

use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local, TimeZone};
use tracing::{debug, error};

use crate::security::ClientAddr;

/// 12-hour clock with meridiem and numeric UTC offset, e.g. `2024/03/09 02:05:07 PM +0800`.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %I:%M:%S %p %z";

/// Fields captured for one inbound request.
#[derive(Debug, Clone)]
pub struct AccessRecord<'a> {
    pub remote_addr: SocketAddr,
    pub request_uri: &'a str,
    pub user_agent: &'a str,
    pub header_value: &'a str,
    pub client: ClientAddr,
}

impl AccessRecord<'_> {
    /// Render the record as a complete, newline-terminated log line.
    pub fn format_line<Tz>(&self, at: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        format!(
            "|{}|{}|{}|{}|{}|{}|\n",
            at.format(TIMESTAMP_FORMAT),
            self.request_uri,
            self.user_agent,
            self.header_value,
            self.remote_addr,
            self.client,
        )
    }
}

/// Append-only access log shared by every request task.
///
/// Writes run on the blocking pool so a slow disk stalls only the request
/// being logged, never a runtime worker.
#[derive(Debug)]
pub struct AccessLogger {
    file: Arc<Mutex<File>>,
    path: Arc<Path>,
}

impl AccessLogger {
    /// Open (or create) the log file in append mode.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path: Arc<Path> = Arc::from(path.as_ref());
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(path = ?path, "Access log opened");
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
            path,
        })
    }

    /// Append one line. Failures are reported on the diagnostic channel only.
    pub async fn record(&self, record: &AccessRecord<'_>) {
        let line = record.format_line(&Local::now());
        let file = Arc::clone(&self.file);

        match tokio::task::spawn_blocking(move || write_line(&file, &line)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(path = ?self.path, error = %e, "Failed to write access log"),
            Err(e) => error!(path = ?self.path, error = %e, "Access log writer task failed"),
        }
    }
}

/// Single write under the lock keeps lines whole across concurrent requests.
fn write_line(file: &Mutex<File>, line: &str) -> io::Result<()> {
    let mut file = file
        .lock()
        .map_err(|_| io::Error::other("access log lock poisoned"))?;
    file.write_all(line.as_bytes())
}
