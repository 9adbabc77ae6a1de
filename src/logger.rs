use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::diff::{diff_status, StatusChange};

/// How status fetches are written to the message log. Logins and commands
/// are always written in full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLogMode {
    Full,
    /// First fetch in full, then only the leaves that changed.
    Diffed,
}

#[derive(Serialize)]
struct Line<'a> {
    ts: DateTime<Utc>,
    #[serde(flatten)]
    record: Record<'a>,
}

#[derive(Serialize)]
#[serde(tag = "dir", rename_all = "lowercase")]
enum Record<'a> {
    Login {
        url: &'a str,
        username: &'a str,
    },
    Cmd {
        action: &'a str,
        attempt: u32,
        url: &'a str,
        body: &'a Value,
    },
    Status {
        #[serde(skip_serializing_if = "Option::is_none")]
        body: Option<&'a Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        changes: Option<Vec<StatusChange>>,
    },
}

/// NDJSON trace of traffic with the backend. Never sees the password.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    out: LineWriter<File>,
    last_status: Option<Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            out: LineWriter::new(file),
            last_status: None,
        })
    }

    pub fn log_login(&mut self, url: &str, username: &str) {
        self.write(Record::Login { url, username });
    }

    pub fn log_command(&mut self, action: &str, attempt: u32, url: &str, body: &Value) {
        self.write(Record::Cmd {
            action,
            attempt,
            url,
            body,
        });
    }

    pub fn log_status(&mut self, body: &Value) {
        match (self.mode, self.last_status.take()) {
            (MessageLogMode::Diffed, Some(previous)) => {
                let changes = diff_status(&previous, body);
                self.write(Record::Status {
                    body: None,
                    changes: Some(changes),
                });
            }
            _ => self.write(Record::Status {
                body: Some(body),
                changes: None,
            }),
        }
        if self.mode == MessageLogMode::Diffed {
            self.last_status = Some(body.clone());
        }
    }

    fn write(&mut self, record: Record<'_>) {
        let line = Line {
            ts: Utc::now(),
            record,
        };
        let result = serde_json::to_writer(&mut self.out, &line)
            .map_err(std::io::Error::from)
            .and_then(|()| self.out.write_all(b"\n"));
        if let Err(e) = result {
            warn!("failed to write message log entry: {e}");
        }
    }
}
