// ABOUTME: Append-only JSONL audit trail of tool invocations
// ABOUTME: One line per call; write failures are logged and never affect the tool result

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct AuditLogger {
    file: Mutex<File>,
    path: PathBuf,
}

impl AuditLogger {
    /// Open `path` for appending, creating parent directories as needed
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!("Audit log: {}", path.display());

        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `{ timestamp, tool, args, summary }` as a single line
    pub fn record(&self, tool: &str, args: &JsonValue, summary: &str) {
        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "tool": tool,
            "args": args,
            "summary": summary,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(e) => {
                warn!(tool, "Failed to serialize audit entry: {}", e);
                return;
            }
        };
        line.push('\n');

        let mut file = self.file.lock();
        if let Err(e) = append_line(&mut file, line.as_bytes()) {
            warn!(
                tool,
                path = %self.path.display(),
                "Failed to write audit entry: {}",
                e
            );
        }
    }
}

fn append_line(file: &mut File, line: &[u8]) -> io::Result<()> {
    file.write_all(line)?;
    file.flush()
}
