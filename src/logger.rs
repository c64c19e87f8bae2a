use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;

use crate::diff::diff_json;
use crate::protocol::{CMD_STATUS, CMD_STATUS_REDUCED, CMD_ZONE_STATUS, command_name, redact_pin};

pub enum MessageLogMode {
    Full,
    /// Status bodies are written in full once, then only their changed paths.
    Diffed,
}

pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous_status: HashMap<String, Value>,
}

fn is_status_command(command: &str) -> bool {
    matches!(command, CMD_STATUS | CMD_STATUS_REDUCED | CMD_ZONE_STATUS)
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            mode,
            file,
            previous_status: HashMap::new(),
        })
    }

    pub fn log_request(&mut self, message: &Value, zone: Option<u8>) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "tx",
            "command": command_name(message),
            "zone": zone,
            "body": redact_pin(message),
        });
        self.write_line(&entry);
    }

    pub fn log_response(&mut self, command: &str, zone: Option<u8>, text: &str) {
        let body = serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()));

        if matches!(self.mode, MessageLogMode::Diffed) && is_status_command(command) {
            let key = match zone {
                Some(id) => format!("{command}/{id}"),
                None => command.to_string(),
            };
            if let Some(prev) = self.previous_status.get(&key) {
                let mut changes = Vec::new();
                diff_json(prev, &body, "", &mut changes);
                let change_entries: Vec<Value> = changes
                    .iter()
                    .map(|(path, old, new)| json!({ "path": path, "old": old, "new": new }))
                    .collect();
                let entry = json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": "rx",
                    "command": command,
                    "zone": zone,
                    "changes": change_entries,
                });
                self.write_line(&entry);
                self.previous_status.insert(key, body);
                return;
            }
            let entry = json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": "rx",
                "command": command,
                "zone": zone,
                "full": true,
                "body": body,
            });
            self.write_line(&entry);
            self.previous_status.insert(key, body);
            return;
        }

        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "rx",
            "command": command,
            "zone": zone,
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_failure(&mut self, command: &str, zone: Option<u8>, error: &crate::Error) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "err",
            "command": command,
            "zone": zone,
            "error": error.to_string(),
        });
        self.write_line(&entry);
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{check_pin_message, status_message};
    use tempfile::NamedTempFile;

    fn read_lines(path: &str) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn log_request_writes_ndjson_without_pin() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        logger.log_request(&check_pin_message("2909"), None);

        let lines = read_lines(path);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["dir"], "tx");
        assert_eq!(lines[0]["command"], "check_pin");
        assert_eq!(lines[0]["body"]["pin"], "****");
        assert!(lines[0]["ts"].as_str().is_some());
    }

    #[test]
    fn diffed_mode_logs_full_first_then_changes() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, path).unwrap();

        logger.log_response("stato", None, r#"{"c":"stato","t_can":205}"#);
        logger.log_response("stato", None, r#"{"c":"stato","t_can":210}"#);

        let lines = read_lines(path);
        assert_eq!(lines[0]["full"], true);
        assert!(lines[0]["body"].is_object());
        let changes = lines[1]["changes"].as_array().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0]["path"], "t_can");
        assert_eq!(changes[0]["new"], 210);
    }

    #[test]
    fn diffed_mode_tracks_zones_separately() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, path).unwrap();

        logger.log_response("stato_zona", Some(1), r#"{"c":"stato_zona","t":200}"#);
        logger.log_response("stato_zona", Some(2), r#"{"c":"stato_zona","t":180}"#);
        logger.log_response("stato_zona", Some(1), r#"{"c":"stato_zona","t":200}"#);

        let lines = read_lines(path);
        assert_eq!(lines[0]["full"], true);
        assert_eq!(lines[1]["full"], true);
        assert_eq!(lines[2]["changes"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn command_responses_are_never_diffed() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, path).unwrap();

        logger.log_response("upd_cu", None, r#"{"res":1}"#);
        logger.log_response("upd_cu", None, r#"{"res":1}"#);

        let lines = read_lines(path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["body"]["res"], 1);
        assert!(lines[1].get("changes").is_none());
    }

    #[test]
    fn unparseable_response_is_kept_as_text() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        logger.log_request(&status_message("2909"), None);
        logger.log_response("stato", None, "garbage");

        let lines = read_lines(path);
        assert_eq!(lines[1]["body"], "garbage");
    }

    #[test]
    fn failure_entry_captures_error() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        logger.log_failure("stato_zona", Some(3), &crate::Error::Protocol("bad".into()));

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "err");
        assert_eq!(lines[0]["zone"], 3);
        assert_eq!(lines[0]["error"], "protocol error: bad");
    }
}
