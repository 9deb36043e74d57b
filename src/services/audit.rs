use std::path::PathBuf;

use chrono::Utc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Append-only, human-readable log of moderation events
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: Option<PathBuf>,
}

impl AuditLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Only mirror events to tracing
    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// Format one audit line
    pub fn format_entry(category: &str, message: &str) -> String {
        format!(
            "[{}] [{}] {}\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            category,
            message
        )
    }

    /// Record an event. Failures to write are logged, never returned.
    pub async fn log_event(&self, category: &str, message: &str) {
        info!(category, "{}", message);

        let Some(path) = &self.path else {
            return;
        };

        let entry = Self::format_entry(category, message);
        let result = async {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(entry.as_bytes()).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = result {
            warn!("Failed to write audit log {}: {:?}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_entry() {
        let line = AuditLog::format_entry("MODERATION", "hello");
        assert!(line.ends_with("] [MODERATION] hello\n"));
        assert!(line.starts_with('['));
    }

    #[tokio::test]
    async fn test_appends_lines() {
        let path = std::env::temp_dir().join(format!("warden-audit-{}.log", uuid::Uuid::new_v4()));
        let audit = AuditLog::new(Some(path.clone()));

        audit.log_event("MODERATION", "first").await;
        audit.log_event("MODERATION_CONFIG", "second").await;

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[MODERATION] first"));
        assert!(lines[1].ends_with("[MODERATION_CONFIG] second"));

        let _ = tokio::fs::remove_file(&path).await;
    }
}
