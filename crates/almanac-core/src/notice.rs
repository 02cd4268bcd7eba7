use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A transient message for the user, dismissed after `timeout_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub timeout_ms: u64,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
            timeout_ms: 3_000,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
            timeout_ms: 5_000,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
            timeout_ms: 8_000,
        }
    }
}

pub trait NoticeSink {
    fn notify(&mut self, notice: Notice);
}

/// Keeps notices until they are taken.
#[derive(Debug, Clone, Default)]
pub struct CollectedNotices {
    notices: Vec<Notice>,
}

impl CollectedNotices {
    pub fn take(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn as_slice(&self) -> &[Notice] {
        &self.notices
    }
}

impl NoticeSink for CollectedNotices {
    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}
