use tokio::time::Instant;

use super::events::{Notice, NoticeLevel};

const MAX_VISIBLE: usize = 3;

/// Most recent operator notices; timed ones disappear on their own.
#[derive(Debug, Default)]
pub struct StatusLine {
    entries: Vec<(Notice, Option<Instant>)>,
}

impl StatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notice: Notice) {
        let expires = notice.ttl.map(|ttl| Instant::now() + ttl);
        self.entries.retain(|(n, _)| n.text != notice.text);
        self.entries.push((notice, expires));
        if self.entries.len() > MAX_VISIBLE {
            let overflow = self.entries.len() - MAX_VISIBLE;
            self.entries.drain(..overflow);
        }
    }

    pub fn visible(&mut self) -> Vec<Notice> {
        let now = Instant::now();
        self.entries.retain(|(_, expires)| expires.is_none_or(|at| at > now));
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn render(&mut self) -> String {
        self.visible()
            .iter()
            .map(|n| match n.level {
                NoticeLevel::Info => n.text.clone(),
                NoticeLevel::Warn => format!("! {}", n.text),
                NoticeLevel::Error => format!("✖ {}", n.text),
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}
