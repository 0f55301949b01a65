use std::io::{self, Write};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use remind_core::{DisplayTarget, LifecycleEvent};

/// Display target that hands lifecycle events to the UI process as JSON
/// lines.
pub struct JsonLinesBridge<W: Write + Send> {
    out: Mutex<W>,
}

impl JsonLinesBridge<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JsonLinesBridge<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> DisplayTarget for JsonLinesBridge<W> {
    fn deliver(&self, event: &LifecycleEvent) -> Result<()> {
        let mut out = self.out.lock();
        serde_json::to_writer(&mut *out, event).context("failed to encode lifecycle event")?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use remind_core::{BasicNotification, NotificationKind};

    #[test]
    fn writes_one_json_line_per_event() {
        let bridge = JsonLinesBridge::new(Vec::new());
        let n = BasicNotification::new(NotificationKind::End, "Run", "End Run now", "End", Utc::now());
        bridge.deliver(&LifecycleEvent::Ended(n.clone())).unwrap();
        bridge.deliver(&LifecycleEvent::Ended(n)).unwrap();

        let output = String::from_utf8(bridge.into_inner()).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["event"], "notification-ended");
        assert_eq!(value["notification"]["type"], "end");
    }
}
