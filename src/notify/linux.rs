use notify_rust::Notification;

use crate::error::{Error, Result};
use crate::notify::Notifier;

/// Freedesktop notification via the session bus
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn notify(&self, title: &str, body: &str) -> Result<()> {
        Notification::new()
            .appname("tasktime")
            .summary(title)
            .body(body)
            .show()
            .map_err(|err| Error::OperationFailed(err.to_string()))?;
        Ok(())
    }
}
