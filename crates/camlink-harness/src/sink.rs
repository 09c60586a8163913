//! Recording view sink.

use camlink_client::ViewSink;
use camlink_core::{SessionError, ViewUpdate, snapshot::FieldGroup};
use camlink_proto::DeviceId;

/// Sink that keeps everything it is given, for assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    /// View updates, in order.
    pub views: Vec<(DeviceId, ViewUpdate)>,
    /// Change notifications, in order.
    pub changes: Vec<(DeviceId, FieldGroup)>,
    /// Connectivity transitions.
    pub connectivity: Vec<bool>,
    /// Refused commands and why.
    pub refused: Vec<(String, SessionError)>,
}

impl RecordingSink {
    /// Number of image refreshes shown for `device`.
    pub fn images(&self, device: &str) -> usize {
        self.views.iter().filter(|(d, u)| d == device && *u == ViewUpdate::Image).count()
    }
}

impl ViewSink for RecordingSink {
    fn view(&mut self, device: &str, update: &ViewUpdate) {
        self.views.push((device.to_string(), update.clone()));
    }

    fn connectivity(&mut self, connected: bool) {
        self.connectivity.push(connected);
    }

    fn changed(&mut self, device: &str, group: FieldGroup) {
        self.changes.push((device.to_string(), group));
    }

    fn refused(&mut self, command: &str, error: &SessionError) {
        self.refused.push((command.to_string(), error.clone()));
    }
}
