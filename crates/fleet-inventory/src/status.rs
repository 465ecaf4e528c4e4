//! Node status view.
//!
//! The store keeps status as flat `status`/`statustime` style pairs; callers
//! get one entry per lifecycle stage that has a state set.

use fleet_state::NodeStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot: Option<StatusEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<StatusEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<StatusEntry>,
}

fn entry(state: &Option<String>, updated_at: &Option<String>) -> Option<StatusEntry> {
    state
        .as_ref()
        .filter(|s| !s.is_empty())
        .map(|state| StatusEntry {
            state: state.clone(),
            updated_at: updated_at.clone(),
        })
}

impl From<&NodeStatus> for StatusView {
    fn from(status: &NodeStatus) -> Self {
        Self {
            boot: entry(&status.status, &status.statustime),
            sync: entry(&status.updatestatus, &status.updatestatustime),
            app: entry(&status.appstatus, &status.appstatustime),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_set_stages_appear() {
        let status = NodeStatus {
            status: Some("booted".to_string()),
            statustime: Some("10-19-2026 10:00:00".to_string()),
            ..NodeStatus::default()
        };
        let view = StatusView::from(&status);
        assert_eq!(
            serde_json::to_value(&view).unwrap(),
            json!({"boot": {"state": "booted", "updated_at": "10-19-2026 10:00:00"}})
        );
    }

    #[test]
    fn app_status_is_reported_as_app() {
        let status = NodeStatus {
            updatestatus: Some("synced".to_string()),
            appstatus: Some("sshd=up".to_string()),
            ..NodeStatus::default()
        };
        let view = StatusView::from(&status);
        assert_eq!(view.sync.unwrap().state, "synced");
        assert_eq!(view.app.unwrap().state, "sshd=up");
        assert!(view.boot.is_none());
    }

    #[test]
    fn empty_state_is_skipped() {
        let status = NodeStatus {
            status: Some(String::new()),
            ..NodeStatus::default()
        };
        assert_eq!(StatusView::from(&status), StatusView::default());
    }
}
