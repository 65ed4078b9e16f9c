use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::connectors::MailService;
use crate::error::SyncError;
use crate::mail::fetch::fan_out;
use crate::models::RawMessage;

pub const APPS_SENT: &str = "apps-sent";
pub const APPS_REJECTED: &str = "apps-rejected";
pub const APPS_INTERESTED: &str = "apps-interested";
pub const INTERESTING_LABELS: [&str; 3] = [APPS_SENT, APPS_REJECTED, APPS_INTERESTED];

/// Built-in Gmail labels; their ids are their names, so they never need a
/// lookup and never match an interesting label.
const SYSTEM_LABELS: &[&str] = &[
    "INBOX",
    "SENT",
    "DRAFT",
    "TRASH",
    "SPAM",
    "STARRED",
    "UNREAD",
    "IMPORTANT",
    "CATEGORY_PERSONAL",
    "CATEGORY_SOCIAL",
    "CATEGORY_PROMOTIONS",
    "CATEGORY_UPDATES",
    "CATEGORY_FORUMS",
    "CHAT",
];

pub fn is_interesting(name: &str) -> bool {
    INTERESTING_LABELS.contains(&name)
}

/// Label id to name for one sync run, holding interesting labels only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMapping {
    names: HashMap<String, String>,
}

impl LabelMapping {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, label_id: &str) -> Option<&str> {
        self.names.get(label_id).map(String::as_str)
    }

    /// The first interesting label in the message's own label order.
    pub fn label_for(&self, message: &RawMessage) -> Option<String> {
        message
            .label_ids
            .iter()
            .find_map(|id| self.name(id))
            .map(str::to_string)
    }
}

impl FromIterator<(String, String)> for LabelMapping {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            names: iter
                .into_iter()
                .filter(|(_, name)| is_interesting(name))
                .collect(),
        }
    }
}

/// Looks up every distinct user label id across `messages`, one request per
/// id, at most `concurrency` at a time.
pub async fn resolve_names(
    mail: &dyn MailService,
    messages: &[RawMessage],
    concurrency: usize,
) -> Result<LabelMapping, SyncError> {
    let distinct: BTreeSet<&str> = messages
        .iter()
        .flat_map(|message| message.label_ids.iter().map(String::as_str))
        .filter(|id| !SYSTEM_LABELS.contains(id))
        .collect();
    let ids: Vec<String> = distinct.into_iter().map(str::to_string).collect();
    debug!(distinct_labels = ids.len(), "resolving label names");

    let labels = fan_out(ids, concurrency, |id| async move {
        mail.get_label(&id).await
    })
    .await?;

    Ok(labels
        .into_iter()
        .map(|label| (label.id, label.name))
        .collect())
}
