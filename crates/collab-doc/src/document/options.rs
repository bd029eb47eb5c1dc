use serde::{Deserialize, Serialize};

/// Document configuration.
///
/// Deserializable so hosts can keep it next to their own settings:
///
/// ```
/// use collab_doc::DocumentOptions;
///
/// let options: DocumentOptions = serde_json::from_str(r#"{"history_limit": 50}"#).unwrap();
/// assert_eq!(options.history_limit, 50);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentOptions {
    /// Maximum number of retained undo records, oldest dropped first.
    /// `0` keeps everything.
    pub history_limit: usize,
}

impl DocumentOptions {
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }
}
