use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SpecError;

/// Identity of one planned task instance.
///
/// Ordering is by toolchain, then task, then variant, which is the order
/// dependency lists are reported in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TaskKey {
    pub toolchain: String,
    pub task: String,
    pub variant: String,
}

impl TaskKey {
    pub fn new(
        toolchain: impl Into<String>,
        task: impl Into<String>,
        variant: impl Into<String>,
    ) -> Self {
        Self {
            toolchain: toolchain.into(),
            task: task.into(),
            variant: variant.into(),
        }
    }

    pub fn has_variant(&self) -> bool {
        !self.variant.is_empty()
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.variant.is_empty() {
            write!(f, "{}/{}", self.toolchain, self.task)
        } else {
            write!(f, "{}/{}:{}", self.toolchain, self.task, self.variant)
        }
    }
}

impl FromStr for TaskKey {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (toolchain, task, variant) = super::spec::parse_task_ref(s)?;
        Ok(Self {
            toolchain,
            task,
            variant: variant.unwrap_or_default(),
        })
    }
}

// Keys appear as JSON object keys in run reports, so they travel as strings.
impl Serialize for TaskKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TaskKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(TaskKey::new("tc", "make", "").to_string(), "tc/make");
        assert_eq!(TaskKey::new("tc", "gen", "scala").to_string(), "tc/gen:scala");
    }

    #[test]
    fn test_ordering_is_field_wise() {
        let mut keys = vec![
            TaskKey::new("b", "a", ""),
            TaskKey::new("a", "z", ""),
            TaskKey::new("a", "b", "y"),
            TaskKey::new("a", "b", ""),
        ];
        keys.sort();
        let shown: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(shown, vec!["a/b", "a/b:y", "a/z", "b/a"]);
    }

    #[test]
    fn test_serde_as_string() {
        let key = TaskKey::new("tc", "gen", "scala");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"tc/gen:scala\"");
        let back: TaskKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
