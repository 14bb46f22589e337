//! Domain types for the dependency graph.
//!
//! The engine only needs to know three things about an issue: its ID, its
//! lifecycle state, and (for export) a display title. Everything else about
//! an issue belongs to the issue-management layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an issue
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(String);

impl IssueId {
    /// Create a new issue ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for IssueId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for IssueId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle state of an issue.
///
/// States are only ever set by explicit user or agent action. The engine
/// derives availability from them but never writes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Not started yet
    #[default]
    Backlog,

    /// Currently being worked on
    InProgress,

    /// Completed; satisfies dependents
    Done,

    /// Abandoned; will never be done
    Rejected,
}

impl LifecycleState {
    /// `done` and `rejected` are terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Rejected)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Backlog => "backlog",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// An issue as seen by the graph engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier
    pub id: IssueId,

    /// Display title, passed through to rendering collaborators
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Current lifecycle state
    #[serde(default)]
    pub state: LifecycleState,
}

impl Node {
    /// Create a backlog node with no title
    pub fn new(id: impl Into<IssueId>) -> Self {
        Self {
            id: id.into(),
            title: None,
            state: LifecycleState::Backlog,
        }
    }

    /// Set the display title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the initial lifecycle state
    #[must_use]
    pub fn with_state(mut self, state: LifecycleState) -> Self {
        self.state = state;
        self
    }
}

impl From<IssueId> for Node {
    fn from(id: IssueId) -> Self {
        Self::new(id)
    }
}

impl From<&str> for Node {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A directed dependency: `from` cannot start until `to` is done.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    /// The dependent issue
    pub from: IssueId,

    /// The issue being depended upon
    pub to: IssueId,
}

impl Edge {
    /// Create a new edge
    pub fn new(from: impl Into<IssueId>, to: impl Into<IssueId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Whether both endpoints are the same issue.
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::backlog(LifecycleState::Backlog, false)]
    #[case::in_progress(LifecycleState::InProgress, false)]
    #[case::done(LifecycleState::Done, true)]
    #[case::rejected(LifecycleState::Rejected, true)]
    fn terminal_states(#[case] state: LifecycleState, #[case] terminal: bool) {
        assert_eq!(state.is_terminal(), terminal);
    }

    #[test]
    fn state_serializes_snake_case() {
        let json = serde_json::to_string(&LifecycleState::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert_eq!(LifecycleState::InProgress.to_string(), "in_progress");
    }

    #[test]
    fn node_defaults_when_deserializing() {
        let node: Node = serde_json::from_str(r#"{"id":"a"}"#).unwrap();
        assert_eq!(node, Node::new("a"));
    }

    #[test]
    fn issue_id_serializes_as_plain_string() {
        let edge = Edge::new("a", "b");
        let json = serde_json::to_string(&edge).unwrap();
        assert_eq!(json, r#"{"from":"a","to":"b"}"#);
        assert_eq!(edge.to_string(), "a -> b");
    }
}
