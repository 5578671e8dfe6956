//! Composer command trees.
//!
//! A command may carry `after` continuations. The composer runs them once
//! the command's completion resolves (for state transitions and actions) or
//! right away (for commands that complete synchronously).

use livemix_common::RationalTime;
use serde::{Deserialize, Serialize};

/// One node of a command tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposerCommand {
    #[serde(flatten)]
    pub kind: CommandKind,

    /// Commands to run after this one completes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<ComposerCommand>,
}

/// What a command node does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CommandKind {
    /// Switch the active scene.
    Scene { scene: String },

    /// Drive an element toward a state of the current scene.
    #[serde(rename_all = "camelCase")]
    ElementState {
        element: String,
        state: String,
        #[serde(default)]
        duration: Option<RationalTime>,
    },

    /// Bind a live asset to an element.
    Bind { asset: String, element: String },

    /// Detach whatever asset is bound to an element.
    Unbind { element: String },

    /// Caller-defined action (file playback, text overlays, ...).
    Action {
        name: String,
        #[serde(default)]
        args: serde_json::Value,
    },
}

impl ComposerCommand {
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            after: Vec::new(),
        }
    }

    pub fn scene(scene: impl Into<String>) -> Self {
        Self::new(CommandKind::Scene {
            scene: scene.into(),
        })
    }

    pub fn element_state(
        element: impl Into<String>,
        state: impl Into<String>,
        duration: Option<RationalTime>,
    ) -> Self {
        Self::new(CommandKind::ElementState {
            element: element.into(),
            state: state.into(),
            duration,
        })
    }

    pub fn bind(asset: impl Into<String>, element: impl Into<String>) -> Self {
        Self::new(CommandKind::Bind {
            asset: asset.into(),
            element: element.into(),
        })
    }

    pub fn unbind(element: impl Into<String>) -> Self {
        Self::new(CommandKind::Unbind {
            element: element.into(),
        })
    }

    pub fn action(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self::new(CommandKind::Action {
            name: name.into(),
            args,
        })
    }

    /// Append a continuation.
    pub fn then(mut self, next: ComposerCommand) -> Self {
        self.after.push(next);
        self
    }

    /// Number of nodes in this tree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.after.iter().map(ComposerCommand::node_count).sum::<usize>()
    }
}
