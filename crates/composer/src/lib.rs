//! Livemix Composer
//!
//! Connects live assets to scene elements and drives the mixers:
//! - **Elements:** one arena slot per declared element, parent links by index
//! - **Routing:** samples pass through the element's animators (and its
//!   ancestors') before reaching a mixer
//! - **Scenes:** switching rewires parents, states and connections
//! - **Commands:** trees of scene, state, bind and action nodes with
//!   continuations that wait on transitions
//! - **Runtime:** the composer and both mixers as tokio tasks

pub mod arena;
pub mod command;
pub mod composer;
pub mod error;
pub mod runtime;

pub use arena::{ElementArena, ElementIndex, ElementSlot};
pub use command::{ActionHandler, NoActions};
pub use composer::{ComposerSnapshot, ElementSnapshot, SceneComposer, StateCompletion};
pub use error::ComposerError;
pub use runtime::{spawn_composer, ComposerHandle, ComposerMessage, ComposerRuntime};
