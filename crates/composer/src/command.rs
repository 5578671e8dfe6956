//! Command-tree execution.
//!
//! A node runs synchronously against the composer. If it produced a
//! completion (a state transition or an action), its `after` children are
//! queued back onto the composer once that completion resolves; otherwise
//! they run immediately, depth first.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use livemix_animator::TransitionOutcome;
use livemix_common::RationalTime;
use livemix_scene_model::{CommandKind, ComposerCommand};

use crate::composer::SceneComposer;
use crate::error::ComposerError;

/// Runs the `action` nodes of command trees.
#[async_trait::async_trait]
pub trait ActionHandler: Send + Sync {
    /// Perform `name` with `args`. Continuations of the node wait for this.
    async fn run(&self, name: &str, args: serde_json::Value) -> Result<(), ComposerError>;
}

/// Handler that rejects every action.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoActions;

#[async_trait::async_trait]
impl ActionHandler for NoActions {
    async fn run(&self, name: &str, _args: serde_json::Value) -> Result<(), ComposerError> {
        Err(ComposerError::action(name, "no action handler installed"))
    }
}

/// Resolves to whether the node's continuations should run.
pub(crate) type Completion = BoxFuture<'static, bool>;

/// Where continuations go once their parent's completion resolves.
pub(crate) trait Continuations: Send + 'static {
    fn schedule(&self, after: Vec<ComposerCommand>);
}

/// Run `command` and, where possible, its continuations.
///
/// Only the root node's failure is returned; failures further down the tree
/// are logged and skip that node's own continuations.
pub(crate) fn run_command<C>(
    composer: &mut SceneComposer,
    command: ComposerCommand,
    actions: &Arc<dyn ActionHandler>,
    continuations: &C,
) -> Result<(), ComposerError>
where
    C: Continuations + Clone,
{
    let ComposerCommand { kind, after } = command;
    let completion = execute(composer, kind, actions)?;
    match completion {
        None => {
            for next in after {
                if let Err(e) = run_command(composer, next, actions, continuations) {
                    tracing::warn!(error = %e, "Command continuation failed");
                }
            }
        }
        Some(done) => {
            let continuations = continuations.clone();
            tokio::spawn(async move {
                if done.await && !after.is_empty() {
                    continuations.schedule(after);
                }
            });
        }
    }
    Ok(())
}

fn execute(
    composer: &mut SceneComposer,
    kind: CommandKind,
    actions: &Arc<dyn ActionHandler>,
) -> Result<Option<Completion>, ComposerError> {
    match kind {
        CommandKind::Scene { scene } => {
            composer.set_scene(&scene)?;
            Ok(None)
        }
        CommandKind::ElementState {
            element,
            state,
            duration,
        } => {
            let duration = duration.unwrap_or(RationalTime::zero(1));
            let done = composer.set_state(&element, &state, duration)?;
            Ok(Some(
                done.map(|outcome| outcome != TransitionOutcome::Abandoned)
                    .boxed(),
            ))
        }
        CommandKind::Bind { asset, element } => {
            composer.bind(&asset, &element)?;
            Ok(None)
        }
        CommandKind::Unbind { element } => {
            composer.unbind(&element)?;
            Ok(None)
        }
        CommandKind::Action { name, args } => {
            let actions = actions.clone();
            Ok(Some(
                async move {
                    match actions.run(&name, args).await {
                        Ok(()) => true,
                        Err(e) => {
                            tracing::warn!(action = %name, error = %e, "Action failed");
                            false
                        }
                    }
                }
                .boxed(),
            ))
        }
    }
}
