//! Fans each platform event out to every matching handler.
//!
//! Features contribute their handlers once, at bootstrap, through a
//! [`RouterBuilder`]. The resulting [`EventRouter`] is immutable: a flat,
//! ordered registry that is scanned on every event.

use std::{any::Any, future::Future, panic::AssertUnwindSafe, sync::Arc};

use futures::{FutureExt, future::BoxFuture};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info_span, instrument};

use crate::{
    base::{
        error::{SnipeError, SnipeResult},
        types::Void,
    },
    interaction::event::{DeletedMessage, Interaction, InteractionKind, PlatformEvent, SourceContext},
};

// Types.

pub type BoxedHandler<E> = Arc<dyn Fn(Arc<E>) -> BoxFuture<'static, Void> + Send + Sync>;

/// The interaction types a registration can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionEventType {
    ContextMenu,
    SelectMenu,
    Button,
    AutoComplete,
    ModalSubmit,
}

impl InteractionEventType {
    /// Classifies an interaction, or `None` if no registration can ever match it.
    pub fn classify(interaction: &Interaction) -> Option<Self> {
        match interaction.kind {
            InteractionKind::ContextMenu => Some(Self::ContextMenu),
            InteractionKind::SelectMenu => Some(Self::SelectMenu),
            InteractionKind::Button => Some(Self::Button),
            InteractionKind::AutoComplete => Some(Self::AutoComplete),
            InteractionKind::ModalSubmit => Some(Self::ModalSubmit),
            InteractionKind::ChatInput | InteractionKind::Ping => None,
        }
    }
}

fn boxed<E, F, Fut>(handler: F) -> BoxedHandler<E>
where
    E: Send + Sync + 'static,
    F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Void> + Send + 'static,
{
    Arc::new(move |event| handler(event).boxed())
}

/// One feature's interest in a class of interactions.
#[derive(Clone)]
pub struct Registration {
    /// Name used when reporting failures.
    pub name: String,
    pub event_type: InteractionEventType,
    /// Custom id for components, command name for autocomplete and context menus.
    pub match_key: String,
    /// `Some(true)`: cached contexts only. `Some(false)`: partial contexts only. `None`: both.
    pub cached: Option<bool>,
    handler: BoxedHandler<Interaction>,
}

impl Registration {
    pub fn new<F, Fut>(name: impl Into<String>, event_type: InteractionEventType, match_key: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Arc<Interaction>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Void> + Send + 'static,
    {
        Self {
            name: name.into(),
            event_type,
            match_key: match_key.into(),
            cached: None,
            handler: boxed(handler),
        }
    }

    /// Restricts the registration to cached (`true`) or partial (`false`) source contexts.
    pub fn cached(mut self, cached: bool) -> Self {
        self.cached = Some(cached);
        self
    }

    pub fn matches(&self, event_type: InteractionEventType, interaction: &Interaction) -> bool {
        if self.event_type != event_type || interaction.match_key() != Some(self.match_key.as_str()) {
            return false;
        }

        match self.cached {
            Some(true) => interaction.context == SourceContext::Cached,
            Some(false) => interaction.context == SourceContext::Partial,
            None => true,
        }
    }
}

/// A named hook for a non-interaction event.
#[derive(Clone)]
struct Hook<E> {
    name: String,
    handler: BoxedHandler<E>,
}

/// A feature module that contributes handlers to the router.
pub trait Feature {
    fn register(&self, router: &mut RouterBuilder);
}

// Builder.

/// Collects registrations from every feature before the router is frozen.
#[derive(Default)]
pub struct RouterBuilder {
    registrations: Vec<Registration>,
    delete_hooks: Vec<Hook<DeletedMessage>>,
    sweep_hooks: Vec<Hook<()>>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an interaction registration. Duplicates are kept and all fire.
    pub fn register(&mut self, registration: Registration) -> &mut Self {
        self.registrations.push(registration);
        self
    }

    /// Adds a hook run for every deleted message.
    pub fn on_message_delete<F, Fut>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Arc<DeletedMessage>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Void> + Send + 'static,
    {
        self.delete_hooks.push(Hook {
            name: name.into(),
            handler: boxed(handler),
        });
        self
    }

    /// Adds a hook run on every cache sweep signal.
    pub fn on_cache_sweep<F, Fut>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Arc<()>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Void> + Send + 'static,
    {
        self.sweep_hooks.push(Hook {
            name: name.into(),
            handler: boxed(handler),
        });
        self
    }

    /// Lets a feature contribute its handlers.
    pub fn with_feature(mut self, feature: &dyn Feature) -> Self {
        feature.register(&mut self);
        self
    }

    pub fn build(self) -> EventRouter {
        EventRouter {
            inner: Arc::new(EventRouterInner {
                registrations: self.registrations,
                delete_hooks: self.delete_hooks,
                sweep_hooks: self.sweep_hooks,
            }),
        }
    }
}

// Router.

struct EventRouterInner {
    registrations: Vec<Registration>,
    delete_hooks: Vec<Hook<DeletedMessage>>,
    sweep_hooks: Vec<Hook<()>>,
}

/// The single subscription point on the platform event source.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct EventRouter {
    inner: Arc<EventRouterInner>,
}

impl EventRouter {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Number of interaction registrations.
    pub fn len(&self) -> usize {
        self.inner.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.registrations.is_empty()
    }

    /// Spawns every handler that matches the event, in registration order.
    ///
    /// Does not wait for the handlers. Each runs in its own task; a failure is
    /// logged and never reaches sibling handlers or the caller.
    #[instrument(skip_all)]
    pub fn dispatch(&self, event: PlatformEvent) -> Dispatched {
        let mut dispatched = Dispatched::default();

        match event {
            PlatformEvent::Interaction(interaction) => {
                let Some(event_type) = InteractionEventType::classify(&interaction) else {
                    debug!("Discarding unclassifiable interaction `{}`.", interaction.id);
                    return dispatched;
                };

                let interaction = Arc::new(interaction);

                for registration in self.inner.registrations.iter().filter(|r| r.matches(event_type, &interaction)) {
                    dispatched.spawn(&registration.name, &registration.handler, interaction.clone());
                }
            }
            PlatformEvent::MessageDelete(message) => {
                let message = Arc::new(message);

                for hook in &self.inner.delete_hooks {
                    dispatched.spawn(&hook.name, &hook.handler, message.clone());
                }
            }
            PlatformEvent::CacheSweep => {
                let signal = Arc::new(());

                for hook in &self.inner.sweep_hooks {
                    dispatched.spawn(&hook.name, &hook.handler, signal.clone());
                }
            }
        }

        debug!("Dispatched event to {} handler(s).", dispatched.len());

        dispatched
    }
}

// Dispatch handles.

/// Handles for the tasks spawned by one dispatch.
///
/// Dropping this detaches the tasks; they still run to completion.
#[derive(Default)]
pub struct Dispatched {
    handles: Vec<JoinHandle<SnipeResult<()>>>,
}

impl Dispatched {
    fn spawn<E>(&mut self, name: &str, handler: &BoxedHandler<E>, event: Arc<E>)
    where
        E: Send + Sync + 'static,
    {
        let name = name.to_string();
        let handler = handler.clone();
        let span = info_span!("handler", name = %name);

        let handle = tokio::spawn(
            async move {
                // The handler is called inside the task so that a panic while building its future is caught too.
                let outcome = AssertUnwindSafe(async move { handler(event).await }).catch_unwind().await;

                let reason = match outcome {
                    Ok(Ok(())) => return Ok(()),
                    Ok(Err(err)) => format!("{err:#}"),
                    Err(panic) => panic_message(panic.as_ref()),
                };

                let err = SnipeError::HandlerInvocation { handler: name, reason };
                error!("Error while handling: {}", err);

                Err(err)
            }
            .instrument(span),
        );

        self.handles.push(handle);
    }

    /// Number of handlers spawned.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits for every spawned handler and returns the failures.
    pub async fn join(self) -> Vec<SnipeError> {
        let mut failures = Vec::new();

        for handle in self.handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => failures.push(err),
                Err(join_error) => failures.push(SnipeError::HandlerInvocation {
                    handler: "unknown".to_string(),
                    reason: join_error.to_string(),
                }),
            }
        }

        failures
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

// Tests.
