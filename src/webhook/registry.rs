//! Handler registry
//!
//! Maps `(object, field)` keys to pluggable [`EventHandler`]s. The registry is
//! built once at startup, wrapped in an `Arc` and only read afterwards.

use super::{dispatcher::HandlerJob, events::WebhookEvent, schemas::ObjectType};
use async_trait::async_trait;
use derive_more::{Display, Error};
use futures::FutureExt;
use std::{collections::HashMap, fmt, future::Future, str::FromStr, sync::Arc};

/// Dispatch key of a handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    object: ObjectType,
    field: String,
}

impl HandlerKey {
    pub fn new(object: ObjectType, field: impl Into<String>) -> Self {
        Self {
            object,
            field: field.into(),
        }
    }

    pub fn object(&self) -> &ObjectType {
        &self.object
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object, self.field)
    }
}

/// Business logic plugged into the registry.
///
/// Handlers run on the dispatch worker, after the provider got its response,
/// so they are free to perform slow follow-up work.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: WebhookEvent) -> anyhow::Result<()>;
}

/// Adapter turning an async closure into an [`EventHandler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(WebhookEvent) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, event: WebhookEvent) -> anyhow::Result<()> {
        (self.0)(event).await
    }
}

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(WebhookEvent) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    FnHandler(f)
}

#[derive(Debug, Display, Error, PartialEq, Eq)]
#[display("invalid field alias {_0:?}, expected <object>:<from_field>=<to_field>")]
pub struct InvalidFieldAlias(#[error(not(source))] pub String);

/// Correction of a field name the provider sends under a different spelling,
/// written as `<object>:<from_field>=<to_field>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAlias {
    pub object: ObjectType,
    pub from: String,
    pub to: String,
}

impl FromStr for FieldAlias {
    type Err = InvalidFieldAlias;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidFieldAlias(s.to_string());

        let (object, rename) = s.trim().split_once(':').ok_or_else(invalid)?;
        let (from, to) = rename.split_once('=').ok_or_else(invalid)?;
        let (object, from, to) = (object.trim(), from.trim(), to.trim());

        if object.is_empty() || from.is_empty() || to.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            object: ObjectType::from(object),
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Parses a comma separated alias list. Blank input yields no aliases.
pub fn parse_field_aliases(raw: &str) -> Result<Vec<FieldAlias>, InvalidFieldAlias> {
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(FieldAlias::from_str)
        .collect()
}

/// Result of [`HandlerRegistry::dispatch`].
pub enum Dispatch {
    /// A handler exists, run this job to invoke it.
    Job(HandlerJob),
    /// Nothing registered for the key. Not an error.
    NoHandler(HandlerKey),
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<HandlerKey, Arc<dyn EventHandler>>,
    aliases: HashMap<HandlerKey, String>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `(object, field)`, replacing any previous one.
    pub fn register<H>(&mut self, object: ObjectType, field: &str, handler: H) -> &mut Self
    where
        H: EventHandler + 'static,
    {
        self.register_shared(object, field, Arc::new(handler))
    }

    /// Same as [`HandlerRegistry::register`] for a handler serving several keys.
    pub fn register_shared(
        &mut self,
        object: ObjectType,
        field: &str,
        handler: Arc<dyn EventHandler>,
    ) -> &mut Self {
        let key = HandlerKey::new(object, field);
        if self.handlers.insert(key.clone(), handler).is_some() {
            logfire::warn!(
                "handler for {key} replaced",
                key = key.to_string()
            );
        }
        self
    }

    /// Routes `from` to whatever is registered under `to` for `object`.
    pub fn alias(&mut self, object: ObjectType, from: &str, to: &str) -> &mut Self {
        self.aliases
            .insert(HandlerKey::new(object, from), to.to_string());
        self
    }

    pub fn apply_aliases(&mut self, aliases: &[FieldAlias]) -> &mut Self {
        for alias in aliases {
            self.alias(alias.object.clone(), &alias.from, &alias.to);
        }
        self
    }

    /// Key an incoming `(object, field)` dispatches under once aliases apply.
    pub fn resolve(&self, object: &ObjectType, field: &str) -> HandlerKey {
        let key = HandlerKey::new(object.clone(), field);
        match self.aliases.get(&key) {
            Some(target) => HandlerKey::new(object.clone(), target.as_str()),
            None => key,
        }
    }

    pub fn is_registered(&self, key: &HandlerKey) -> bool {
        self.handlers.contains_key(key)
    }

    /// Whether any handler is registered for `object`.
    pub fn handles_object(&self, object: &ObjectType) -> bool {
        self.handlers.keys().any(|key| key.object() == object)
    }

    pub fn registered_keys(&self) -> Vec<&HandlerKey> {
        let mut keys: Vec<_> = self.handlers.keys().collect();
        keys.sort_by_key(|key| key.to_string());
        keys
    }

    /// Looks up the handler for `event.key` and packages its invocation as a
    /// job. The handler does not run until the job is executed.
    pub fn dispatch(&self, event: WebhookEvent) -> Dispatch {
        let Some(handler) = self.handlers.get(&event.key) else {
            return Dispatch::NoHandler(event.key);
        };

        let handler = Arc::clone(handler);
        let key = event.key.clone();
        let delivery_id = event.delivery_id;
        let task = async move { handler.handle(event).await }.boxed();

        Dispatch::Job(HandlerJob::new(key, delivery_id, task))
    }
}
