//! Method handlers and the per-service method table.

use super::dispatch::{CallArgs, DispatchStrategy};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;

/// Error type a handler may fail with. Only its message crosses the wire.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A callable exposed by a service under a method name.
///
/// Implement this directly for handlers that need to await. Synchronous
/// closures are wrapped for you by [`MethodTable::insert_fn`].
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Run the method. The returned string becomes the `OK` payload.
    async fn call(&self, args: CallArgs) -> Result<String, HandlerError>;
}

/// Shared handler reference stored in a [`MethodTable`].
pub type DynMethodHandler = Arc<dyn MethodHandler>;

type SyncFn = dyn Fn(CallArgs) -> Result<String, HandlerError> + Send + Sync;

struct FnHandler(Box<SyncFn>);

#[async_trait]
impl MethodHandler for FnHandler {
    async fn call(&self, args: CallArgs) -> Result<String, HandlerError> {
        (self.0)(args)
    }
}

/// One row of the method table.
#[derive(Clone)]
pub struct MethodEntry {
    pub handler: DynMethodHandler,
    pub doc: Option<String>,
    /// Overrides the service-wide strategy for this method only.
    pub strategy: Option<DispatchStrategy>,
}

impl std::fmt::Debug for MethodEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodEntry")
            .field("doc", &self.doc)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

/// Method name to handler, fixed once the service starts.
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    methods: BTreeMap<String, MethodEntry>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a handler.
    pub fn insert(&mut self, name: impl Into<String>, entry: MethodEntry) {
        self.methods.insert(name.into(), entry);
    }

    /// Wrap a synchronous closure as a handler.
    pub fn insert_fn<F, R, E>(
        &mut self,
        name: impl Into<String>,
        doc: Option<String>,
        strategy: Option<DispatchStrategy>,
        f: F,
    ) where
        F: Fn(CallArgs) -> Result<R, E> + Send + Sync + 'static,
        R: Display,
        E: Into<HandlerError>,
    {
        let handler = FnHandler(Box::new(move |args| {
            f(args).map(|r| r.to_string()).map_err(Into::into)
        }));
        self.insert(
            name,
            MethodEntry {
                handler: Arc::new(handler),
                doc,
                strategy,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&MethodEntry> {
        self.methods.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Method names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.methods.keys().cloned().collect()
    }

    /// Name to doc string, `"undocumented"` where none was given.
    pub fn docs(&self) -> BTreeMap<String, String> {
        self.methods
            .iter()
            .map(|(name, entry)| {
                let doc = entry.doc.clone().unwrap_or_else(|| "undocumented".to_string());
                (name.clone(), doc)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
