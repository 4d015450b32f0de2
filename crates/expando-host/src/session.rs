//! Host boundary and interop session
//!
//! [`ScriptHost`] is the narrow surface a scripting environment has to offer:
//! named bindings and script execution. [`InteropSession`] drives one host
//! against a live graph.

use std::collections::HashMap;
use std::sync::Arc;

use expando_model::{DynMap, DynValue, ObjectId, SharedGraph, WalkConfig};
use expando_walk::{apply_dynamic_with, discover, DynamicConverter, HookFactory};
use tracing::{debug, info};

use crate::error::HostError;
use crate::handle::{handles, TypeHandle};

/// Something bound into the host under a name
#[derive(Debug, Clone)]
pub enum HostBinding {
    /// A dynamic value, usually a converted attribute map
    Value(DynValue),
    /// An inspectable type
    Type(TypeHandle),
}

/// A scripting environment consuming and producing dynamic values
#[cfg_attr(test, mockall::automock)]
pub trait ScriptHost {
    /// Make `binding` visible to scripts as `name`
    fn bind(&mut self, name: &str, binding: HostBinding) -> Result<(), HostError>;

    /// Evaluate `script` and return its result
    fn execute(&mut self, script: &str) -> Result<DynValue, HostError>;
}

/// One host working against one graph
///
/// Values exposed by name are remembered so host edits can be synced back
/// onto typed objects afterwards.
pub struct InteropSession<H> {
    graph: SharedGraph,
    host: H,
    config: WalkConfig,
    hook_factory: Option<Arc<dyn HookFactory>>,
    list_hooks: bool,
    exposed: HashMap<String, DynValue>,
}

impl<H: ScriptHost> InteropSession<H> {
    /// Create session over `graph`
    ///
    /// # Errors
    /// Returns [`HostError::Config`] if `config` fails validation
    pub fn new(graph: SharedGraph, host: H, config: WalkConfig) -> Result<Self, HostError> {
        config.validate()?;
        info!(max_depth = config.max_depth, "interop session opened");
        Ok(Self {
            graph,
            host,
            config,
            hook_factory: None,
            list_hooks: true,
            exposed: HashMap::new(),
        })
    }

    /// Attach node hooks from `factory` to exposed values
    #[must_use]
    pub fn with_hook_factory(mut self, factory: Arc<dyn HookFactory>) -> Self {
        self.hook_factory = Some(factory);
        self
    }

    /// Enable or disable `AddTo_*` hooks on exposed sequences (on by default)
    #[must_use]
    pub fn with_list_hooks(mut self, enabled: bool) -> Self {
        self.list_hooks = enabled;
        self
    }

    /// Graph shared with list hooks and instantiating handles
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    /// Underlying host
    #[inline]
    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Underlying host, mutably
    #[inline]
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Value previously exposed as `name`
    #[must_use]
    pub fn exposed(&self, name: &str) -> Option<&DynValue> {
        self.exposed.get(name)
    }

    /// Bind a handle for every type reachable from `root`
    ///
    /// # Errors
    /// Returns [`HostError::Graph`] for an unknown root and propagates host
    /// binding failures
    pub fn expose_types(&mut self, root: ObjectId) -> Result<Vec<TypeHandle>, HostError> {
        let handles = {
            let graph = self.graph.read();
            graph.type_of(root)?;
            let catalog = discover(&graph, Some(root));
            handles(&catalog, graph.registry())
        };
        for handle in &handles {
            debug!(identifier = handle.identifier(), ty = handle.name(), "binding type");
            self.host
                .bind(handle.identifier(), HostBinding::Type(handle.clone()))?;
        }
        info!(root = %root, count = handles.len(), "types exposed");
        Ok(handles)
    }

    /// Convert `root` and bind the result as `name`
    ///
    /// # Errors
    /// Propagates host binding failures
    pub fn expose(&mut self, name: &str, root: Option<ObjectId>) -> Result<DynMap, HostError> {
        let mut converter = DynamicConverter::new(self.config.clone());
        if let Some(factory) = &self.hook_factory {
            converter = converter.with_node_hooks(Arc::clone(factory));
        }
        if self.list_hooks {
            converter = converter.with_list_hooks(Arc::clone(&self.graph));
        }
        let map = converter.convert_shared(&self.graph, root);

        self.host.bind(name, HostBinding::Value(DynValue::Map(map.clone())))?;
        self.exposed.insert(name.to_string(), DynValue::Map(map.clone()));
        info!(name, "value exposed");
        Ok(map)
    }

    /// Execute `script` in the host
    ///
    /// No graph lock is held while the script runs, so list hooks invoked by
    /// the script can write to the graph.
    ///
    /// # Errors
    /// Propagates host execution failures
    pub fn run(&mut self, script: &str) -> Result<DynValue, HostError> {
        info!(len = script.len(), "running script");
        let result = self.host.execute(script)?;
        debug!(result = result.type_name(), "script finished");
        Ok(result)
    }

    /// Map the value exposed as `name` back onto `target`
    ///
    /// # Errors
    /// Returns [`HostError::Unbound`] when nothing was exposed as `name` and
    /// [`HostError::Graph`] for an unknown target
    pub fn sync_back(&mut self, name: &str, target: ObjectId) -> Result<(), HostError> {
        let source = self
            .exposed
            .get(name)
            .ok_or_else(|| HostError::Unbound(name.to_string()))?;
        let mut graph = self.graph.write();
        graph.type_of(target)?;
        apply_dynamic_with(&mut graph, Some(target), Some(source), &self.config);
        info!(name, target = %target, "host edits synced back");
        Ok(())
    }

    /// End the session, returning the host
    pub fn into_host(self) -> H {
        info!("interop session closed");
        self.host
    }
}
