//! Namespaces: scoped key-to-value registries used for cross-referencing.
//!
//! Every namespace is governed by a [`NamespaceBehaviour`] deciding where a
//! binding is stored and how lookups search for it. Bindings are
//! write-once-per-distinct-value: rebinding an equal value is a no-op
//! success, rebinding a different value is a hard error.
//!
//! Callers must never poll for an absent value; absence is awaited through
//! the action engine, which registers a pending listener here and is notified
//! on the matching addition.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::action::PrereqRef;
use super::context::CtxId;
use super::errors::BuildError;
use super::tree::ContextTree;

/// The closed set of namespaces the build uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceId {
    /// Schema name → root context. Global.
    Schemas,
    /// Group name → defining context. Tree-scoped.
    Groups,
    /// Typedef name → defining context. Tree-scoped.
    Typedefs,
    /// Feature name → declaring context. Global.
    Features,
    /// Child schema-node name → child context, hosted per statement.
    ChildNodes,
    /// Import prefix → imported schema name. Per source document.
    ImportPrefixes,
    /// Import prefix → imported schema root context. Derived, read-through.
    ImportedSchemas,
}

impl std::fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NamespaceId::Schemas => "schemas",
            NamespaceId::Groups => "groups",
            NamespaceId::Typedefs => "typedefs",
            NamespaceId::Features => "features",
            NamespaceId::ChildNodes => "child-nodes",
            NamespaceId::ImportPrefixes => "import-prefixes",
            NamespaceId::ImportedSchemas => "imported-schemas",
        };
        f.write_str(name)
    }
}

/// Where a namespace stores bindings and how lookups search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceBehaviour {
    /// One map for the whole build.
    Global,
    /// Rooted at a statement; lookup falls back toward the document root,
    /// nearest-enclosing-first.
    TreeScoped,
    /// One map per top-level document.
    SourceLocal,
    /// Lazily computed per key: look the key up in `key_source` (expecting a
    /// name), then look that name up in `target`. Cached, read-through only.
    Derived {
        key_source: NamespaceId,
        target: NamespaceId,
    },
}

impl NamespaceId {
    pub fn behaviour(self) -> NamespaceBehaviour {
        match self {
            NamespaceId::Schemas | NamespaceId::Features => NamespaceBehaviour::Global,
            NamespaceId::Groups | NamespaceId::Typedefs | NamespaceId::ChildNodes => {
                NamespaceBehaviour::TreeScoped
            }
            NamespaceId::ImportPrefixes => NamespaceBehaviour::SourceLocal,
            NamespaceId::ImportedSchemas => NamespaceBehaviour::Derived {
                key_source: NamespaceId::ImportPrefixes,
                target: NamespaceId::Schemas,
            },
        }
    }
}

/// A value bound in a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NsValue {
    Ctx(CtxId),
    Name(SmolStr),
}

impl NsValue {
    pub fn as_ctx(&self) -> Option<CtxId> {
        match self {
            NsValue::Ctx(id) => Some(*id),
            NsValue::Name(_) => None,
        }
    }
}

/// The storage node a binding physically lives at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum StorageRef {
    Global,
    Ctx(CtxId),
}

/// A registered single-shot wait for a (namespace, key) binding.
#[derive(Debug, Clone)]
pub(crate) struct NsListener {
    pub(crate) prereq: PrereqRef,
    /// Where the lookup would start.
    pub(crate) search_from: CtxId,
    /// When set, only an addition at exactly this storage fires the listener
    /// (path-prerequisite hops bind to one statement's own registry).
    pub(crate) exact_storage: Option<CtxId>,
}

/// All namespace storages of one build, plus pending listeners.
#[derive(Debug, Default)]
pub(crate) struct NamespaceStore {
    entries: FxHashMap<(StorageRef, NamespaceId), IndexMap<SmolStr, NsValue>>,
    derived_cache: FxHashMap<(StorageRef, NamespaceId, SmolStr), NsValue>,
    pending: FxHashMap<(NamespaceId, SmolStr), Vec<NsListener>>,
}

impl NamespaceStore {
    /// Resolve the storage node a write from `scope` lands at.
    fn write_storage(
        tree: &ContextTree,
        scope: CtxId,
        ns: NamespaceId,
    ) -> Result<StorageRef, BuildError> {
        match ns.behaviour() {
            NamespaceBehaviour::Global => Ok(StorageRef::Global),
            NamespaceBehaviour::TreeScoped => Ok(StorageRef::Ctx(scope)),
            NamespaceBehaviour::SourceLocal => Ok(StorageRef::Ctx(tree.root_of(scope))),
            NamespaceBehaviour::Derived { .. } => Err(BuildError::ReadOnlyNamespace { ns }),
        }
    }

    /// Bind `key` to `value` in `ns`, scoped at `scope`.
    ///
    /// Returns the storage the binding landed at when it is new, `None` when
    /// an equal binding already existed, and an error when the key is already
    /// bound to a different value.
    pub(crate) fn add_to(
        &mut self,
        tree: &ContextTree,
        scope: CtxId,
        ns: NamespaceId,
        key: SmolStr,
        value: NsValue,
    ) -> Result<Option<StorageRef>, BuildError> {
        let storage = Self::write_storage(tree, scope, ns)?;
        let map = self.entries.entry((storage, ns)).or_default();
        match map.get(&key) {
            Some(existing) if *existing == value => Ok(None),
            Some(_) => Err(BuildError::DuplicateKey { ns, key }),
            None => {
                tracing::trace!("namespace {ns} binds '{key}' at {storage:?}");
                map.insert(key, value);
                Ok(Some(storage))
            }
        }
    }

    /// Look `key` up in `ns` as seen from `from`, following the behaviour.
    ///
    /// Derived namespaces compute their projection lazily and cache per key.
    pub(crate) fn get_from(
        &mut self,
        tree: &ContextTree,
        from: CtxId,
        ns: NamespaceId,
        key: &str,
    ) -> Option<NsValue> {
        match ns.behaviour() {
            NamespaceBehaviour::Global => self.get_at(StorageRef::Global, ns, key),
            NamespaceBehaviour::SourceLocal => {
                self.get_at(StorageRef::Ctx(tree.root_of(from)), ns, key)
            }
            NamespaceBehaviour::TreeScoped => tree
                .ancestors_or_self(from)
                .into_iter()
                .find_map(|ctx| self.get_at(StorageRef::Ctx(ctx), ns, key)),
            NamespaceBehaviour::Derived { key_source, target } => {
                let cache_key = (StorageRef::Ctx(tree.root_of(from)), ns, SmolStr::new(key));
                if let Some(cached) = self.derived_cache.get(&cache_key) {
                    return Some(cached.clone());
                }
                let NsValue::Name(name) = self.get_from(tree, from, key_source, key)? else {
                    return None;
                };
                let value = self.get_from(tree, from, target, &name)?;
                self.derived_cache.insert(cache_key, value.clone());
                Some(value)
            }
        }
    }

    /// Exact lookup at one statement's own storage, no fallback.
    pub(crate) fn get_local(&self, ctx: CtxId, ns: NamespaceId, key: &str) -> Option<NsValue> {
        self.get_at(StorageRef::Ctx(ctx), ns, key)
    }

    fn get_at(&self, storage: StorageRef, ns: NamespaceId, key: &str) -> Option<NsValue> {
        self.entries.get(&(storage, ns))?.get(key).cloned()
    }

    /// Lookup at a known storage node, for notification delivery.
    pub(crate) fn get_at_storage(
        &self,
        storage: StorageRef,
        ns: NamespaceId,
        key: &str,
    ) -> Option<NsValue> {
        self.get_at(storage, ns, key)
    }

    pub(crate) fn add_listener(&mut self, ns: NamespaceId, key: SmolStr, listener: NsListener) {
        tracing::trace!(
            "namespace {ns} key '{key}' awaited by {:?}",
            listener.prereq
        );
        self.pending.entry((ns, key)).or_default().push(listener);
    }

    /// Split off the pending listeners that can see an addition at `storage`.
    ///
    /// Listener order is preserved both for the fired set and the survivors.
    pub(crate) fn take_visible_listeners(
        &mut self,
        tree: &ContextTree,
        storage: StorageRef,
        ns: NamespaceId,
        key: &str,
    ) -> Vec<NsListener> {
        let Some(listeners) = self.pending.get_mut(&(ns, SmolStr::new(key))) else {
            return Vec::new();
        };
        let mut fired = Vec::new();
        let mut kept = Vec::new();
        for listener in listeners.drain(..) {
            if Self::visible(tree, storage, ns, &listener) {
                fired.push(listener);
            } else {
                kept.push(listener);
            }
        }
        *listeners = kept;
        fired
    }

    fn visible(
        tree: &ContextTree,
        storage: StorageRef,
        ns: NamespaceId,
        listener: &NsListener,
    ) -> bool {
        if let Some(exact) = listener.exact_storage {
            return storage == StorageRef::Ctx(exact);
        }
        match ns.behaviour() {
            NamespaceBehaviour::Global => storage == StorageRef::Global,
            NamespaceBehaviour::SourceLocal => {
                storage == StorageRef::Ctx(tree.root_of(listener.search_from))
            }
            NamespaceBehaviour::TreeScoped => match storage {
                StorageRef::Ctx(host) => tree.is_ancestor_or_self(host, listener.search_from),
                StorageRef::Global => false,
            },
            // Derived namespaces are read-through; nothing is ever added to
            // them, so no listener can be registered against them either.
            NamespaceBehaviour::Derived { .. } => false,
        }
    }
}
