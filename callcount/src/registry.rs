//! The explicit type system members are defined in and looked up from.
//!
//! Types live in nested namespaces below a root namespace. Every mutation
//! goes through [`Registry`], which tells its listeners about it with a
//! [`LifecycleEvent`] once the change is visible.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::definition::Definition;
use crate::error::{DispatchError, RegistryError};
use crate::method::{MemberKind, Method};

pub type TypeRef = Arc<TypeDef>;

/// Namespace separator inside a type path.
pub const NAMESPACE_SEPARATOR: &str = "::";

/// Name of the class every other class descends from.
pub const OBJECT_CLASS: &str = "Object";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Class,
    Module,
}

impl TypeKind {
    const fn describe(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Module => "module",
        }
    }
}

/// Something that changed in a [`Registry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    TypeDefined { name: String, kind: TypeKind },
    MethodAdded { owner: String, member: String },
    StaticMethodAdded { owner: String, member: String },
    ModuleIncluded { module: String, into: String },
    ModuleExtended { module: String, into: String },
}

type Listener = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Handle returned by [`Registry::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

/// A class or module.
pub struct TypeDef {
    name: String,
    kind: TypeKind,
    parent: Option<TypeRef>,
    methods: RwLock<HashMap<String, Method>>,
    statics: RwLock<HashMap<String, Method>>,
    constants: RwLock<HashMap<String, TypeRef>>,
    includes: RwLock<Vec<TypeRef>>,
    extends: RwLock<Vec<TypeRef>>,
}

impl TypeDef {
    fn new(name: String, kind: TypeKind, parent: Option<TypeRef>) -> Self {
        Self {
            name,
            kind,
            parent,
            methods: RwLock::default(),
            statics: RwLock::default(),
            constants: RwLock::default(),
            includes: RwLock::default(),
            extends: RwLock::default(),
        }
    }

    /// Fully qualified name, segments joined by `::`. Empty for the root
    /// namespace.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_class(&self) -> bool {
        self.kind == TypeKind::Class
    }

    pub fn parent(&self) -> Option<&TypeRef> {
        self.parent.as_ref()
    }

    /// Nested type named `name`.
    pub fn constant(&self, name: &str) -> Option<TypeRef> {
        self.constants.read().get(name).cloned()
    }

    /// Current implementation of instance member `name`: own table first,
    /// then included modules (latest first), then the parent chain.
    pub fn find_instance_method(&self, name: &str) -> Option<Method> {
        let own = self.methods.read().get(name).cloned();
        own.or_else(|| self.inherited_instance_method(name))
    }

    /// Current implementation of static member `name`: own table first,
    /// then the static tables of extending modules (latest first), then the
    /// parent chain.
    pub fn find_static_method(&self, name: &str) -> Option<Method> {
        let own = self.statics.read().get(name).cloned();
        own.or_else(|| self.inherited_static_method(name))
    }

    pub fn has_instance_method(&self, name: &str) -> bool {
        self.find_instance_method(name).is_some()
    }

    pub fn has_static_method(&self, name: &str) -> bool {
        self.find_static_method(name).is_some()
    }

    /// Calls static member `member` with this type as receiver.
    pub fn send<A: 'static, R: 'static>(&self, member: &str, args: A) -> Result<R, DispatchError> {
        let method = self
            .find_static_method(member)
            .ok_or_else(|| DispatchError::NoMethod {
                receiver: self.name.clone(),
                member: member.to_owned(),
            })?;
        method.call_static(self, member, args)
    }

    fn find_own_or_mixed(&self, name: &str) -> Option<Method> {
        let own = self.methods.read().get(name).cloned();
        own.or_else(|| self.find_mixed(name))
    }

    fn find_mixed(&self, name: &str) -> Option<Method> {
        let includes = self.includes.read().clone();
        includes
            .iter()
            .rev()
            .find_map(|module| module.find_own_or_mixed(name))
    }

    // Neither of these reads this type's own tables, so both may run while
    // one of them is write-locked.
    fn inherited_instance_method(&self, name: &str) -> Option<Method> {
        self.find_mixed(name)
            .or_else(|| self.parent.as_ref()?.find_instance_method(name))
    }

    fn inherited_static_method(&self, name: &str) -> Option<Method> {
        let extends = self.extends.read().clone();
        extends
            .iter()
            .rev()
            .find_map(|module| module.statics.read().get(name).cloned())
            .or_else(|| self.parent.as_ref()?.find_static_method(name))
    }

    fn table(&self, kind: MemberKind) -> &RwLock<HashMap<String, Method>> {
        match kind {
            MemberKind::Instance => &self.methods,
            MemberKind::Static => &self.statics,
        }
    }

    fn mixes_in(&self, other: &TypeDef) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        let includes = self.includes.read().clone();
        includes.iter().any(|module| module.mixes_in(other))
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .finish_non_exhaustive()
    }
}

impl fmt::Display for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Owner of the root namespace and of the lifecycle listeners.
pub struct Registry {
    root: TypeRef,
    object: TypeRef,
    listeners: RwLock<Vec<(Subscription, Listener)>>,
    next_subscription: AtomicU64,
}

impl Registry {
    /// A registry holding only the built-in `Object` class, whose static
    /// member `name` returns the receiver's qualified name.
    pub fn new() -> Self {
        let root = Arc::new(TypeDef::new(String::new(), TypeKind::Module, None));
        let object = Arc::new(TypeDef::new(OBJECT_CLASS.to_owned(), TypeKind::Class, None));
        object.statics.write().insert(
            "name".to_owned(),
            Method::static_method(|ty: &TypeDef, (): ()| ty.name().to_owned()),
        );
        root.constants
            .write()
            .insert(OBJECT_CLASS.to_owned(), Arc::clone(&object));
        Self {
            root,
            object,
            listeners: RwLock::default(),
            next_subscription: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &TypeRef {
        &self.root
    }

    pub fn object_class(&self) -> &TypeRef {
        &self.object
    }

    /// Registers `listener` for every future [`LifecycleEvent`]. Listeners
    /// are called with no registry lock held and may mutate the registry.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        let id = Subscription(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns whether it was still registered.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != subscription);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Looks up `A::B::C` starting from the root namespace.
    pub fn lookup(&self, path: &str) -> Option<TypeRef> {
        let segments: Vec<&str> = path.split(NAMESPACE_SEPARATOR).collect();
        self.resolve_path(&segments)
    }

    /// Walks `segments` from the root namespace, one nested constant at a
    /// time. `None` as soon as one is missing.
    pub fn resolve_path<S: AsRef<str>>(&self, segments: &[S]) -> Option<TypeRef> {
        if segments.is_empty() {
            return None;
        }
        segments
            .iter()
            .try_fold(Arc::clone(&self.root), |scope, segment| {
                scope.constant(segment.as_ref())
            })
    }

    /// Defines class `path`, or reopens it if it already exists. A class
    /// without an explicit parent descends from `Object`.
    pub fn define_class(
        &self,
        path: &str,
        parent: Option<&TypeRef>,
    ) -> Result<TypeRef, RegistryError> {
        if let Some(parent) = parent {
            if !parent.is_class() {
                return Err(RegistryError::ParentNotAClass {
                    path: path.to_owned(),
                    parent: parent.name().to_owned(),
                });
            }
        }
        let parent = parent.unwrap_or(&self.object);
        self.define_type(path, TypeKind::Class, Some(parent))
    }

    /// Defines module `path`, or reopens it if it already exists.
    pub fn define_module(&self, path: &str) -> Result<TypeRef, RegistryError> {
        self.define_type(path, TypeKind::Module, None)
    }

    fn define_type(
        &self,
        path: &str,
        kind: TypeKind,
        parent: Option<&TypeRef>,
    ) -> Result<TypeRef, RegistryError> {
        let segments: Vec<&str> = path.split(NAMESPACE_SEPARATOR).collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(RegistryError::EmptyName {
                path: path.to_owned(),
            });
        }
        let (last, outer) = segments
            .split_last()
            .ok_or_else(|| RegistryError::EmptyName {
                path: path.to_owned(),
            })?;
        let scope = if outer.is_empty() {
            Arc::clone(&self.root)
        } else {
            self.resolve_path(outer)
                .ok_or_else(|| RegistryError::UndefinedNamespace {
                    path: path.to_owned(),
                    namespace: outer.join(NAMESPACE_SEPARATOR),
                })?
        };

        let defined = {
            let mut constants = scope.constants.write();
            if let Some(existing) = constants.get(*last) {
                if existing.kind != kind {
                    return Err(RegistryError::KindConflict {
                        path: path.to_owned(),
                        expected: kind.describe(),
                        found: existing.kind.describe(),
                    });
                }
                return Ok(Arc::clone(existing));
            }
            let ty = Arc::new(TypeDef::new(path.to_owned(), kind, parent.cloned()));
            constants.insert((*last).to_owned(), Arc::clone(&ty));
            ty
        };

        self.notify(LifecycleEvent::TypeDefined {
            name: defined.name.clone(),
            kind,
        });
        Ok(defined)
    }

    /// Defines or replaces instance member `name` on `owner`.
    pub fn define_method(
        &self,
        owner: &TypeRef,
        name: &str,
        method: Method,
    ) -> Result<(), RegistryError> {
        check_member(name, &method, MemberKind::Instance)?;
        owner.methods.write().insert(name.to_owned(), method);
        self.notify(LifecycleEvent::MethodAdded {
            owner: owner.name.clone(),
            member: name.to_owned(),
        });
        Ok(())
    }

    /// Defines or replaces static member `name` on `owner`.
    pub fn define_static(
        &self,
        owner: &TypeRef,
        name: &str,
        method: Method,
    ) -> Result<(), RegistryError> {
        check_member(name, &method, MemberKind::Static)?;
        owner.statics.write().insert(name.to_owned(), method);
        self.notify(LifecycleEvent::StaticMethodAdded {
            owner: owner.name.clone(),
            member: name.to_owned(),
        });
        Ok(())
    }

    /// Replaces instance member `name` of `owner` with `replace(current)`,
    /// where `current` is what instances of `owner` resolve right now, own
    /// or inherited. `Ok(false)` if there is nothing to replace.
    ///
    /// The lookup and the insert happen under one write lock of `owner`'s
    /// table, so a concurrent [`define_method`](Registry::define_method) on
    /// `owner` lands either before (and is replaced) or after (and wins).
    pub fn replace_method(
        &self,
        owner: &TypeRef,
        name: &str,
        replace: &dyn Fn(&Method) -> Method,
    ) -> Result<bool, RegistryError> {
        if !self.replace_member(owner, MemberKind::Instance, name, replace)? {
            return Ok(false);
        }
        self.notify(LifecycleEvent::MethodAdded {
            owner: owner.name.clone(),
            member: name.to_owned(),
        });
        Ok(true)
    }

    /// Static counterpart of [`replace_method`](Registry::replace_method).
    pub fn replace_static(
        &self,
        owner: &TypeRef,
        name: &str,
        replace: &dyn Fn(&Method) -> Method,
    ) -> Result<bool, RegistryError> {
        if !self.replace_member(owner, MemberKind::Static, name, replace)? {
            return Ok(false);
        }
        self.notify(LifecycleEvent::StaticMethodAdded {
            owner: owner.name.clone(),
            member: name.to_owned(),
        });
        Ok(true)
    }

    fn replace_member(
        &self,
        owner: &TypeRef,
        kind: MemberKind,
        name: &str,
        replace: &dyn Fn(&Method) -> Method,
    ) -> Result<bool, RegistryError> {
        let mut table = owner.table(kind).write();
        let current = match table.get(name) {
            Some(own) => Some(own.clone()),
            None => match kind {
                MemberKind::Instance => owner.inherited_instance_method(name),
                MemberKind::Static => owner.inherited_static_method(name),
            },
        };
        let Some(current) = current else {
            return Ok(false);
        };
        let replacement = replace(&current);
        check_member(name, &replacement, kind)?;
        table.insert(name.to_owned(), replacement);
        Ok(true)
    }

    /// Makes the instance members of `module` available on instances of
    /// `target`. Including a module twice has no further effect.
    pub fn include(&self, target: &TypeRef, module: &TypeRef) -> Result<(), RegistryError> {
        check_module(module)?;
        if module.mixes_in(target) {
            return Err(RegistryError::CyclicInclude {
                module: module.name.clone(),
                into: target.name.clone(),
            });
        }
        if !push_unique(&target.includes, module) {
            return Ok(());
        }
        self.notify(LifecycleEvent::ModuleIncluded {
            module: module.name.clone(),
            into: target.name.clone(),
        });
        Ok(())
    }

    /// Makes the static members of `module` available as static members of
    /// `target`, called with `target` as receiver. Extending with a module
    /// twice has no further effect.
    pub fn extend(&self, target: &TypeRef, module: &TypeRef) -> Result<(), RegistryError> {
        check_module(module)?;
        if !push_unique(&target.extends, module) {
            return Ok(());
        }
        self.notify(LifecycleEvent::ModuleExtended {
            module: module.name.clone(),
            into: target.name.clone(),
        });
        Ok(())
    }

    /// Installs a member declared with `#[method]` on its owner, which must
    /// already be defined.
    pub fn define(&self, definition: &Definition) -> Result<TypeRef, RegistryError> {
        let owner = self
            .lookup(definition.owner)
            .ok_or_else(|| RegistryError::UndefinedOwner {
                target: definition.target.to_owned(),
                owner: definition.owner.to_owned(),
            })?;
        let method = (definition.build)();
        match definition.kind {
            MemberKind::Instance => self.define_method(&owner, definition.member, method)?,
            MemberKind::Static => self.define_static(&owner, definition.member, method)?,
        }
        Ok(owner)
    }

    fn notify(&self, event: LifecycleEvent) {
        trace!(?event, "lifecycle event");
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in &listeners {
            listener(&event);
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.root.constants.read().len())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

fn check_member(name: &str, method: &Method, expected: MemberKind) -> Result<(), RegistryError> {
    if name.is_empty() {
        return Err(RegistryError::EmptyName {
            path: name.to_owned(),
        });
    }
    if method.kind() != expected {
        return Err(RegistryError::MethodKindMismatch {
            member: name.to_owned(),
            expected: expected.describe(),
            found: method.kind().describe(),
        });
    }
    Ok(())
}

fn check_module(module: &TypeRef) -> Result<(), RegistryError> {
    if module.kind != TypeKind::Module {
        return Err(RegistryError::NotAModule {
            path: module.name.clone(),
        });
    }
    Ok(())
}

fn push_unique(list: &RwLock<Vec<TypeRef>>, module: &TypeRef) -> bool {
    let mut list = list.write();
    if list.iter().any(|m| Arc::ptr_eq(m, module)) {
        return false;
    }
    list.push(Arc::clone(module));
    true
}
