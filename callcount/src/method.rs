use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use crate::error::DispatchError;
use crate::registry::{TypeDef, TypeRef};

/// Observer handed to [`Method::wrap`]. Sees the [`CallSite`] of every
/// call before it is delegated.
pub type CallHook = Arc<dyn Fn(&CallSite<'_>) + Send + Sync>;

type InstanceFn<A, R> = Arc<dyn Fn(&Object, A) -> R + Send + Sync>;
type StaticFn<A, R> = Arc<dyn Fn(&TypeDef, A) -> R + Send + Sync>;
type WrapFn = Arc<dyn Fn(&str, CallHook) -> Method + Send + Sync>;

/// Whether a member is called on a value or on the type itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Instance,
    Static,
}

impl MemberKind {
    /// Separator between owner and member in a rendered name.
    pub const fn separator(self) -> char {
        match self {
            Self::Instance => '#',
            Self::Static => '.',
        }
    }

    pub(crate) const fn describe(self) -> &'static str {
        match self {
            Self::Instance => "instance",
            Self::Static => "static",
        }
    }
}

/// Where a wrapped member was called: the receiver's type (the type itself
/// for static calls), the member kind and the member name.
///
/// Displays as `Owner#member` or `Owner.member`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite<'a> {
    pub owner: &'a str,
    pub kind: MemberKind,
    pub member: &'a str,
}

impl fmt::Display for CallSite<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.owner, self.kind.separator(), self.member)
    }
}

/// A type-erased callable reference stored in a member table.
///
/// Instance methods are `Fn(&Object, A) -> R` and static methods are
/// `Fn(&TypeDef, A) -> R`, where `A` is the argument tuple. Cloning is cheap
/// and yields a reference to the same implementation.
#[derive(Clone)]
pub struct Method {
    kind: MemberKind,
    sig: &'static str,
    imp: Arc<dyn Any + Send + Sync>,
    wrap: WrapFn,
}

impl Method {
    pub fn instance<A, R, F>(f: F) -> Self
    where
        A: 'static,
        R: 'static,
        F: Fn(&Object, A) -> R + Send + Sync + 'static,
    {
        from_instance_fn::<A, R>(Arc::new(f))
    }

    pub fn static_method<A, R, F>(f: F) -> Self
    where
        A: 'static,
        R: 'static,
        F: Fn(&TypeDef, A) -> R + Send + Sync + 'static,
    {
        from_static_fn::<A, R>(Arc::new(f))
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Rust signature the method was defined with, for diagnostics.
    pub fn signature(&self) -> &'static str {
        self.sig
    }

    /// Builds a replacement with the same signature that shows each call's
    /// [`CallSite`] to `hook` and then delegates to `self`.
    ///
    /// The receiver is passed through on every call, so the replacement can
    /// be shared by every type that inherits it. Return values, `Err`s and
    /// panics of the original reach the caller untouched.
    pub fn wrap(&self, member: &str, hook: CallHook) -> Method {
        (self.wrap)(member, hook)
    }

    pub(crate) fn call_instance<A: 'static, R: 'static>(
        &self,
        receiver: &Object,
        member: &str,
        args: A,
    ) -> Result<R, DispatchError> {
        let imp = self.imp.downcast_ref::<InstanceFn<A, R>>().ok_or_else(|| {
            self.mismatch(receiver.class().name(), member, type_name::<fn(&Object, A) -> R>())
        })?;
        Ok(imp(receiver, args))
    }

    pub(crate) fn call_static<A: 'static, R: 'static>(
        &self,
        receiver: &TypeDef,
        member: &str,
        args: A,
    ) -> Result<R, DispatchError> {
        let imp = self.imp.downcast_ref::<StaticFn<A, R>>().ok_or_else(|| {
            self.mismatch(receiver.name(), member, type_name::<fn(&TypeDef, A) -> R>())
        })?;
        Ok(imp(receiver, args))
    }

    fn mismatch(&self, receiver: &str, member: &str, found: &'static str) -> DispatchError {
        DispatchError::SignatureMismatch {
            receiver: receiver.to_owned(),
            sep: self.kind.separator(),
            member: member.to_owned(),
            expected: self.sig,
            found,
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("kind", &self.kind)
            .field("sig", &self.sig)
            .finish_non_exhaustive()
    }
}

// Kept free of the caller's closure type: a wrapper is built with the same
// instantiation as the method it wraps.
fn from_instance_fn<A: 'static, R: 'static>(imp: InstanceFn<A, R>) -> Method {
    let original = Arc::clone(&imp);
    Method {
        kind: MemberKind::Instance,
        sig: type_name::<fn(&Object, A) -> R>(),
        imp: Arc::new(imp),
        wrap: Arc::new(move |member: &str, hook: CallHook| {
            let original = Arc::clone(&original);
            let member = member.to_owned();
            let wrapped: InstanceFn<A, R> = Arc::new(move |this: &Object, args: A| {
                hook(&CallSite {
                    owner: this.class().name(),
                    kind: MemberKind::Instance,
                    member: &member,
                });
                original(this, args)
            });
            from_instance_fn(wrapped)
        }),
    }
}

fn from_static_fn<A: 'static, R: 'static>(imp: StaticFn<A, R>) -> Method {
    let original = Arc::clone(&imp);
    Method {
        kind: MemberKind::Static,
        sig: type_name::<fn(&TypeDef, A) -> R>(),
        imp: Arc::new(imp),
        wrap: Arc::new(move |member: &str, hook: CallHook| {
            let original = Arc::clone(&original);
            let member = member.to_owned();
            let wrapped: StaticFn<A, R> = Arc::new(move |ty: &TypeDef, args: A| {
                hook(&CallSite {
                    owner: ty.name(),
                    kind: MemberKind::Static,
                    member: &member,
                });
                original(ty, args)
            });
            from_static_fn(wrapped)
        }),
    }
}

/// A value whose type lives in a [`Registry`](crate::Registry).
///
/// Instance members are looked up on [`class`](Object::class) at every
/// call, so members defined or replaced after the object was created are
/// picked up.
pub struct Object {
    class: TypeRef,
    state: Box<dyn Any + Send + Sync>,
}

impl Object {
    pub fn new<T: Any + Send + Sync>(class: TypeRef, state: T) -> Self {
        Self {
            class,
            state: Box::new(state),
        }
    }

    pub fn class(&self) -> &TypeRef {
        &self.class
    }

    pub fn state<T: Any>(&self) -> Option<&T> {
        self.state.downcast_ref()
    }

    /// Calls instance member `member` with the argument tuple `args`.
    pub fn send<A: 'static, R: 'static>(&self, member: &str, args: A) -> Result<R, DispatchError> {
        let method =
            self.class
                .find_instance_method(member)
                .ok_or_else(|| DispatchError::NoMethod {
                    receiver: format!("an instance of {}", self.class.name()),
                    member: member.to_owned(),
                })?;
        method.call_instance(self, member, args)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class.name())
            .finish_non_exhaustive()
    }
}
