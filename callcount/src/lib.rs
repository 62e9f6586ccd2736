//! Counting calls to one member, installed whenever it becomes available.
//!
//! A [`Session`] watches a [`Registry`] of classes and modules for the
//! member named by its [`Config`] (`Type#member` for an instance member,
//! `Type.member` for a static one). The member does not have to exist yet:
//! every time the registry changes the session checks again, and the first
//! time the member resolves its implementation is wrapped, exactly once, by
//! one that counts the call and then delegates to the original. When the
//! session ends it writes `<target> called <n> times`.
//!
//! ## Short Example
//! ```
//! use std::sync::Arc;
//! use callcount::*;
//!
//! let registry = Arc::new(Registry::new());
//! let session = Session::start(Arc::clone(&registry), &Config::new("Widget#render"));
//!
//! // Defined after the session started; still counted from here on.
//! let widget = registry.define_class("Widget", None)?;
//! registry.define_method(
//!     &widget,
//!     "render",
//!     Method::instance(|this: &Object, (): ()| format!("<{}>", this.state::<&str>().unwrap())),
//! )?;
//!
//! let a = Object::new(Arc::clone(&widget), "a");
//! let b = Object::new(Arc::clone(&widget), "b");
//! a.send::<(), String>("render", ())?;
//! b.send::<(), String>("render", ())?;
//! a.send::<(), String>("render", ())?;
//!
//! assert_eq!(session.finish()?, "Widget#render called 3 times");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Declaring Members
//! Members can also be declared next to the code that implements them with
//! [`#[method]`](macro@method), and installed later with [`Registry::define`]:
//! ```
//! use callcount::*;
//!
//! #[method("Widget.build")]
//! fn build(ty: &TypeDef, label: String) -> String {
//!     format!("{ty}:{label}")
//! }
//!
//! let registry = Registry::new();
//! let widget = registry.define_class("Widget", None)?;
//! registry.define(&build)?;
//! assert_eq!(widget.send::<(String,), String>("build", ("x".into(),))?, "Widget:x");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Counting Rules
//! - A call is counted before it is delegated, so calls that return `Err` or
//!   panic are counted too. Errors and panics reach the caller unchanged.
//! - Only calls whose receiver is exactly the named type are counted. An
//!   inherited instance member called on a subclass instance, or a static
//!   member called through a subclass, is not.
//! - Calls made before the member was wrapped are never counted.
//! - A target that never resolves (unknown type, missing member, no
//!   separator) is not an error: the report reads `... called 0 times`.
//! - The member is the text between the first and the second separator,
//!   but a call only counts when `Owner#member` or `Owner.member` equals the
//!   target exactly. A target with extra separators, such as `Widget.b.c`,
//!   is resolved and wrapped like `Widget.b` and still always reports
//!   `called 0 times`.
//! - An inherited member is wrapped on the named type itself. Calls on the
//!   type it was inherited from keep the original and are not counted.

mod config;
mod counter;
mod definition;
mod error;
mod method;
mod patch;
mod patcher;
mod registry;
mod session;
mod signature;

pub use callcount_macros::*;

pub use config::{Config, DEFAULT_TARGET, TARGET_ENV};
pub use counter::Counter;
pub use definition::Definition;
pub use error::{DispatchError, PatchError, RegistryError};
pub use method::{CallHook, CallSite, MemberKind, Method, Object};
pub use patch::{strategy_for, InstancePatcher, PatchStrategy, SideEffect, StaticPatcher};
pub use patcher::Patcher;
pub use registry::{
    LifecycleEvent, Registry, Subscription, TypeDef, TypeKind, TypeRef, NAMESPACE_SEPARATOR,
    OBJECT_CLASS,
};
pub use session::Session;
pub use signature::Signature;
