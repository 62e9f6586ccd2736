use std::sync::Arc;

use crate::error::{PatchError, RegistryError};
use crate::method::{CallHook, CallSite, MemberKind, Method};
use crate::registry::{Registry, TypeRef};
use crate::signature::Signature;

/// Run by an installed wrapper whenever a call matches its signature.
pub type SideEffect = Arc<dyn Fn() + Send + Sync>;

/// Replaces the member a [`Signature`] names with a wrapper that runs a
/// side effect and then delegates to the implementation it replaced.
///
/// Call [`instrument`](PatchStrategy::instrument) once per signature, after
/// checking [`Signature::exists`]. A second call would capture the first
/// wrapper as the original and fire the side effect twice per call.
pub trait PatchStrategy: Send + Sync {
    fn kind(&self) -> MemberKind;

    /// Swaps the member for `replace(current)` in the table this strategy
    /// patches, in one step. `Ok(false)` if the member is gone.
    fn install(
        &self,
        registry: &Registry,
        owner: &TypeRef,
        member: &str,
        replace: &dyn Fn(&Method) -> Method,
    ) -> Result<bool, RegistryError>;

    fn instrument(
        &self,
        registry: &Registry,
        signature: &Arc<Signature>,
        side_effect: SideEffect,
    ) -> Result<(), PatchError> {
        let unresolved = || PatchError::Unresolved {
            signature: signature.raw().to_owned(),
        };
        let owner = signature.resolve_type(registry).ok_or_else(unresolved)?;
        let member = signature.resolve_member().ok_or_else(unresolved)?;

        let guard = Arc::downgrade(signature);
        let hook: CallHook = Arc::new(move |site: &CallSite<'_>| {
            if guard.upgrade().is_some_and(|sig| sig.matches(site)) {
                side_effect();
            }
        });
        let wrap = |original: &Method| original.wrap(member, Arc::clone(&hook));
        if !self.install(registry, &owner, member, &wrap)? {
            return Err(unresolved());
        }
        Ok(())
    }
}

/// Patches the owner's instance-member table.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstancePatcher;

impl PatchStrategy for InstancePatcher {
    fn kind(&self) -> MemberKind {
        MemberKind::Instance
    }

    fn install(
        &self,
        registry: &Registry,
        owner: &TypeRef,
        member: &str,
        replace: &dyn Fn(&Method) -> Method,
    ) -> Result<bool, RegistryError> {
        registry.replace_method(owner, member, replace)
    }
}

/// Patches the owner's static-member table.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticPatcher;

impl PatchStrategy for StaticPatcher {
    fn kind(&self) -> MemberKind {
        MemberKind::Static
    }

    fn install(
        &self,
        registry: &Registry,
        owner: &TypeRef,
        member: &str,
        replace: &dyn Fn(&Method) -> Method,
    ) -> Result<bool, RegistryError> {
        registry.replace_static(owner, member, replace)
    }
}

pub fn strategy_for(kind: MemberKind) -> Box<dyn PatchStrategy> {
    match kind {
        MemberKind::Instance => Box::new(InstancePatcher),
        MemberKind::Static => Box::new(StaticPatcher),
    }
}
