use crate::method::{MemberKind, Method};

/// Created by [`#[method]`](macro@crate::method). Describes one member to be
/// installed with [`Registry::define`](crate::Registry::define).
#[derive(Debug, Clone, Copy)]
pub struct Definition {
    /// The full target as written, `Owner#member` or `Owner.member`.
    pub target: &'static str,
    pub owner: &'static str,
    pub member: &'static str,
    pub kind: MemberKind,
    pub build: fn() -> Method,
}

impl Definition {
    #[doc(hidden)]
    pub const fn __new(
        target: &'static str,
        owner: &'static str,
        member: &'static str,
        kind: MemberKind,
        build: fn() -> Method,
    ) -> Self {
        Self {
            target,
            owner,
            member,
            kind,
            build,
        }
    }
}
