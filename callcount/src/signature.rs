use std::fmt;

use once_cell::sync::OnceCell;

use crate::method::{CallSite, MemberKind, Method};
use crate::registry::{Registry, TypeRef, NAMESPACE_SEPARATOR};

fn is_member_separator(c: char) -> bool {
    c == '#' || c == '.'
}

/// A textual reference to one member of one type, such as `Widget#render`
/// (instance member) or `Ui::Widget.build` (static member).
///
/// Parsing never fails. A target that cannot name anything simply never
/// [`exists`](Signature::exists).
///
/// The resolved type is remembered after the first successful resolution,
/// so a signature should only be resolved against one registry. Failed
/// resolutions are not remembered and are retried on every call.
#[derive(Debug)]
pub struct Signature {
    raw: String,
    type_path: Vec<String>,
    member: Option<String>,
    kind: MemberKind,
    resolved: OnceCell<TypeRef>,
}

impl Signature {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let kind = if raw.contains('#') {
            MemberKind::Instance
        } else {
            MemberKind::Static
        };
        let mut pieces = raw.split(is_member_separator);
        let type_path = pieces
            .next()
            .unwrap_or_default()
            .split(NAMESPACE_SEPARATOR)
            .map(str::to_owned)
            .collect();
        let member = pieces
            .next()
            .filter(|member| !member.is_empty())
            .map(str::to_owned);
        Self {
            raw,
            type_path,
            member,
            kind,
            resolved: OnceCell::new(),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn type_path(&self) -> &[String] {
        &self.type_path
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Walks the type path from the root namespace. Only classes resolve.
    pub fn resolve_type(&self, registry: &Registry) -> Option<TypeRef> {
        if let Some(ty) = self.resolved.get() {
            return Some(ty.clone());
        }
        let ty = registry.resolve_path(&self.type_path)?;
        if !ty.is_class() {
            return None;
        }
        Some(self.resolved.get_or_init(|| ty).clone())
    }

    pub fn resolve_member(&self) -> Option<&str> {
        self.member.as_deref()
    }

    /// The type resolves and has the member in the table matching
    /// [`kind`](Signature::kind), inherited members included.
    pub fn exists(&self, registry: &Registry) -> bool {
        let (Some(ty), Some(member)) = (self.resolve_type(registry), self.resolve_member()) else {
            return false;
        };
        match self.kind {
            MemberKind::Instance => ty.has_instance_method(member),
            MemberKind::Static => ty.has_static_method(member),
        }
    }

    /// The member's implementation as it is right now.
    pub fn current_implementation(&self, registry: &Registry) -> Option<Method> {
        let ty = self.resolve_type(registry)?;
        let member = self.resolve_member()?;
        match self.kind {
            MemberKind::Instance => ty.find_instance_method(member),
            MemberKind::Static => ty.find_static_method(member),
        }
    }

    /// Whether `site` renders exactly as this signature's raw text. A raw
    /// target with extra separators (`A.b.c`) therefore never matches.
    pub fn matches(&self, site: &CallSite<'_>) -> bool {
        self.raw
            .strip_prefix(site.owner)
            .and_then(|rest| rest.strip_prefix(site.kind.separator()))
            .is_some_and(|member| member == site.member)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
