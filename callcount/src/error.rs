use thiserror::Error;

/// Failures while changing the shape of a [`Registry`](crate::Registry).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("cannot define {path}: namespace {namespace} is not defined")]
    UndefinedNamespace { path: String, namespace: String },
    #[error("cannot define {path}: the name is empty")]
    EmptyName { path: String },
    #[error("{path} is already defined as a {found}, not a {expected}")]
    KindConflict {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("{path} is not a module and cannot be mixed in")]
    NotAModule { path: String },
    #[error("cannot include {module} into {into}: cyclic include")]
    CyclicInclude { module: String, into: String },
    #[error("parent of {path} must be a class, but {parent} is a module")]
    ParentNotAClass { path: String, parent: String },
    #[error("{member} is a {found} method and cannot be defined as a {expected} method")]
    MethodKindMismatch {
        member: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("cannot define {target}: owner {owner} is not defined")]
    UndefinedOwner { target: String, owner: String },
}

/// Failures while calling a member by name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("undefined method `{member}` for {receiver}")]
    NoMethod { receiver: String, member: String },
    #[error("{receiver}{sep}{member} has signature {expected}, called as {found}")]
    SignatureMismatch {
        receiver: String,
        sep: char,
        member: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Failures while installing a counting wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("{signature} does not resolve to a member yet")]
    Unresolved { signature: String },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
