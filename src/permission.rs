/// What a caller is about to do with the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessScope {
    Read,
    Modify,
}

/// Platform permission check. Granting or prompting happens outside the engine.
pub trait PermissionGate: Send + Sync {
    fn is_granted(&self, scope: AccessScope) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl PermissionGate for AllowAll {
    fn is_granted(&self, _scope: AccessScope) -> bool {
        true
    }
}
