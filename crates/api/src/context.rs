use tallyerp_core::UserId;

/// Authenticated caller for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
    name: Option<String>,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, name: Option<String>) -> Self {
        Self { user_id, name }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}
