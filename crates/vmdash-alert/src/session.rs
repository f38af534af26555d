/// The authenticated caller of a lifecycle operation.
///
/// Built by the HTTP layer from a verified bearer token and passed
/// explicitly into every user-invoked operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email,
        }
    }
}
