use serde::Serialize;
use std::time::SystemTime;

/// A row of the `user` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: usize,
    pub handle: String,
    pub is_staff: bool,
    pub created: SystemTime,
}
