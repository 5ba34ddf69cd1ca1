//! User DTOs

use serde::{Deserialize, Serialize};

/// Request to register a pipeline owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUser {
    pub email: String,
}

/// Request to change a user's email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUser {
    pub email: String,
}
