use serde::Deserialize;

/// Request body for user registration. Absent fields deserialize to empty
/// strings and are reported as "must be provided" by validation.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterUserRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for account activation.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivateUserRequest {
    #[serde(default)]
    pub token: String,
}
