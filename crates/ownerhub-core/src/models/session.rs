//! Login and token refresh payloads.

use serde::{Deserialize, Serialize};

use super::{Franchise, User};

/// Body of the login request. The identifier may be a username or an email;
/// the server reads it from the `email` field either way.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    #[serde(rename = "email")]
    pub identifier: &'a str,
    pub password: &'a str,
}

/// Payload of a successful login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(alias = "accessToken")]
    pub access_token: String,
    #[serde(alias = "refreshToken")]
    pub refresh_token: String,
    pub user: User,
    #[serde(default)]
    pub franchises: Vec<Franchise>,
}

/// Body of the refresh and logout requests.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Payload of a token refresh. Both `access_token` and `accessToken` are
/// accepted; the snake_case spelling wins when both are present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default, rename = "accessToken")]
    access_token_camel: Option<String>,
}

impl TokenResponse {
    pub fn token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .or(self.access_token_camel.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

/// What a caller gets back from a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct LoginSummary {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_accepts_both_spellings() {
        let snake: TokenResponse = serde_json::from_str(r#"{"access_token": "abc"}"#).unwrap();
        assert_eq!(snake.token(), Some("abc"));

        let camel: TokenResponse = serde_json::from_str(r#"{"accessToken": "xyz"}"#).unwrap();
        assert_eq!(camel.token(), Some("xyz"));

        let both: TokenResponse =
            serde_json::from_str(r#"{"access_token": "abc", "accessToken": "xyz"}"#).unwrap();
        assert_eq!(both.token(), Some("abc"));
    }

    #[test]
    fn test_token_response_without_token() {
        let empty: TokenResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.token(), None);

        let blank: TokenResponse = serde_json::from_str(r#"{"access_token": " "}"#).unwrap();
        assert_eq!(blank.token(), None);
    }

    #[test]
    fn test_login_request_serializes_identifier_as_email() {
        let req = LoginRequest {
            identifier: "owner01",
            password: "secret",
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["email"], "owner01");
        assert_eq!(json["password"], "secret");
    }

    #[test]
    fn test_parse_login_response() {
        let json = r#"{
            "access_token": "a1",
            "refresh_token": "r1",
            "user": {"id": 12, "name": "Peter Otieno", "email": "peter@example.com", "role": "owner", "phone": null},
            "franchises": [
                {"id": 1, "name": "Kampala Road", "branch_count": 3},
                {"id": 2, "name": "Mombasa", "branch_count": 1}
            ]
        }"#;
        let resp: LoginResponse = serde_json::from_str(json).expect("Failed to parse login JSON");
        assert_eq!(resp.access_token, "a1");
        assert_eq!(resp.user.name, "Peter Otieno");
        assert_eq!(resp.franchises.len(), 2);
        assert_eq!(resp.franchises[0].branch_count, 3);
    }
}
