use serde::{Deserialize, Serialize};

/// The authenticated franchise owner.
///
/// Held in memory by the auth service only; it is not persisted, so after a
/// restart it stays empty until the next login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl User {
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_parses_without_phone() {
        let json = r#"{"id": 7, "name": "Grace Njeri", "email": "grace@example.com", "role": "owner"}"#;
        let user: User = serde_json::from_str(json).expect("Failed to parse user JSON");
        assert_eq!(user.id, 7);
        assert_eq!(user.phone, None);
        assert_eq!(user.display_name(), "Grace Njeri");
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let user = User {
            id: 1,
            name: "  ".to_string(),
            email: "owner@example.com".to_string(),
            role: "owner".to_string(),
            phone: Some("+254700000000".to_string()),
        };
        assert_eq!(user.display_name(), "owner@example.com");
    }
}
