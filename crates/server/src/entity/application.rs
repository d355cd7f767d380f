//! Application entity - an SSO client that requests authorization codes.

use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "applications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub uuid: Uuid,
    pub name: String,
    pub description: String,
    /// Public identifier handed to the client. Immutable after creation.
    #[sea_orm(unique)]
    pub application_id: String,
    #[serde(skip_serializing, default)]
    pub application_secret: String,
    /// JSON array of allowed redirect URIs
    pub redirect_uris: String,
    /// JSON array of allowed CORS origins
    pub allowed_origins: String,
    pub logo_url: Option<String>,
    pub homepage_url: Option<String>,
    pub privacy_policy_url: Option<String>,
    pub terms_of_service_url: Option<String>,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::authorization_code::Entity")]
    AuthorizationCodes,
}

impl Related<super::authorization_code::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AuthorizationCodes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Parse redirect URIs from JSON string
    pub fn redirect_uris_list(&self) -> Vec<String> {
        serde_json::from_str(&self.redirect_uris).unwrap_or_default()
    }

    /// Parse allowed origins from JSON string
    pub fn allowed_origins_list(&self) -> Vec<String> {
        serde_json::from_str(&self.allowed_origins).unwrap_or_default()
    }

    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris_list().iter().any(|allowed| allowed == uri)
    }

    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins_list()
            .iter()
            .any(|allowed| allowed == origin)
    }
}

/// Fields a caller supplies when registering an application.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewApplication {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub application_id: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub homepage_url: Option<String>,
    #[serde(default)]
    pub privacy_policy_url: Option<String>,
    #[serde(default)]
    pub terms_of_service_url: Option<String>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
}

/// Build a new, active application row. The secret is generated by the caller.
pub fn new_active_model(
    new: &NewApplication,
    application_secret: String,
    now: OffsetDateTime,
) -> ActiveModel {
    ActiveModel {
        uuid: Set(Uuid::now_v7()),
        name: Set(new.name.clone()),
        description: Set(new.description.clone()),
        application_id: Set(new.application_id.clone()),
        application_secret: Set(application_secret),
        redirect_uris: Set(serde_json::Value::from(new.redirect_uris.clone()).to_string()),
        allowed_origins: Set(serde_json::Value::from(new.allowed_origins.clone()).to_string()),
        logo_url: Set(new.logo_url.clone()),
        homepage_url: Set(new.homepage_url.clone()),
        privacy_policy_url: Set(new.privacy_policy_url.clone()),
        terms_of_service_url: Set(new.terms_of_service_url.clone()),
        is_active: Set(true),
        created_by: Set(new.created_by),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn model(redirects: &str, origins: &str) -> Model {
        Model {
            uuid: Uuid::nil(),
            name: "Portal".into(),
            description: String::new(),
            application_id: "portal".into(),
            application_secret: "s3cret".into(),
            redirect_uris: redirects.into(),
            allowed_origins: origins.into(),
            logo_url: None,
            homepage_url: None,
            privacy_policy_url: None,
            terms_of_service_url: None,
            is_active: true,
            created_by: None,
            created_at: datetime!(2025-01-01 0:00 UTC),
            updated_at: datetime!(2025-01-01 0:00 UTC),
        }
    }

    #[test]
    fn redirect_uris_are_matched_exactly() {
        let app = model(
            r#"["https://portal.example.com/cb","https://portal.example.com/cb2"]"#,
            "[]",
        );
        assert!(app.is_redirect_uri_allowed("https://portal.example.com/cb2"));
        assert!(!app.is_redirect_uri_allowed("https://portal.example.com/cb/"));
        assert_eq!(app.redirect_uris_list().len(), 2);
    }

    #[test]
    fn malformed_allow_list_allows_nothing() {
        let app = model("not json", r#"["https://portal.example.com"]"#);
        assert!(app.redirect_uris_list().is_empty());
        assert!(app.is_origin_allowed("https://portal.example.com"));
        assert!(!app.is_origin_allowed("https://evil.example.com"));
    }

    #[test]
    fn secret_is_never_serialized() {
        let app = model("[]", "[]");
        let json = serde_json::to_string(&app).expect("serialize");
        assert!(!json.contains("s3cret"));
        assert!(json.contains("\"application_id\":\"portal\""));
    }
}
