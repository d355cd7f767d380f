//! OpenAPI/Utoipa configuration.

use crate::api::{health::MISC_TAG, sso::SSO_TAG};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

/// Security addon for OpenAPI documentation.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    #[tracing::instrument(skip(self, openapi))]
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let bearer = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .description(Some(
                    "Opaque access token obtained from `/api/v1/sso/codes/verify` or `/api/v1/sso/tokens/refresh`.",
                ))
                .build();
            components.add_security_scheme("Authorization", SecurityScheme::Http(bearer));
        }
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "SSO Authorization API",
        version = "1.0.0",
        description = "Context-bound authorization codes and the access/refresh tokens they are exchanged for."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = SSO_TAG, description = "Authorization code and token endpoints")
    )
)]
pub struct ApiDoc;
