//! Startup seeding of configured roles and applications.

use crate::entity::application::NewApplication;
use crate::entity::role::NewRole;
use crate::error::SsoResult;
use crate::service::SsoService;
use crate::store::RegisteredApplication;

/// Create every configured role that does not exist yet. Returns how many
/// were created.
#[tracing::instrument(skip_all, fields(configured = roles.len()))]
pub async fn seed_roles(service: &SsoService, roles: &[NewRole]) -> SsoResult<usize> {
    let mut created = 0;
    for new in roles {
        let (role, was_created) = service.ensure_role(new).await?;
        if was_created {
            created += 1;
            tracing::info!(role = %role.name, "Created role from configuration");
        } else {
            tracing::debug!(role = %role.name, "Role already present");
        }
    }
    Ok(created)
}

/// Create every configured application that does not exist yet.
///
/// Existing rows are left as they are, so running this on every start is
/// safe. Returns the applications created by this call together with their
/// plain secrets, which are not kept anywhere else.
#[tracing::instrument(skip_all, fields(configured = applications.len()))]
pub async fn seed_applications(
    service: &SsoService,
    applications: &[NewApplication],
) -> SsoResult<Vec<RegisteredApplication>> {
    let now = service.clock().now();
    let mut created = Vec::new();
    for new in applications {
        let (application, secret) = service
            .directory()
            .ensure_application(new, service.generator().as_ref(), now)
            .await?;
        match secret {
            Some(application_secret) => {
                tracing::info!(application_id = %application.application_id, "Created application from configuration");
                created.push(RegisteredApplication {
                    application,
                    application_secret,
                });
            }
            None => {
                tracing::debug!(application_id = %application.application_id, "Application already present");
            }
        }
    }
    Ok(created)
}
