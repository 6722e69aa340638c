use uuid::Uuid;

use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;
use crate::repositories::auth_accounts::CreateAccount;
use crate::repositories::profiles::CreateProfile;
use crate::services::user_admin::normalize_email;

const SUPERUSER_DISPLAY_NAME: &str = "Super Admin";

/// Makes sure the configured administrator can sign in with the configured password.
pub(crate) async fn ensure_superuser(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_superuser_password.is_empty() {
        tracing::warn!("FIRST_SUPERUSER_PASSWORD not configured; skipping superuser creation");
        return Ok(());
    }

    let email = normalize_email(&admin.first_superuser_email);
    let now = primitive_now_utc();
    let db = state.db();

    let Some(account) = repositories::auth_accounts::find_by_email(db, &email).await? else {
        let id = Uuid::new_v4().to_string();
        let hashed_password = security::hash_password(&admin.first_superuser_password)?;
        repositories::auth_accounts::create(
            db,
            CreateAccount { id: &id, email: &email, hashed_password, now },
        )
        .await?;
        repositories::profiles::create(
            db,
            CreateProfile {
                id: &id,
                email: &email,
                display_name: SUPERUSER_DISPLAY_NAME,
                role: UserRole::Admin,
                now,
            },
        )
        .await?;
        tracing::info!(email = %email, "Created default superuser");
        return Ok(());
    };

    let verified =
        security::verify_password(&admin.first_superuser_password, &account.hashed_password)
            .unwrap_or(false);
    if !verified {
        let hashed = security::hash_password(&admin.first_superuser_password)?;
        repositories::auth_accounts::update_password(db, &account.id, &hashed, now).await?;
        tracing::info!(email = %email, "Reset default superuser password");
    }

    match repositories::profiles::find_by_id(db, &account.id).await? {
        Some(profile) if profile.role == UserRole::Admin && profile.is_active => {
            tracing::info!("Default superuser already up to date");
        }
        Some(_) => {
            repositories::profiles::promote_to_admin(db, &account.id, now).await?;
            tracing::info!(email = %email, "Promoted default superuser to admin");
        }
        None => {
            repositories::profiles::create(
                db,
                CreateProfile {
                    id: &account.id,
                    email: &email,
                    display_name: SUPERUSER_DISPLAY_NAME,
                    role: UserRole::Admin,
                    now,
                },
            )
            .await?;
            tracing::warn!(email = %email, "Recreated missing profile for default superuser");
        }
    }

    Ok(())
}
