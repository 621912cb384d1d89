use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;
use shared_models::auth::{UserProfile, UserRole};
use shared_models::contact::Contact;

use crate::models::AppointmentError;

/// Read-only access to user profiles.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, AppointmentError>;

    async fn find_with_role(
        &self,
        id: Uuid,
        role: UserRole,
    ) -> Result<Option<UserProfile>, AppointmentError> {
        Ok(self.find_by_id(id).await?.filter(|p| p.role == role))
    }
}

#[derive(Default)]
pub struct InMemoryUserDirectory {
    profiles: RwLock<HashMap<Uuid, UserProfile>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, profile: UserProfile) {
        self.profiles.write().await.insert(profile.id, profile);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, AppointmentError> {
        Ok(self.profiles.read().await.get(&id).cloned())
    }
}

/// Profiles from the PostgREST `profiles` table.
pub struct SupabaseUserDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseUserDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn fetch_one(&self, path: &str) -> Result<Option<UserProfile>, AppointmentError> {
        let rows: Vec<Value> = self.supabase.request(Method::GET, path, None, None).await?;
        rows.into_iter().next().map(profile_from_row).transpose()
    }
}

/// A row whose contact is neither an email nor a phone number is reported
/// as such rather than as a generic decode failure.
fn profile_from_row(row: Value) -> Result<UserProfile, AppointmentError> {
    let contact_error = row
        .get("contact")
        .and_then(Value::as_str)
        .and_then(|raw| Contact::parse(raw).err());

    match (serde_json::from_value::<UserProfile>(row.clone()), contact_error) {
        (Ok(profile), _) => Ok(profile),
        (Err(_), Some(invalid)) => {
            let user_id = row
                .get("id")
                .and_then(Value::as_str)
                .and_then(|id| Uuid::parse_str(id).ok())
                .unwrap_or_default();
            warn!("Profile {} has an unusable contact", user_id);
            Err(AppointmentError::UnusableContact {
                user_id,
                reason: invalid.to_string(),
            })
        }
        (Err(e), None) => Err(AppointmentError::Database(format!("Malformed profile row: {}", e))),
    }
}

#[async_trait]
impl UserDirectory for SupabaseUserDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, AppointmentError> {
        let path = format!("/rest/v1/profiles?id=eq.{}&limit=1", id);
        debug!("Fetching profile {}", id);

        self.fetch_one(&path).await
    }

    async fn find_with_role(
        &self,
        id: Uuid,
        role: UserRole,
    ) -> Result<Option<UserProfile>, AppointmentError> {
        let path = format!("/rest/v1/profiles?id=eq.{}&role=eq.{}&limit=1", id, role);
        debug!("Fetching {} profile {}", role, id);

        self.fetch_one(&path).await
    }
}
