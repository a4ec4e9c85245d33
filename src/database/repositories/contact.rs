//! Emergency contact repository implementation
//!
//! Contact CRUD belongs to the excluded surface layer; the fan-out only
//! reads rosters, so this repository stays read-mostly.

use sqlx::PgPool;

use crate::models::contact::{Contact, CreateContactRequest};
use crate::utils::errors::TripGuardError;

#[derive(Debug, Clone)]
pub struct ContactRepository {
    pool: PgPool,
}

impl ContactRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, request: &CreateContactRequest) -> Result<Contact, TripGuardError> {
        let contact = sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts (user_id, name, channel, address, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, user_id, name, channel, address, created_at
            "#,
        )
        .bind(request.user_id)
        .bind(&request.name)
        .bind(request.channel.as_str())
        .bind(&request.address)
        .fetch_one(&self.pool)
        .await?;

        Ok(contact)
    }

    pub async fn delete(&self, id: i64) -> Result<(), TripGuardError> {
        sqlx::query("DELETE FROM contacts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Configured contacts for one user
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Contact>, TripGuardError> {
        let contacts = sqlx::query_as::<_, Contact>(
            "SELECT id, user_id, name, channel, address, created_at FROM contacts WHERE user_id = $1 ORDER BY id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(contacts)
    }

    /// Contacts for a set of users in one round trip, for group fan-out
    pub async fn list_for_users(&self, user_ids: &[i64]) -> Result<Vec<Contact>, TripGuardError> {
        let contacts = sqlx::query_as::<_, Contact>(
            "SELECT id, user_id, name, channel, address, created_at FROM contacts WHERE user_id = ANY($1) ORDER BY user_id ASC, id ASC",
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(contacts)
    }
}
