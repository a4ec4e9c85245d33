//! Database service layer
//!
//! Bundles the repositories behind one handle. The pool itself is kept so
//! services that need cross-repository transactions (the quorum voter) can
//! open one.

use sqlx::PgPool;

use crate::database::{
    ContactRepository, DatabasePool, EventRepository, ParticipantRepository, TripRepository,
    VoteRepository,
};

#[derive(Debug, Clone)]
pub struct DatabaseService {
    pool: PgPool,
    pub trips: TripRepository,
    pub participants: ParticipantRepository,
    pub votes: VoteRepository,
    pub events: EventRepository,
    pub contacts: ContactRepository,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            trips: TripRepository::new(pool.clone()),
            participants: ParticipantRepository::new(pool.clone()),
            votes: VoteRepository::new(pool.clone()),
            events: EventRepository::new(pool.clone()),
            contacts: ContactRepository::new(pool.clone()),
            pool,
        }
    }

    /// Begin a transaction on the underlying pool
    pub async fn begin(
        &self,
    ) -> Result<sqlx::Transaction<'_, sqlx::Postgres>, crate::utils::errors::TripGuardError> {
        Ok(self.pool.begin().await?)
    }
}
