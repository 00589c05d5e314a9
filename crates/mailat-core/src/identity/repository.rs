//! Identity repository: domain and identity lookups.

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};

use super::model::{Domain, DomainId, Identity, IdentityId, OrgId};
use crate::{Error, Result};

const IDENTITY_COLUMNS: &str = r"
    SELECT i.id, i.domain_id, d.org_id, i.email, i.is_catch_all
    FROM identities i
    JOIN domains d ON i.domain_id = d.id
";

/// Repository for domains and identities.
#[derive(Debug, Clone)]
pub struct IdentityRepository {
    pool: SqlitePool,
}

impl IdentityRepository {
    /// Create a repository over an open pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find the identity bound to exactly this address.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_address(&self, address: &str) -> Result<Option<Identity>> {
        let row = sqlx::query(&format!("{IDENTITY_COLUMNS} WHERE i.email = ? LIMIT 1"))
            .bind(address.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| row_to_identity(&r)))
    }

    /// Find the catch-all identity of a domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_catch_all(&self, domain: &str) -> Result<Option<Identity>> {
        let row = sqlx::query(&format!(
            "{IDENTITY_COLUMNS} WHERE d.name = ? AND i.is_catch_all = 1 ORDER BY i.id LIMIT 1"
        ))
        .bind(domain.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| row_to_identity(&r)))
    }

    /// Get a domain by ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DomainNotFound`] if no such domain exists, or an
    /// error if the database query fails.
    pub async fn get_domain(&self, id: DomainId) -> Result<Domain> {
        let row = sqlx::query(
            r"
            SELECT id, org_id, name, receiving_container
            FROM domains
            WHERE id = ?
            ",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::DomainNotFound(id.0))?;

        Ok(Domain {
            id: DomainId::new(row.get("id")),
            org_id: OrgId::new(row.get("org_id")),
            name: row.get("name"),
            receiving_container: row.get("receiving_container"),
        })
    }

    /// Register a receiving domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain already exists or the insert fails.
    pub async fn create_domain(
        &self,
        org_id: OrgId,
        name: &str,
        receiving_container: Option<&str>,
    ) -> Result<Domain> {
        let name = name.to_lowercase();
        let result = sqlx::query(
            r"
            INSERT INTO domains (org_id, name, receiving_container)
            VALUES (?, ?, ?)
            ",
        )
        .bind(org_id.0)
        .bind(&name)
        .bind(receiving_container)
        .execute(&self.pool)
        .await?;

        Ok(Domain {
            id: DomainId::new(result.last_insert_rowid()),
            org_id,
            name,
            receiving_container: receiving_container.map(ToString::to_string),
        })
    }

    /// Register an identity on a domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain does not exist or the insert fails.
    pub async fn create_identity(
        &self,
        domain_id: DomainId,
        email: &str,
        is_catch_all: bool,
    ) -> Result<Identity> {
        let domain = self.get_domain(domain_id).await?;
        let email = email.to_lowercase();
        let result = sqlx::query(
            r"
            INSERT INTO identities (domain_id, email, is_catch_all)
            VALUES (?, ?, ?)
            ",
        )
        .bind(domain_id.0)
        .bind(&email)
        .bind(is_catch_all)
        .execute(&self.pool)
        .await?;

        Ok(Identity {
            id: IdentityId::new(result.last_insert_rowid()),
            domain_id,
            org_id: domain.org_id,
            email,
            is_catch_all,
        })
    }
}

fn row_to_identity(row: &SqliteRow) -> Identity {
    Identity {
        id: IdentityId::new(row.get("id")),
        domain_id: DomainId::new(row.get("domain_id")),
        org_id: OrgId::new(row.get("org_id")),
        email: row.get("email"),
        is_catch_all: row.get("is_catch_all"),
    }
}
