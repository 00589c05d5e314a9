//! Filter rule storage repository.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use tracing::warn;

use super::model::{Combinator, FilterRule, NewFilterRule, RuleId};
use crate::Result;
use crate::identity::{IdentityId, OrgId};

/// Repository for filter rules.
#[derive(Debug, Clone)]
pub struct FilterRepository {
    pool: SqlitePool,
}

impl FilterRepository {
    /// Create a repository over an open pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a new rule.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the insert fails.
    pub async fn create(&self, rule: &NewFilterRule) -> Result<FilterRule> {
        let conditions = serde_json::to_string(&rule.conditions)?;
        let actions = serde_json::to_string(&rule.actions)?;

        let result = sqlx::query(
            r"
            INSERT INTO inbox_filters
                (org_id, identity_id, name, priority, condition_logic, conditions, actions, active)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(rule.org_id.0)
        .bind(rule.identity_id.map(|id| id.0))
        .bind(&rule.name)
        .bind(rule.priority)
        .bind(rule.combinator.as_str())
        .bind(conditions)
        .bind(actions)
        .bind(rule.active)
        .execute(&self.pool)
        .await?;

        Ok(FilterRule {
            id: RuleId::new(result.last_insert_rowid()),
            org_id: rule.org_id,
            identity_id: rule.identity_id,
            name: rule.name.clone(),
            priority: rule.priority,
            combinator: rule.combinator,
            conditions: rule.conditions.clone(),
            actions: rule.actions.clone(),
            active: rule.active,
            match_count: 0,
            last_matched_at: None,
        })
    }

    /// Load active rules visible to an identity: organization-wide rules plus
    /// rules scoped to that identity, highest priority first.
    ///
    /// Rows whose stored combinator or JSON is unreadable are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn rules_for(&self, org_id: OrgId, identity_id: IdentityId) -> Result<Vec<FilterRule>> {
        let rows = sqlx::query(
            r"
            SELECT * FROM inbox_filters
            WHERE org_id = ? AND active = 1 AND (identity_id IS NULL OR identity_id = ?)
            ORDER BY priority DESC, id ASC
            ",
        )
        .bind(org_id.0)
        .bind(identity_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(row_to_rule).collect())
    }

    /// Load every rule of an organization in insertion order, active or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn rules_for_org(&self, org_id: OrgId) -> Result<Vec<FilterRule>> {
        let rows = sqlx::query("SELECT * FROM inbox_filters WHERE org_id = ? ORDER BY id")
            .bind(org_id.0)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().filter_map(row_to_rule).collect())
    }

    /// Get a rule by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: RuleId) -> Result<Option<FilterRule>> {
        let row = sqlx::query("SELECT * FROM inbox_filters WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().and_then(row_to_rule))
    }

    /// Increment a rule's match counter and stamp the match time.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn record_match(&self, id: RuleId, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r"
            UPDATE inbox_filters
            SET match_count = match_count + 1, last_matched_at = ?
            WHERE id = ?
            ",
        )
        .bind(at.to_rfc3339())
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_rule(row: &SqliteRow) -> Option<FilterRule> {
    let id = RuleId::new(row.get("id"));
    let logic: String = row.get("condition_logic");
    let Some(combinator) = Combinator::parse(&logic) else {
        warn!("Skipping filter {id}: unknown condition logic {logic:?}");
        return None;
    };
    let conditions = match serde_json::from_str(&row.get::<String, _>("conditions")) {
        Ok(conditions) => conditions,
        Err(e) => {
            warn!("Skipping filter {id}: unreadable conditions: {e}");
            return None;
        }
    };
    let actions = match serde_json::from_str(&row.get::<String, _>("actions")) {
        Ok(actions) => actions,
        Err(e) => {
            warn!("Skipping filter {id}: unreadable actions: {e}");
            return None;
        }
    };

    Some(FilterRule {
        id,
        org_id: OrgId::new(row.get("org_id")),
        identity_id: row.get::<Option<i64>, _>("identity_id").map(IdentityId::new),
        name: row.get("name"),
        priority: row.get("priority"),
        combinator,
        conditions,
        actions,
        active: row.get::<bool, _>("active"),
        match_count: row.get("match_count"),
        last_matched_at: row
            .get::<Option<String>, _>("last_matched_at")
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::filter::{ActionType, ConditionField, FilterAction, FilterCondition, Operator};

    async fn repo() -> FilterRepository {
        let db = Database::in_memory().await.unwrap();
        FilterRepository::new(db.pool().clone())
    }

    fn rule(name: &str, priority: i64, identity_id: Option<IdentityId>) -> NewFilterRule {
        NewFilterRule {
            org_id: OrgId::new(1),
            identity_id,
            name: name.to_string(),
            priority,
            combinator: Combinator::All,
            conditions: vec![FilterCondition::new(
                ConditionField::Subject,
                Operator::Contains,
                "invoice",
            )],
            actions: vec![FilterAction::new(ActionType::Star)],
            active: true,
        }
    }

    #[tokio::test]
    async fn test_rules_ordered_by_priority_then_insertion() {
        let repo = repo().await;
        repo.create(&rule("low", 1, None)).await.unwrap();
        repo.create(&rule("high-a", 10, None)).await.unwrap();
        repo.create(&rule("high-b", 10, None)).await.unwrap();

        let names: Vec<String> = repo
            .rules_for(OrgId::new(1), IdentityId::new(5))
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["high-a", "high-b", "low"]);
    }

    #[tokio::test]
    async fn test_rules_scoped_to_identity_and_active() {
        let repo = repo().await;
        repo.create(&rule("global", 0, None)).await.unwrap();
        repo.create(&rule("mine", 0, Some(IdentityId::new(5))))
            .await
            .unwrap();
        repo.create(&rule("theirs", 0, Some(IdentityId::new(6))))
            .await
            .unwrap();
        repo.create(&NewFilterRule {
            active: false,
            ..rule("off", 0, None)
        })
        .await
        .unwrap();
        repo.create(&NewFilterRule {
            org_id: OrgId::new(2),
            ..rule("other-org", 0, None)
        })
        .await
        .unwrap();

        let names: Vec<String> = repo
            .rules_for(OrgId::new(1), IdentityId::new(5))
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["global", "mine"]);

        assert_eq!(repo.rules_for_org(OrgId::new(1)).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_record_match() {
        let repo = repo().await;
        let created = repo.create(&rule("r", 0, None)).await.unwrap();
        repo.record_match(created.id, Utc::now()).await.unwrap();
        repo.record_match(created.id, Utc::now()).await.unwrap();

        let loaded = repo.get(created.id).await.unwrap().unwrap();
        assert_eq!(loaded.match_count, 2);
        assert!(loaded.last_matched_at.is_some());
        assert_eq!(loaded.conditions, created.conditions);
        assert_eq!(loaded.actions, created.actions);
    }

    #[tokio::test]
    async fn test_unreadable_rows_are_skipped() {
        let repo = repo().await;
        repo.create(&rule("ok", 0, None)).await.unwrap();
        sqlx::query(
            "INSERT INTO inbox_filters (org_id, name, condition_logic) VALUES (1, 'bad', 'xor')",
        )
        .execute(&repo.pool)
        .await
        .unwrap();

        let rules = repo.rules_for(OrgId::new(1), IdentityId::new(1)).await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "ok");
    }
}
