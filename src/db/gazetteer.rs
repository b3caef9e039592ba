use chrono::Utc;
use sqlx::Row;
use tracing::info;

use super::core::{to_db_time, Database};
use crate::entity::{EntityKind, GazetteerEntry};
use crate::error::{ClusterError, Result};
use crate::TARGET_DB;

impl Database {
    /// Adds or replaces an alias, shared or owned by one site
    pub async fn upsert_gazetteer_entry(&self, entry: &GazetteerEntry) -> Result<()> {
        if entry.alias.trim().is_empty() || entry.canonical.trim().is_empty() {
            return Err(ClusterError::InvalidRecord(
                "gazetteer alias and canonical name must not be empty".to_string(),
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO gazetteer_entries (site_id, alias, canonical, kind, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(site_id, alias) DO UPDATE
                SET canonical = excluded.canonical, kind = excluded.kind
            "#,
        )
        .bind(entry.site_id.as_deref().unwrap_or(""))
        .bind(entry.alias.trim())
        .bind(entry.canonical.trim())
        .bind(entry.kind.to_string())
        .bind(to_db_time(&Utc::now()))
        .execute(self.pool())
        .await?;

        info!(
            target: TARGET_DB,
            "Stored alias '{}' -> '{}' ({}) for {}",
            entry.alias,
            entry.canonical,
            entry.kind,
            entry.site_id.as_deref().unwrap_or("all sites")
        );
        Ok(())
    }

    pub async fn fetch_gazetteer_entries(&self) -> Result<Vec<GazetteerEntry>> {
        let rows = sqlx::query(
            "SELECT site_id, alias, canonical, kind FROM gazetteer_entries ORDER BY id",
        )
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|row| -> Result<GazetteerEntry> {
                let kind: String = row.try_get("kind")?;
                let site_id: String = row.try_get("site_id")?;
                Ok(GazetteerEntry {
                    alias: row.try_get("alias")?,
                    canonical: row.try_get("canonical")?,
                    kind: EntityKind::from(kind.as_str()),
                    site_id: (!site_id.is_empty()).then_some(site_id),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_replaces_existing_alias() {
        let db = Database::in_memory().await.unwrap();
        db.upsert_gazetteer_entry(&GazetteerEntry::new("Plavi", "Dinamo Zagreb", EntityKind::Team))
            .await
            .unwrap();
        db.upsert_gazetteer_entry(&GazetteerEntry::new("Plavi", "Chelsea", EntityKind::Team))
            .await
            .unwrap();

        let entries = db.fetch_gazetteer_entries().await.unwrap();
        assert_eq!(entries, vec![GazetteerEntry::new("Plavi", "Chelsea", EntityKind::Team)]);
    }

    #[tokio::test]
    async fn site_entries_do_not_replace_shared_ones() {
        let db = Database::in_memory().await.unwrap();
        let shared = GazetteerEntry::new("Plavi", "Dinamo Zagreb", EntityKind::Team);
        let site = GazetteerEntry::new("Plavi", "Chelsea", EntityKind::Team).for_site("s2");
        db.upsert_gazetteer_entry(&shared).await.unwrap();
        db.upsert_gazetteer_entry(&site).await.unwrap();

        let entries = db.fetch_gazetteer_entries().await.unwrap();
        assert_eq!(entries, vec![shared, site]);
    }

    #[tokio::test]
    async fn empty_alias_is_rejected() {
        let db = Database::in_memory().await.unwrap();
        let result = db
            .upsert_gazetteer_entry(&GazetteerEntry::new(" ", "Chelsea", EntityKind::Team))
            .await;
        assert!(matches!(result, Err(ClusterError::InvalidRecord(_))));
    }
}
