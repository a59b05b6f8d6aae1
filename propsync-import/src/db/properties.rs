//! Catalog store database operations

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use propsync_common::{Error, Result};

use crate::models::{CatalogStats, MappedProperty, PropertyRecord, PropertyStatus};

/// Check whether a legacy id already has a catalog record
pub async fn exists(pool: &SqlitePool, wp_id: i64) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM wordpress_properties WHERE wp_id = ?")
            .bind(wp_id)
            .fetch_one(pool)
            .await?;

    Ok(count > 0)
}

/// Insert a freshly imported record
///
/// `wp_id` is UNIQUE; a duplicate insert surfaces as a database error, which
/// the driver treats as a record failure rather than a run failure.
pub async fn insert_property(pool: &SqlitePool, record: &PropertyRecord) -> Result<()> {
    let data = serde_json::to_string(&record.data)
        .map_err(|e| Error::Internal(format!("Failed to serialize property data: {}", e)))?;
    let photo_urls = serde_json::to_string(&record.photo_urls)
        .map_err(|e| Error::Internal(format!("Failed to serialize photo urls: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO wordpress_properties (
            id, wp_id, status, data, thumbnail_url,
            photo_urls, photo_count, notes, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id.to_string())
    .bind(record.wp_id)
    .bind(record.status.as_str())
    .bind(&data)
    .bind(&record.thumbnail_url)
    .bind(&photo_urls)
    .bind(record.photo_count)
    .bind(&record.notes)
    .bind(record.created_at.to_rfc3339())
    .bind(record.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a catalog record by legacy id
pub async fn get_by_wp_id(pool: &SqlitePool, wp_id: i64) -> Result<Option<PropertyRecord>> {
    let row = sqlx::query(
        r#"
        SELECT id, wp_id, status, data, thumbnail_url,
               photo_urls, photo_count, notes, created_at, updated_at
        FROM wordpress_properties
        WHERE wp_id = ?
        "#,
    )
    .bind(wp_id)
    .fetch_optional(pool)
    .await?;

    row.map(record_from_row).transpose()
}

/// Replace the stored photo URLs for a record
///
/// The first URL doubles as the thumbnail; an empty list clears both.
pub async fn update_photo_urls(
    pool: &SqlitePool,
    wp_id: i64,
    photo_urls: &[String],
) -> Result<()> {
    let thumbnail = photo_urls.first().cloned();
    let serialized = serde_json::to_string(photo_urls)
        .map_err(|e| Error::Internal(format!("Failed to serialize photo urls: {}", e)))?;

    let result = sqlx::query(
        r#"
        UPDATE wordpress_properties
        SET photo_urls = ?,
            thumbnail_url = ?,
            photo_count = ?,
            updated_at = ?
        WHERE wp_id = ?
        "#,
    )
    .bind(&serialized)
    .bind(&thumbnail)
    .bind(photo_urls.len() as i64)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(wp_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("no catalog record for wp_id {}", wp_id)));
    }

    Ok(())
}

/// Move a record to a new review status, optionally attaching a note
///
/// A `None` note leaves any existing note in place. Terminal statuses are
/// frozen; moving a migrated, rejected or archived record reports a
/// conflict.
pub async fn update_status(
    pool: &SqlitePool,
    wp_id: i64,
    status: PropertyStatus,
    note: Option<&str>,
) -> Result<()> {
    let current: Option<String> =
        sqlx::query_scalar("SELECT status FROM wordpress_properties WHERE wp_id = ?")
            .bind(wp_id)
            .fetch_optional(pool)
            .await?;
    let current = current
        .ok_or_else(|| Error::NotFound(format!("no catalog record for wp_id {}", wp_id)))?;
    let current = PropertyStatus::parse(&current)
        .ok_or_else(|| Error::Internal(format!("Unknown property status: {}", current)))?;
    if current.is_terminal() && current != status {
        return Err(Error::Conflict(format!(
            "record {} is already {}; terminal statuses are frozen",
            wp_id,
            current.as_str()
        )));
    }

    let result = sqlx::query(
        r#"
        UPDATE wordpress_properties
        SET status = ?,
            notes = COALESCE(?, notes),
            updated_at = ?
        WHERE wp_id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(note)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(wp_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("no catalog record for wp_id {}", wp_id)));
    }

    Ok(())
}

/// Total records in the catalog store
pub async fn count_properties(pool: &SqlitePool) -> Result<u64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wordpress_properties")
        .fetch_one(pool)
        .await?;

    Ok(count as u64)
}

/// Per-status aggregation for the status endpoint
///
/// All counts come out of one query so they describe a single snapshot;
/// counting in separate statements while the import is writing would let
/// `with_photos` outrun `total`.
pub async fn catalog_stats(pool: &SqlitePool) -> Result<CatalogStats> {
    let row = sqlx::query(
        r#"
        SELECT
            COUNT(*) AS total,
            COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0) AS pending,
            COALESCE(SUM(CASE WHEN status = 'reviewing' THEN 1 ELSE 0 END), 0) AS reviewing,
            COALESCE(SUM(CASE WHEN status = 'approved' THEN 1 ELSE 0 END), 0) AS approved,
            COALESCE(SUM(CASE WHEN status = 'migrated' THEN 1 ELSE 0 END), 0) AS migrated,
            COALESCE(SUM(CASE WHEN status = 'rejected' THEN 1 ELSE 0 END), 0) AS rejected,
            COALESCE(SUM(CASE WHEN status = 'archived' THEN 1 ELSE 0 END), 0) AS archived,
            COALESCE(SUM(CASE WHEN photo_urls != '[]' THEN 1 ELSE 0 END), 0) AS with_photos,
            COALESCE(SUM(CASE WHEN status = 'approved' AND photo_urls != '[]' THEN 1 ELSE 0 END), 0)
                AS ready_to_migrate
        FROM wordpress_properties
        "#,
    )
    .fetch_one(pool)
    .await?;

    let total = row.get::<i64, _>("total") as u64;
    let with_photos = row.get::<i64, _>("with_photos") as u64;

    Ok(CatalogStats {
        total,
        pending: row.get::<i64, _>("pending") as u64,
        reviewing: row.get::<i64, _>("reviewing") as u64,
        approved: row.get::<i64, _>("approved") as u64,
        migrated: row.get::<i64, _>("migrated") as u64,
        rejected: row.get::<i64, _>("rejected") as u64,
        archived: row.get::<i64, _>("archived") as u64,
        with_photos,
        without_photos: total.saturating_sub(with_photos),
        ready_to_migrate: row.get::<i64, _>("ready_to_migrate") as u64,
    })
}

fn record_from_row(row: sqlx::sqlite::SqliteRow) -> Result<PropertyRecord> {
    let id_str: String = row.get("id");
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| Error::Internal(format!("Failed to parse record id: {}", e)))?;

    let status: String = row.get("status");
    let status = PropertyStatus::parse(&status)
        .ok_or_else(|| Error::Internal(format!("Unknown property status: {}", status)))?;

    let data: String = row.get("data");
    let data: MappedProperty = serde_json::from_str(&data)
        .map_err(|e| Error::Internal(format!("Failed to deserialize property data: {}", e)))?;

    let photo_urls: String = row.get("photo_urls");
    let photo_urls: Vec<String> = serde_json::from_str(&photo_urls)
        .map_err(|e| Error::Internal(format!("Failed to deserialize photo urls: {}", e)))?;

    let created_at: String = row.get("created_at");
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| Error::Internal(format!("Failed to parse created_at: {}", e)))?
        .with_timezone(&chrono::Utc);

    let updated_at: String = row.get("updated_at");
    let updated_at = chrono::DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| Error::Internal(format!("Failed to parse updated_at: {}", e)))?
        .with_timezone(&chrono::Utc);

    Ok(PropertyRecord {
        id,
        wp_id: row.get("wp_id"),
        status,
        data,
        thumbnail_url: row.get("thumbnail_url"),
        photo_urls,
        photo_count: row.get("photo_count"),
        notes: row.get("notes"),
        created_at,
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Block, MappedProperty};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        pool
    }

    fn sample_mapped(wp_id: i64) -> MappedProperty {
        MappedProperty {
            titulo: format!("Casa no Centro {}", wp_id),
            slug: format!("casa-no-centro-{}", wp_id),
            finalidade: "Venda".to_string(),
            tipo_imovel: "Casa".to_string(),
            descricao: vec![Block::empty()],
            dormitorios: 3,
            banheiros: 2,
            area_util: Some(120.0),
            area_total: Some(250.0),
            preco: Some(450_000.0),
            endereco: "Rua das Flores, 100".to_string(),
            bairro: "Centro".to_string(),
            cidade: "Curitiba".to_string(),
            estado: "Paraná".to_string(),
            codigo_interno: format!("REF{}", wp_id),
        }
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let pool = test_pool().await;
        let record = PropertyRecord::pending(101, sample_mapped(101), 5);
        insert_property(&pool, &record).await.unwrap();

        assert!(exists(&pool, 101).await.unwrap());
        let loaded = get_by_wp_id(&pool, 101).await.unwrap().unwrap();
        assert_eq!(loaded.wp_id, 101);
        assert_eq!(loaded.status, PropertyStatus::Pending);
        assert_eq!(loaded.data.titulo, "Casa no Centro 101");
        assert_eq!(loaded.photo_count, 5);
        assert!(loaded.photo_urls.is_empty());
    }

    #[tokio::test]
    async fn duplicate_wp_id_is_rejected() {
        let pool = test_pool().await;
        let record = PropertyRecord::pending(7, sample_mapped(7), 0);
        insert_property(&pool, &record).await.unwrap();

        let duplicate = PropertyRecord::pending(7, sample_mapped(7), 0);
        assert!(insert_property(&pool, &duplicate).await.is_err());
    }

    #[tokio::test]
    async fn photo_urls_update_sets_thumbnail() {
        let pool = test_pool().await;
        let record = PropertyRecord::pending(12, sample_mapped(12), 2);
        insert_property(&pool, &record).await.unwrap();

        let urls = vec![
            "https://cdn.example.com/12/img_foto01.jpg".to_string(),
            "https://cdn.example.com/12/img_foto02.jpg".to_string(),
        ];
        update_photo_urls(&pool, 12, &urls).await.unwrap();

        let loaded = get_by_wp_id(&pool, 12).await.unwrap().unwrap();
        assert_eq!(loaded.photo_urls, urls);
        assert_eq!(loaded.thumbnail_url.as_deref(), Some(urls[0].as_str()));
        assert_eq!(loaded.photo_count, 2);
    }

    #[tokio::test]
    async fn stats_aggregate_by_status() {
        let pool = test_pool().await;
        for wp_id in 1..=3 {
            let record = PropertyRecord::pending(wp_id, sample_mapped(wp_id), 0);
            insert_property(&pool, &record).await.unwrap();
        }
        update_status(&pool, 2, PropertyStatus::Approved, None).await.unwrap();
        update_photo_urls(&pool, 3, &["https://cdn.example.com/3/a.jpg".to_string()])
            .await
            .unwrap();
        update_status(&pool, 3, PropertyStatus::Approved, Some("fotos conferidas"))
            .await
            .unwrap();

        let stats = catalog_stats(&pool).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.approved, 2);
        assert_eq!(stats.with_photos, 1);
        assert_eq!(stats.without_photos, 2);
        // Record 3 is approved and has a photo; record 2 is approved but bare
        assert_eq!(stats.ready_to_migrate, 1);

        let noted = get_by_wp_id(&pool, 3).await.unwrap().unwrap();
        assert_eq!(noted.notes.as_deref(), Some("fotos conferidas"));
    }

    #[tokio::test]
    async fn stats_on_empty_catalog_are_all_zero() {
        let pool = test_pool().await;
        let stats = catalog_stats(&pool).await.unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.with_photos, 0);
        assert_eq!(stats.without_photos, 0);
        assert_eq!(stats.ready_to_migrate, 0);
    }

    #[tokio::test]
    async fn terminal_status_is_frozen() {
        let pool = test_pool().await;
        let record = PropertyRecord::pending(21, sample_mapped(21), 0);
        insert_property(&pool, &record).await.unwrap();

        update_status(&pool, 21, PropertyStatus::Migrated, None).await.unwrap();
        let err = update_status(&pool, 21, PropertyStatus::Pending, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        // Re-asserting the same terminal status is allowed (note updates)
        update_status(&pool, 21, PropertyStatus::Migrated, Some("exportado"))
            .await
            .unwrap();
        let loaded = get_by_wp_id(&pool, 21).await.unwrap().unwrap();
        assert_eq!(loaded.status, PropertyStatus::Migrated);
        assert_eq!(loaded.notes.as_deref(), Some("exportado"));
    }

    #[tokio::test]
    async fn updates_on_missing_record_report_not_found() {
        let pool = test_pool().await;
        let err = update_status(&pool, 999, PropertyStatus::Archived, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
