//! Synchronous SQL for the `processed_images` and `orphaned_blobs` tables.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::models::{NewProcessedImage, OrphanedBlob, ProcessedImage};
use crate::Result;

const IMAGE_COLUMNS: &str = "id, original_name, original_url, processed_url, \
     original_blob_path, processed_blob_path, created_at";

/// Timestamps are stored as fixed-width RFC 3339 so text order is time order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn parse_timestamp(row: &Row, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

fn parse_image_row(row: &Row) -> rusqlite::Result<ProcessedImage> {
    let id: String = row.get(0)?;
    Ok(ProcessedImage {
        id: Uuid::parse_str(&id).map_err(|e| conversion_error(0, e))?,
        original_name: row.get(1)?,
        original_url: row.get(2)?,
        processed_url: row.get(3)?,
        original_blob_path: row.get(4)?,
        processed_blob_path: row.get(5)?,
        created_at: parse_timestamp(row, 6)?,
    })
}

fn parse_orphan_row(row: &Row) -> rusqlite::Result<OrphanedBlob> {
    Ok(OrphanedBlob {
        blob_path: row.get(0)?,
        last_error: row.get(1)?,
        attempts: row.get(2)?,
        recorded_at: parse_timestamp(row, 3)?,
    })
}

pub fn insert_image(conn: &Connection, image: &NewProcessedImage) -> Result<ProcessedImage> {
    let record = ProcessedImage {
        id: Uuid::new_v4(),
        original_name: image.original_name.clone(),
        original_url: image.original_url.clone(),
        processed_url: image.processed_url.clone(),
        original_blob_path: image.original_blob_path.clone(),
        processed_blob_path: image.processed_blob_path.clone(),
        created_at: Utc::now(),
    };

    conn.execute(
        "INSERT INTO processed_images (id, original_name, original_url, processed_url,
             original_blob_path, processed_blob_path, created_at)
         VALUES (:id, :original_name, :original_url, :processed_url,
             :original_blob_path, :processed_blob_path, :created_at)",
        rusqlite::named_params! {
            ":id": record.id.to_string(),
            ":original_name": &record.original_name,
            ":original_url": &record.original_url,
            ":processed_url": &record.processed_url,
            ":original_blob_path": &record.original_blob_path,
            ":processed_blob_path": &record.processed_blob_path,
            ":created_at": format_timestamp(&record.created_at),
        },
    )?;

    Ok(record)
}

/// All rows, newest first. Rows inserted within the same microsecond keep
/// insertion order via `rowid`.
pub fn list_images(conn: &Connection) -> Result<Vec<ProcessedImage>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM processed_images ORDER BY created_at DESC, rowid DESC",
        IMAGE_COLUMNS
    ))?;

    let images = stmt
        .query_map([], parse_image_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(images)
}

pub fn get_image(conn: &Connection, id: Uuid) -> Result<Option<ProcessedImage>> {
    let image = conn
        .query_row(
            &format!("SELECT {} FROM processed_images WHERE id = ?", IMAGE_COLUMNS),
            [id.to_string()],
            parse_image_row,
        )
        .optional()?;

    Ok(image)
}

pub fn delete_image(conn: &Connection, id: Uuid) -> Result<bool> {
    let affected = conn.execute(
        "DELETE FROM processed_images WHERE id = ?",
        [id.to_string()],
    )?;
    Ok(affected > 0)
}

/// Delete every row in `ids` inside one transaction.
pub fn delete_images(conn: &Connection, ids: &[Uuid]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut deleted = 0;
    {
        let mut stmt = tx.prepare("DELETE FROM processed_images WHERE id = ?")?;
        for id in ids {
            deleted += stmt.execute([id.to_string()])?;
        }
    }
    tx.commit()?;
    Ok(deleted)
}

/// Record a failed blob deletion. Re-recording the same path keeps the
/// original timestamp and counts as another attempt.
pub fn record_orphan(conn: &Connection, blob_path: &str, error: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO orphaned_blobs (blob_path, last_error, attempts, recorded_at)
         VALUES (?1, ?2, 1, ?3)
         ON CONFLICT(blob_path) DO UPDATE SET
             last_error = excluded.last_error,
             attempts = orphaned_blobs.attempts + 1",
        rusqlite::params![blob_path, error, format_timestamp(&Utc::now())],
    )?;
    Ok(())
}

pub fn list_orphans(conn: &Connection) -> Result<Vec<OrphanedBlob>> {
    let mut stmt = conn.prepare(
        "SELECT blob_path, last_error, attempts, recorded_at
         FROM orphaned_blobs ORDER BY recorded_at ASC",
    )?;

    let orphans = stmt
        .query_map([], parse_orphan_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(orphans)
}

pub fn clear_orphan(conn: &Connection, blob_path: &str) -> Result<bool> {
    let affected = conn.execute(
        "DELETE FROM orphaned_blobs WHERE blob_path = ?",
        [blob_path],
    )?;
    Ok(affected > 0)
}
