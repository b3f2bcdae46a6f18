use lingua_core::Error as ModelError;
use lingua_core::model::{Percent, RemoteProgressRecord, TenseId, TenseStatus, UserId};
use sqlx::Row;

use crate::repository::RemoteError;

fn ser<E: core::fmt::Display>(e: E) -> RemoteError {
    RemoteError::Serialization(e.to_string())
}

pub(crate) fn percent_from_i64(v: i64) -> Result<Percent, RemoteError> {
    Ok(Percent::try_from(v).map_err(ModelError::from)?)
}

pub(crate) fn parse_status(s: &str) -> Result<TenseStatus, RemoteError> {
    Ok(s.parse::<TenseStatus>().map_err(ModelError::from)?)
}

pub(crate) fn map_progress_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<RemoteProgressRecord, RemoteError> {
    let user_id =
        UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?).map_err(ModelError::from)?;
    let tense_id = TenseId::new(row.try_get::<String, _>("tense_id").map_err(ser)?);
    let progress = percent_from_i64(row.try_get("progress").map_err(ser)?)?;
    let status_str: String = row.try_get("status").map_err(ser)?;
    let status = parse_status(status_str.as_str())?;
    let updated_at: chrono::DateTime<chrono::Utc> = row.try_get("updated_at").map_err(ser)?;

    Ok(RemoteProgressRecord {
        user_id,
        tense_id,
        progress,
        status,
        updated_at,
    })
}
