//! Department directory. The list backs registration and profile forms,
//! so it stays readable without a login.

use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use log::info;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{self, Action};
use crate::shared::models::Department;
use crate::shared::schema::departments;
use crate::shared::state::AppState;

use super::PortalError;

#[derive(Debug, Deserialize)]
pub struct DepartmentPayload {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

pub async fn handle_list_departments(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Department>>, PortalError> {
    let pool = state.conn.clone();

    let records = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| PortalError::Database(e.to_string()))?;
        let records: Vec<Department> = departments::table
            .order(departments::name.asc())
            .load(&mut conn)
            .map_err(|e| PortalError::Database(e.to_string()))?;
        Ok::<Vec<Department>, PortalError>(records)
    })
    .await
    .map_err(|e| PortalError::Internal(e.to_string()))??;

    Ok(Json(records))
}

pub async fn handle_create_department(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<DepartmentPayload>,
) -> Result<Json<Department>, PortalError> {
    let actor_id = auth::actor_id(&headers)?;
    let pool = state.conn.clone();

    let record = tokio::task::spawn_blocking(move || {
        if payload.name.trim().is_empty() {
            return Err(PortalError::Validation(
                "Укажите название отдела".to_string(),
            ));
        }

        let mut conn = pool
            .get()
            .map_err(|e| PortalError::Database(e.to_string()))?;
        let actor = auth::load_actor(&mut conn, actor_id)?;
        actor.require(Action::ManageDepartments)?;

        let existing: Option<Uuid> = departments::table
            .filter(departments::name.eq(&payload.name))
            .select(departments::id)
            .first(&mut conn)
            .optional()
            .map_err(|e| PortalError::Database(e.to_string()))?;
        if existing.is_some() {
            return Err(PortalError::DuplicateName(
                "Отдел с таким названием уже существует".to_string(),
            ));
        }

        let record = Department {
            id: Uuid::new_v4(),
            name: payload.name,
            description: payload.description,
            created_at: Utc::now(),
        };
        match diesel::insert_into(departments::table)
            .values(&record)
            .execute(&mut conn)
        {
            Ok(_) => {}
            Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                return Err(PortalError::DuplicateName(
                    "Отдел с таким названием уже существует".to_string(),
                ));
            }
            Err(e) => return Err(PortalError::Database(e.to_string())),
        }

        info!("department {} created", record.name);
        Ok(record)
    })
    .await
    .map_err(|e| PortalError::Internal(e.to_string()))??;

    Ok(Json(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_department_payload_description_defaults_empty() {
        let payload: DepartmentPayload =
            serde_json::from_str(r#"{ "name": "Отдел кадров" }"#).expect("should deserialize");
        assert_eq!(payload.name, "Отдел кадров");
        assert!(payload.description.is_empty());
    }
}
