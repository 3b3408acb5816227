use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

use bams_chain::types::block::now_millis;
use bams_chain::types::tx::{DEPARTMENT_CREATION, DEPARTMENT_DELETION, DEPARTMENT_UPDATE};
use bams_chain::{BlockSnapshot, ChainHandle, EntityId, EntityKind, Transaction};

use crate::directory::{Department, STATUS_ACTIVE, STATUS_DELETED};
use crate::routes::{ApiError, DeletedResponse, bad_request, ledger_error, not_found};
use crate::state::SharedState;

/// Request body for `POST /api/departments` and `PUT /api/departments/{id}`.
#[derive(Debug, Deserialize)]
pub struct DepartmentRequest {
    pub name: String,
    pub code: String,
}

/// Response body for `POST /api/departments`.
#[derive(Debug, Serialize)]
pub struct CreateDepartmentResponse {
    pub department: Department,
    pub blockchain: Vec<BlockSnapshot>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDepartmentResponse {
    pub department: Department,
    pub blockchain_data: Vec<BlockSnapshot>,
}

/// `POST /api/departments`
///
/// Registers a department and mines the genesis block of its chain.
/// Department names are unique.
pub async fn create_department(
    State(state): State<SharedState>,
    Json(body): Json<DepartmentRequest>,
) -> Result<Json<CreateDepartmentResponse>, ApiError> {
    let id = {
        let mut dir = state.directory.write().await;
        if !dir.claim_department_name(&body.name) {
            return Err(bad_request("Department already exists"));
        }
        dir.next_id()
    };

    let created = state
        .ledger
        .get_or_create(
            EntityKind::Department,
            id.clone(),
            Transaction::new(DEPARTMENT_CREATION)
                .with("name", body.name.as_str())
                .with("code", body.code.as_str()),
        )
        .await;
    let chain = match created {
        Ok(chain) => chain,
        Err(e) => {
            state.directory.write().await.release_department_name(&body.name);
            return Err(ledger_error(e));
        }
    };
    let blockchain = chain.chain_data().await;

    let now = now_millis();
    let department = Department {
        id,
        name: body.name,
        code: body.code,
        status: STATUS_ACTIVE.to_string(),
        blockchain_data: blockchain.clone(),
        created_at: now,
        updated_at: now,
    };
    {
        let mut dir = state.directory.write().await;
        dir.release_department_name(&department.name);
        dir.departments.push(department.clone());
    }
    tracing::info!(id = %department.id, name = %department.name, "department created");

    Ok(Json(CreateDepartmentResponse {
        department,
        blockchain,
    }))
}

/// `GET /api/departments`
pub async fn list_departments(State(state): State<SharedState>) -> Json<Vec<Department>> {
    let mut departments = state.directory.read().await.departments.clone();
    for dept in &mut departments {
        dept.blockchain_data = state.chain_data(EntityKind::Department, &dept.id).await;
    }
    Json(departments)
}

/// `GET /api/departments/{id}`
pub async fn get_department(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Department>, ApiError> {
    let id = EntityId::from(id);
    let mut dept = state
        .directory
        .read()
        .await
        .department(&id)
        .cloned()
        .ok_or_else(|| not_found("Department"))?;
    dept.blockchain_data = state.chain_data(EntityKind::Department, &id).await;
    Ok(Json(dept))
}

/// `PUT /api/departments/{id}`
///
/// Records the rename as an update block; the old values stay on chain.
pub async fn update_department(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<DepartmentRequest>,
) -> Result<Json<UpdateDepartmentResponse>, ApiError> {
    let id = EntityId::from(id);
    let chain = department_chain(&state, &id).await?;
    let mut append = chain.begin_append().await;

    // Previous values are read under the chain guard so no other append
    // to this department can slip in between.
    let (prev_name, prev_code) = {
        let mut dir = state.directory.write().await;
        let (prev_name, prev_code) = match dir.department(&id) {
            Some(d) => (d.name.clone(), d.code.clone()),
            None => return Err(not_found("Department")),
        };
        if prev_name != body.name && !dir.claim_department_name(&body.name) {
            return Err(bad_request("Department already exists"));
        }
        (prev_name, prev_code)
    };
    let renamed = prev_name != body.name;

    let appended = append
        .add_block(
            Transaction::new(DEPARTMENT_UPDATE)
                .with("prevName", prev_name)
                .with("prevCode", prev_code)
                .with("newName", body.name.as_str())
                .with("newCode", body.code.as_str())
                .with("timestamp", now_millis()),
        )
        .await;
    let blockchain_data = append.chain_data();

    let mut dir = state.directory.write().await;
    if renamed {
        dir.release_department_name(&body.name);
    }
    appended.map_err(ledger_error)?;
    let dept = dir
        .department_mut(&id)
        .ok_or_else(|| not_found("Department"))?;
    dept.name = body.name;
    dept.code = body.code;
    dept.blockchain_data = blockchain_data.clone();
    dept.updated_at = now_millis();

    Ok(Json(UpdateDepartmentResponse {
        department: dept.clone(),
        blockchain_data,
    }))
}

/// `DELETE /api/departments/{id}`
///
/// Soft delete: appends a deletion block and flags the record.
pub async fn delete_department(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let id = EntityId::from(id);
    let chain = department_chain(&state, &id).await?;
    let mut append = chain.begin_append().await;

    let name = state
        .directory
        .read()
        .await
        .department(&id)
        .map(|d| d.name.clone())
        .ok_or_else(|| not_found("Department"))?;

    append
        .add_block(
            Transaction::new(DEPARTMENT_DELETION)
                .with("status", STATUS_DELETED)
                .with("departmentId", id.as_str())
                .with("name", name)
                .with("timestamp", now_millis()),
        )
        .await
        .map_err(ledger_error)?;
    let blockchain_data = append.chain_data();

    if let Some(dept) = state.directory.write().await.department_mut(&id) {
        dept.status = STATUS_DELETED.to_string();
        dept.blockchain_data = blockchain_data.clone();
        dept.updated_at = now_millis();
    }

    Ok(Json(DeletedResponse {
        message: "Department marked as deleted".to_string(),
        blockchain_data,
    }))
}

/// Chain of a known department; 404 when either the record or its chain
/// is missing.
async fn department_chain(state: &SharedState, id: &EntityId) -> Result<ChainHandle, ApiError> {
    if state.directory.read().await.department(id).is_none() {
        return Err(not_found("Department"));
    }
    state
        .ledger
        .lookup(EntityKind::Department, id.clone())
        .await
        .map_err(ledger_error)
}
