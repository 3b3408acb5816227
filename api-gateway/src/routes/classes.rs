use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

use bams_chain::types::block::now_millis;
use bams_chain::types::tx::{CLASS_CREATION, CLASS_DELETION, CLASS_UPDATE};
use bams_chain::{BlockSnapshot, ChainHandle, ChainKey, EntityId, EntityKind, Transaction};

use crate::directory::{Class, DEFAULT_CLASS_CAPACITY, STATUS_ACTIVE, STATUS_DELETED};
use crate::routes::{ApiError, DeletedResponse, ledger_error, not_found};
use crate::state::SharedState;

/// Request body for `POST /api/classes`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClassRequest {
    pub name: String,
    pub code: String,
    pub department_id: EntityId,
    pub capacity: Option<u32>,
}

/// Request body for `PUT /api/classes/{id}`. An absent capacity keeps the
/// current one.
#[derive(Debug, Deserialize)]
pub struct UpdateClassRequest {
    pub name: String,
    pub code: String,
    pub capacity: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassResponse {
    pub class: Class,
    pub blockchain_data: Vec<BlockSnapshot>,
}

/// `POST /api/classes`
///
/// The class chain's genesis records the department chain's latest hash
/// as `prevDepartmentHash`.
pub async fn create_class(
    State(state): State<SharedState>,
    Json(body): Json<CreateClassRequest>,
) -> Result<Json<ClassResponse>, ApiError> {
    let id = {
        let mut dir = state.directory.write().await;
        if dir.department(&body.department_id).is_none() {
            return Err(not_found("Department"));
        }
        dir.next_id()
    };

    let parent = ChainKey::new(EntityKind::Department, body.department_id.clone());
    let chain = state
        .ledger
        .create_anchored(
            EntityKind::Class,
            id.clone(),
            &parent,
            Transaction::new(CLASS_CREATION)
                .with("name", body.name.as_str())
                .with("code", body.code.as_str())
                .with("departmentId", body.department_id.as_str()),
        )
        .await
        .map_err(ledger_error)?;
    let blockchain_data = chain.chain_data().await;

    let now = now_millis();
    let class = Class {
        id,
        name: body.name,
        code: body.code,
        department_id: body.department_id,
        capacity: body.capacity.unwrap_or(DEFAULT_CLASS_CAPACITY),
        status: STATUS_ACTIVE.to_string(),
        blockchain_data: blockchain_data.clone(),
        created_at: now,
        updated_at: now,
    };
    state.directory.write().await.classes.push(class.clone());
    tracing::info!(id = %class.id, department = %class.department_id, "class created");

    Ok(Json(ClassResponse {
        class,
        blockchain_data,
    }))
}

async fn with_chain_data(state: &SharedState, mut classes: Vec<Class>) -> Vec<Class> {
    for class in &mut classes {
        class.blockchain_data = state.chain_data(EntityKind::Class, &class.id).await;
    }
    classes
}

/// `GET /api/classes`
pub async fn list_classes(State(state): State<SharedState>) -> Json<Vec<Class>> {
    let classes = state.directory.read().await.classes.clone();
    Json(with_chain_data(&state, classes).await)
}

/// `GET /api/classes/department/{department_id}`
pub async fn classes_by_department(
    State(state): State<SharedState>,
    Path(department_id): Path<String>,
) -> Json<Vec<Class>> {
    let classes = state
        .directory
        .read()
        .await
        .classes_in(&EntityId::from(department_id));
    Json(with_chain_data(&state, classes).await)
}

/// `PUT /api/classes/{id}`
pub async fn update_class(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateClassRequest>,
) -> Result<Json<ClassResponse>, ApiError> {
    let id = EntityId::from(id);
    let chain = class_chain(&state, &id).await?;
    let mut append = chain.begin_append().await;

    let (prev_name, prev_capacity) = state
        .directory
        .read()
        .await
        .class(&id)
        .map(|c| (c.name.clone(), c.capacity))
        .ok_or_else(|| not_found("Class"))?;
    let capacity = body.capacity.unwrap_or(prev_capacity);

    append
        .add_block(
            Transaction::new(CLASS_UPDATE)
                .with("prevName", prev_name)
                .with("newName", body.name.as_str())
                .with("prevCapacity", prev_capacity)
                .with("newCapacity", capacity)
                .with("timestamp", now_millis()),
        )
        .await
        .map_err(ledger_error)?;
    let blockchain_data = append.chain_data();

    let mut dir = state.directory.write().await;
    let class = dir.class_mut(&id).ok_or_else(|| not_found("Class"))?;
    class.name = body.name;
    class.code = body.code;
    class.capacity = capacity;
    class.blockchain_data = blockchain_data.clone();
    class.updated_at = now_millis();

    Ok(Json(ClassResponse {
        class: class.clone(),
        blockchain_data,
    }))
}

/// `DELETE /api/classes/{id}`
pub async fn delete_class(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let id = EntityId::from(id);
    let chain = class_chain(&state, &id).await?;
    let mut append = chain.begin_append().await;

    let name = state
        .directory
        .read()
        .await
        .class(&id)
        .map(|c| c.name.clone())
        .ok_or_else(|| not_found("Class"))?;

    append
        .add_block(
            Transaction::new(CLASS_DELETION)
                .with("status", STATUS_DELETED)
                .with("classId", id.as_str())
                .with("name", name)
                .with("timestamp", now_millis()),
        )
        .await
        .map_err(ledger_error)?;
    let blockchain_data = append.chain_data();

    if let Some(class) = state.directory.write().await.class_mut(&id) {
        class.status = STATUS_DELETED.to_string();
        class.blockchain_data = blockchain_data.clone();
        class.updated_at = now_millis();
    }

    Ok(Json(DeletedResponse {
        message: "Class marked as deleted".to_string(),
        blockchain_data,
    }))
}

async fn class_chain(state: &SharedState, id: &EntityId) -> Result<ChainHandle, ApiError> {
    if state.directory.read().await.class(id).is_none() {
        return Err(not_found("Class"));
    }
    state
        .ledger
        .lookup(EntityKind::Class, id.clone())
        .await
        .map_err(ledger_error)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::routes::departments;
    use crate::state::AppState;
    use axum::http::StatusCode;

    pub(crate) async fn create(state: &SharedState, department_id: &EntityId, name: &str) -> Class {
        let Json(resp) = create_class(
            State(state.clone()),
            Json(CreateClassRequest {
                name: name.to_string(),
                code: name.to_uppercase(),
                department_id: department_id.clone(),
                capacity: None,
            }),
        )
        .await
        .unwrap();
        resp.class
    }

    #[tokio::test]
    async fn class_genesis_is_anchored_to_department_tip() {
        let state = AppState::for_tests();
        let dept = departments::tests::create(&state, "CS").await;
        let class = create(&state, &dept.id, "cs-a").await;

        assert_eq!(class.capacity, DEFAULT_CLASS_CAPACITY);
        let genesis = &class.blockchain_data[0];
        assert_eq!(
            genesis.transactions[0]
                .get("prevDepartmentHash")
                .and_then(|v| v.as_str()),
            Some(dept.blockchain_data[0].hash.as_str())
        );
        // Anchoring does not touch the parent chain.
        assert_eq!(state.chain_data(EntityKind::Department, &dept.id).await.len(), 1);
    }

    #[tokio::test]
    async fn unknown_department_is_404() {
        let state = AppState::for_tests();
        let err = create_class(
            State(state.clone()),
            Json(CreateClassRequest {
                name: "x".into(),
                code: "X".into(),
                department_id: "missing".into(),
                capacity: Some(10),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
        assert!(state.ledger.is_empty().await);
    }

    #[tokio::test]
    async fn classes_filter_by_department() {
        let state = AppState::for_tests();
        let cs = departments::tests::create(&state, "CS").await;
        let ee = departments::tests::create(&state, "EE").await;
        create(&state, &cs.id, "cs-a").await;
        create(&state, &cs.id, "cs-b").await;
        create(&state, &ee.id, "ee-a").await;

        let Json(cs_classes) =
            classes_by_department(State(state.clone()), Path(cs.id.0.clone())).await;
        assert_eq!(cs_classes.len(), 2);
        let Json(all) = list_classes(State(state)).await;
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn update_keeps_capacity_when_absent() {
        let state = AppState::for_tests();
        let dept = departments::tests::create(&state, "CS").await;
        let class = create(&state, &dept.id, "cs-a").await;

        let Json(resp) = update_class(
            State(state.clone()),
            Path(class.id.0.clone()),
            Json(UpdateClassRequest {
                name: "CS-A".into(),
                code: "CSA".into(),
                capacity: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(resp.class.capacity, DEFAULT_CLASS_CAPACITY);
        assert_eq!(resp.blockchain_data.len(), 2);
        let tx = &resp.blockchain_data[1].transactions[0];
        assert_eq!(tx.tx_type(), Some(CLASS_UPDATE));
        assert_eq!(tx.get("newCapacity").and_then(|v| v.as_u64()), Some(35));

        let Json(resp) = delete_class(State(state), Path(class.id.0.clone()))
            .await
            .unwrap();
        assert_eq!(resp.blockchain_data.len(), 3);
    }
}
