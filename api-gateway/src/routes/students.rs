use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

use bams_chain::types::block::now_millis;
use bams_chain::types::tx::{STUDENT_CREATION, STUDENT_DELETION, STUDENT_UPDATE};
use bams_chain::{BlockSnapshot, ChainHandle, ChainKey, EntityId, EntityKind, Transaction};

use crate::directory::{STATUS_ACTIVE, STATUS_DELETED, Student};
use crate::routes::{ApiError, DeletedResponse, bad_request, ledger_error, not_found};
use crate::state::SharedState;

/// Request body for `POST /api/students`. The department defaults to the
/// class's department.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudentRequest {
    pub name: String,
    pub roll_number: String,
    pub class_id: EntityId,
    pub department_id: Option<EntityId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStudentRequest {
    pub name: String,
    pub roll_number: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentResponse {
    pub student: Student,
    pub blockchain_data: Vec<BlockSnapshot>,
}

/// `POST /api/students`
///
/// The student chain's genesis records the class chain's latest hash as
/// `prevClassHash`. Roll numbers are unique.
pub async fn create_student(
    State(state): State<SharedState>,
    Json(body): Json<CreateStudentRequest>,
) -> Result<Json<StudentResponse>, ApiError> {
    let (id, class_department) = {
        let mut dir = state.directory.write().await;
        let class_department = dir
            .class(&body.class_id)
            .map(|c| c.department_id.clone())
            .ok_or_else(|| not_found("Class"))?;
        if !dir.claim_roll_number(&body.roll_number) {
            return Err(bad_request("Roll number already exists"));
        }
        (dir.next_id(), class_department)
    };
    let department_id = body.department_id.unwrap_or(class_department);

    let parent = ChainKey::new(EntityKind::Class, body.class_id.clone());
    let created = state
        .ledger
        .create_anchored(
            EntityKind::Student,
            id.clone(),
            &parent,
            Transaction::new(STUDENT_CREATION)
                .with("name", body.name.as_str())
                .with("rollNumber", body.roll_number.as_str())
                .with("classId", body.class_id.as_str())
                .with("departmentId", department_id.as_str()),
        )
        .await;
    let chain = match created {
        Ok(chain) => chain,
        Err(e) => {
            state.directory.write().await.release_roll_number(&body.roll_number);
            return Err(ledger_error(e));
        }
    };
    let blockchain_data = chain.chain_data().await;

    let now = now_millis();
    let student = Student {
        id,
        name: body.name,
        roll_number: body.roll_number,
        department_id,
        class_id: body.class_id,
        status: STATUS_ACTIVE.to_string(),
        blockchain_data: blockchain_data.clone(),
        created_at: now,
        updated_at: now,
    };
    {
        let mut dir = state.directory.write().await;
        dir.release_roll_number(&student.roll_number);
        dir.students.push(student.clone());
    }
    tracing::info!(id = %student.id, class = %student.class_id, "student enrolled");

    Ok(Json(StudentResponse {
        student,
        blockchain_data,
    }))
}

async fn with_chain_data(state: &SharedState, mut students: Vec<Student>) -> Vec<Student> {
    for student in &mut students {
        student.blockchain_data = state.chain_data(EntityKind::Student, &student.id).await;
    }
    students
}

/// `GET /api/students`
pub async fn list_students(State(state): State<SharedState>) -> Json<Vec<Student>> {
    let students = state.directory.read().await.students.clone();
    Json(with_chain_data(&state, students).await)
}

/// `GET /api/students/class/{class_id}`
pub async fn students_by_class(
    State(state): State<SharedState>,
    Path(class_id): Path<String>,
) -> Json<Vec<Student>> {
    let students = state
        .directory
        .read()
        .await
        .students_in_class(&EntityId::from(class_id));
    Json(with_chain_data(&state, students).await)
}

/// `PUT /api/students/{id}`
pub async fn update_student(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateStudentRequest>,
) -> Result<Json<StudentResponse>, ApiError> {
    let id = EntityId::from(id);
    let chain = student_chain(&state, &id).await?;
    let mut append = chain.begin_append().await;

    let (prev_name, prev_roll) = {
        let mut dir = state.directory.write().await;
        let (prev_name, prev_roll) = dir
            .student(&id)
            .map(|s| (s.name.clone(), s.roll_number.clone()))
            .ok_or_else(|| not_found("Student"))?;
        if prev_roll != body.roll_number && !dir.claim_roll_number(&body.roll_number) {
            return Err(bad_request("Roll number already exists"));
        }
        (prev_name, prev_roll)
    };
    let renumbered = prev_roll != body.roll_number;

    let appended = append
        .add_block(
            Transaction::new(STUDENT_UPDATE)
                .with("prevName", prev_name)
                .with("newName", body.name.as_str())
                .with("prevRollNumber", prev_roll)
                .with("newRollNumber", body.roll_number.as_str())
                .with("timestamp", now_millis()),
        )
        .await;
    let blockchain_data = append.chain_data();

    let mut dir = state.directory.write().await;
    if renumbered {
        dir.release_roll_number(&body.roll_number);
    }
    appended.map_err(ledger_error)?;
    let student = dir.student_mut(&id).ok_or_else(|| not_found("Student"))?;
    student.name = body.name;
    student.roll_number = body.roll_number;
    student.blockchain_data = blockchain_data.clone();
    student.updated_at = now_millis();

    Ok(Json(StudentResponse {
        student: student.clone(),
        blockchain_data,
    }))
}

/// `DELETE /api/students/{id}`
pub async fn delete_student(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let id = EntityId::from(id);
    let chain = student_chain(&state, &id).await?;
    let mut append = chain.begin_append().await;

    let name = state
        .directory
        .read()
        .await
        .student(&id)
        .map(|s| s.name.clone())
        .ok_or_else(|| not_found("Student"))?;

    append
        .add_block(
            Transaction::new(STUDENT_DELETION)
                .with("status", STATUS_DELETED)
                .with("studentId", id.as_str())
                .with("name", name)
                .with("timestamp", now_millis()),
        )
        .await
        .map_err(ledger_error)?;
    let blockchain_data = append.chain_data();

    if let Some(student) = state.directory.write().await.student_mut(&id) {
        student.status = STATUS_DELETED.to_string();
        student.blockchain_data = blockchain_data.clone();
        student.updated_at = now_millis();
    }

    Ok(Json(DeletedResponse {
        message: "Student marked as deleted".to_string(),
        blockchain_data,
    }))
}

/// Chain of a known student; 404 when either the record or its chain is
/// missing.
pub(crate) async fn student_chain(
    state: &SharedState,
    id: &EntityId,
) -> Result<ChainHandle, ApiError> {
    if state.directory.read().await.student(id).is_none() {
        return Err(not_found("Student"));
    }
    state
        .ledger
        .lookup(EntityKind::Student, id.clone())
        .await
        .map_err(ledger_error)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::directory::Class;
    use crate::routes::{classes, departments};
    use crate::state::AppState;
    use axum::http::StatusCode;

    pub(crate) async fn create(state: &SharedState, class: &Class, roll: &str) -> Student {
        let Json(resp) = create_student(
            State(state.clone()),
            Json(CreateStudentRequest {
                name: format!("Student {roll}"),
                roll_number: roll.to_string(),
                class_id: class.id.clone(),
                department_id: None,
            }),
        )
        .await
        .unwrap();
        resp.student
    }

    #[tokio::test]
    async fn student_genesis_is_anchored_to_class_tip() {
        let state = AppState::for_tests();
        let dept = departments::tests::create(&state, "CS").await;
        let class = classes::tests::create(&state, &dept.id, "cs-a").await;
        let student = create(&state, &class, "CS-001").await;

        assert_eq!(student.department_id, dept.id);
        let genesis = &student.blockchain_data[0].transactions[0];
        assert_eq!(genesis.tx_type(), Some(STUDENT_CREATION));
        assert_eq!(
            genesis.get("prevClassHash").and_then(|v| v.as_str()),
            Some(class.blockchain_data[0].hash.as_str())
        );
    }

    #[tokio::test]
    async fn unknown_class_is_404_and_duplicate_roll_is_400() {
        let state = AppState::for_tests();
        let err = create_student(
            State(state.clone()),
            Json(CreateStudentRequest {
                name: "Ada".into(),
                roll_number: "1".into(),
                class_id: "missing".into(),
                department_id: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);

        let dept = departments::tests::create(&state, "CS").await;
        let class = classes::tests::create(&state, &dept.id, "cs-a").await;
        create(&state, &class, "1").await;
        let err = create_student(
            State(state.clone()),
            Json(CreateStudentRequest {
                name: "Bob".into(),
                roll_number: "1".into(),
                class_id: class.id.clone(),
                department_id: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn roll_number_held_by_pending_create_is_taken() {
        let state = AppState::for_tests();
        let dept = departments::tests::create(&state, "CS").await;
        let class = classes::tests::create(&state, &dept.id, "cs-a").await;
        assert!(state.directory.write().await.claim_roll_number("CS-009"));

        let err = create_student(
            State(state.clone()),
            Json(CreateStudentRequest {
                name: "Ada".into(),
                roll_number: "CS-009".into(),
                class_id: class.id.clone(),
                department_id: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        state.directory.write().await.release_roll_number("CS-009");
        let student = create(&state, &class, "CS-009").await;
        assert_eq!(student.roll_number, "CS-009");
        // The finished create gives its claim back; the record now guards the roll.
        assert!(!state.directory.write().await.claim_roll_number("CS-009"));
    }

    #[tokio::test]
    async fn update_and_delete_append_blocks() {
        let state = AppState::for_tests();
        let dept = departments::tests::create(&state, "CS").await;
        let class = classes::tests::create(&state, &dept.id, "cs-a").await;
        let student = create(&state, &class, "CS-001").await;

        let Json(resp) = update_student(
            State(state.clone()),
            Path(student.id.0.clone()),
            Json(UpdateStudentRequest {
                name: "Ada Lovelace".into(),
                roll_number: "CS-002".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(resp.student.roll_number, "CS-002");
        let tx = &resp.blockchain_data[1].transactions[0];
        assert_eq!(tx.get("prevRollNumber").and_then(|v| v.as_str()), Some("CS-001"));

        delete_student(State(state.clone()), Path(student.id.0.clone()))
            .await
            .unwrap();
        let Json(in_class) = students_by_class(State(state.clone()), Path(class.id.0.clone())).await;
        assert_eq!(in_class.len(), 1);
        assert_eq!(in_class[0].status, STATUS_DELETED);
        assert_eq!(in_class[0].blockchain_data.len(), 3);

        let Json(all) = list_students(State(state)).await;
        assert_eq!(all.len(), 1);
    }
}
