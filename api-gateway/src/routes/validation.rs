use axum::{
    Json,
    extract::{Path, State},
};

use bams_chain::{EntityId, EntityRef, ValidationReport};

use crate::routes::{ApiError, not_found};
use crate::state::SharedState;

/// `GET /api/validate/{department_id}`
///
/// Validates the department chain and the chains of every class and
/// student recorded under it. Read-only.
pub async fn validate_department(
    State(state): State<SharedState>,
    Path(department_id): Path<String>,
) -> Result<Json<ValidationReport>, ApiError> {
    let department_id = EntityId::from(department_id);
    let (classes, students) = {
        let dir = state.directory.read().await;
        if dir.department(&department_id).is_none() {
            return Err(not_found("Department"));
        }
        let classes: Vec<EntityRef> = dir
            .classes_in(&department_id)
            .into_iter()
            .map(|c| EntityRef::new(c.id, c.name))
            .collect();
        let students: Vec<EntityRef> = dir
            .students_in_department(&department_id)
            .into_iter()
            .map(|s| EntityRef::new(s.id, s.name))
            .collect();
        (classes, students)
    };

    let report = state
        .ledger
        .validate_many(&department_id, &classes, &students)
        .await;
    if !report.all_valid() {
        tracing::warn!(department = %department_id, errors = report.errors.len(), "validation failed");
    }
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::{classes, departments, students};
    use crate::state::AppState;
    use axum::http::StatusCode;
    use bams_chain::EntityKind;

    #[tokio::test]
    async fn untouched_department_tree_is_valid() {
        let state = AppState::for_tests();
        let dept = departments::tests::create(&state, "CS").await;
        let class = classes::tests::create(&state, &dept.id, "cs-a").await;
        students::tests::create(&state, &class, "1").await;
        students::tests::create(&state, &class, "2").await;

        let Json(report) = validate_department(State(state), Path(dept.id.0.clone()))
            .await
            .unwrap();
        assert!(report.department_valid);
        assert_eq!(report.classes_valid.len(), 1);
        assert_eq!(report.students_valid.len(), 2);
        assert!(report.all_valid());
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn growing_parent_keeps_children_valid() {
        let state = AppState::for_tests();
        let dept = departments::tests::create(&state, "CS").await;
        let class = classes::tests::create(&state, &dept.id, "cs-a").await;
        departments::delete_department(State(state.clone()), Path(dept.id.0.clone()))
            .await
            .unwrap();

        let Json(report) = validate_department(State(state.clone()), Path(dept.id.0.clone()))
            .await
            .unwrap();
        assert!(report.all_valid());

        let trace = state
            .ledger
            .trace_anchor(
                &bams_chain::ChainKey::new(EntityKind::Class, class.id.clone()),
                &bams_chain::ChainKey::new(EntityKind::Department, dept.id.clone()),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trace.parent_index, Some(0));
    }

    #[tokio::test]
    async fn unknown_department_is_404() {
        let state = AppState::for_tests();
        let err = validate_department(State(state), Path("nope".into()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }
}
