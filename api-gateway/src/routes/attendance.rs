use axum::{
    Json,
    extract::{Path, State},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use bams_chain::types::block::now_millis;
use bams_chain::types::tx::ATTENDANCE;
use bams_chain::{BlockSnapshot, EntityId, EntityKind, Transaction};

use crate::directory::{Attendance, AttendanceStatus};
use crate::routes::students::student_chain;
use crate::routes::{ApiError, bad_request, ledger_error, not_found};
use crate::state::SharedState;

const DAY_MILLIS: i64 = 86_400_000;

/// Request body for `POST /api/attendance`.
///
/// `status` is taken as a plain string so that an unknown value is a 400
/// with a readable message rather than a deserialization rejection. Class
/// and department default to the student's.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendanceRequest {
    pub student_id: EntityId,
    pub class_id: Option<EntityId>,
    pub department_id: Option<EntityId>,
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendanceResponse {
    pub attendance: Attendance,
    pub blockchain_data: Vec<BlockSnapshot>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAttendanceResponse {
    pub attendance: Vec<Attendance>,
    pub blockchain_data: Vec<BlockSnapshot>,
}

/// `POST /api/attendance`
///
/// Appends an `attendance` block to the student's chain.
pub async fn mark_attendance(
    State(state): State<SharedState>,
    Json(body): Json<MarkAttendanceRequest>,
) -> Result<Json<MarkAttendanceResponse>, ApiError> {
    let status: AttendanceStatus = body
        .status
        .parse()
        .map_err(|_| bad_request("Invalid attendance status"))?;

    let chain = student_chain(&state, &body.student_id).await?;
    let mut append = chain.begin_append().await;

    let (class_id, department_id) = state
        .directory
        .read()
        .await
        .student(&body.student_id)
        .map(|s| {
            (
                body.class_id.clone().unwrap_or_else(|| s.class_id.clone()),
                body.department_id
                    .clone()
                    .unwrap_or_else(|| s.department_id.clone()),
            )
        })
        .ok_or_else(|| not_found("Student"))?;

    let date = now_millis();
    append
        .add_block(
            Transaction::new(ATTENDANCE)
                .with("studentId", body.student_id.as_str())
                .with("classId", class_id.as_str())
                .with("departmentId", department_id.as_str())
                .with("status", status.as_str())
                .with("date", date),
        )
        .await
        .map_err(ledger_error)?;
    let blockchain_data = append.chain_data();

    let attendance = {
        let mut dir = state.directory.write().await;
        let attendance = Attendance {
            id: dir.next_id(),
            student_id: body.student_id,
            class_id,
            department_id,
            status,
            date,
            blockchain_data: blockchain_data.clone(),
            created_at: date,
        };
        dir.attendance.push(attendance.clone());
        attendance
    };
    tracing::debug!(student = %attendance.student_id, %status, "attendance marked");

    Ok(Json(MarkAttendanceResponse {
        attendance,
        blockchain_data,
    }))
}

/// `GET /api/attendance/student/{student_id}`
///
/// Entries newest first, plus the student's current chain.
pub async fn attendance_by_student(
    State(state): State<SharedState>,
    Path(student_id): Path<String>,
) -> Json<StudentAttendanceResponse> {
    let student_id = EntityId::from(student_id);
    let attendance = state.directory.read().await.attendance_for(&student_id);
    let blockchain_data = state.chain_data(EntityKind::Student, &student_id).await;
    Json(StudentAttendanceResponse {
        attendance,
        blockchain_data,
    })
}

/// `GET /api/attendance/class/{class_id}/date/{date}`
///
/// Entries of one class marked on a `YYYY-MM-DD` day (UTC).
pub async fn attendance_by_class_and_date(
    State(state): State<SharedState>,
    Path((class_id, date)): Path<(String, String)>,
) -> Result<Json<Vec<Attendance>>, ApiError> {
    let (from, until) = day_window(&date).ok_or_else(|| bad_request("Invalid date"))?;
    let attendance = state
        .directory
        .read()
        .await
        .attendance_in_class(&EntityId::from(class_id), from, until);
    Ok(Json(attendance))
}

/// `GET /api/attendance/department/{department_id}/summary`
pub async fn department_summary(
    State(state): State<SharedState>,
    Path(department_id): Path<String>,
) -> Json<Vec<Attendance>> {
    let attendance = state
        .directory
        .read()
        .await
        .attendance_in_department(&EntityId::from(department_id));
    Json(attendance)
}

/// `[midnight, next midnight)` of a `YYYY-MM-DD` date, in Unix milliseconds.
///
/// Days before the epoch clamp to an empty window.
fn day_window(date: &str) -> Option<(u64, u64)> {
    let start = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)?
        .and_utc()
        .timestamp_millis();
    let end = start.checked_add(DAY_MILLIS)?;
    let clamp = |ms: i64| u64::try_from(ms).unwrap_or(0);
    Some((clamp(start), clamp(end)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Student;
    use crate::routes::{classes, departments, students};
    use crate::state::AppState;
    use axum::http::StatusCode;
    use chrono::DateTime;

    async fn enrolled(state: &SharedState) -> Student {
        let dept = departments::tests::create(state, "CS").await;
        let class = classes::tests::create(state, &dept.id, "cs-a").await;
        students::tests::create(state, &class, "CS-001").await
    }

    fn mark(student: &Student, status: &str) -> Json<MarkAttendanceRequest> {
        Json(MarkAttendanceRequest {
            student_id: student.id.clone(),
            class_id: None,
            department_id: None,
            status: status.to_string(),
        })
    }

    #[tokio::test]
    async fn attendance_lands_on_student_chain() {
        let state = AppState::for_tests();
        let student = enrolled(&state).await;

        let Json(resp) = mark_attendance(State(state.clone()), mark(&student, "Present"))
            .await
            .unwrap();
        assert_eq!(resp.attendance.status, AttendanceStatus::Present);
        assert_eq!(resp.attendance.class_id, student.class_id);
        assert_eq!(resp.blockchain_data.len(), 2);
        let tx = &resp.blockchain_data[1].transactions[0];
        assert_eq!(tx.tx_type(), Some(ATTENDANCE));
        assert_eq!(tx.get("status").and_then(|v| v.as_str()), Some("Present"));

        mark_attendance(State(state.clone()), mark(&student, "Leave"))
            .await
            .unwrap();
        let Json(history) =
            attendance_by_student(State(state.clone()), Path(student.id.0.clone())).await;
        assert_eq!(history.attendance.len(), 2);
        assert_eq!(history.blockchain_data.len(), 3);
        assert!(history.attendance[0].date >= history.attendance[1].date);
    }

    #[tokio::test]
    async fn invalid_status_is_400_and_appends_nothing() {
        let state = AppState::for_tests();
        let student = enrolled(&state).await;

        let err = mark_attendance(State(state.clone()), mark(&student, "Late"))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert_eq!(err.1, "Invalid attendance status");
        assert_eq!(state.chain_data(EntityKind::Student, &student.id).await.len(), 1);
    }

    #[tokio::test]
    async fn unknown_student_is_404() {
        let state = AppState::for_tests();
        let err = mark_attendance(
            State(state),
            Json(MarkAttendanceRequest {
                student_id: "ghost".into(),
                class_id: None,
                department_id: None,
                status: "Absent".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    fn day_of(millis: u64) -> String {
        DateTime::from_timestamp_millis(millis as i64)
            .unwrap()
            .format("%Y-%m-%d")
            .to_string()
    }

    #[test]
    fn day_window_covers_one_utc_day() {
        assert_eq!(
            day_window("2024-01-15"),
            Some((1_705_276_800_000, 1_705_363_200_000))
        );
        assert_eq!(day_window("1969-12-31"), Some((0, 0)));
        assert_eq!(day_window("2024-02-30"), None);
        assert_eq!(day_window("15-01-2024"), None);
        assert_eq!(day_window("2024-01-15T00:00:00Z"), None);
    }

    #[tokio::test]
    async fn class_attendance_is_filtered_by_day() {
        let state = AppState::for_tests();
        let student = enrolled(&state).await;
        let Json(marked) = mark_attendance(State(state.clone()), mark(&student, "Absent"))
            .await
            .unwrap();
        let day = day_of(marked.attendance.date);

        let Json(same_day) = attendance_by_class_and_date(
            State(state.clone()),
            Path((student.class_id.0.clone(), day)),
        )
        .await
        .unwrap();
        assert_eq!(same_day.len(), 1);
        assert_eq!(same_day[0].id, marked.attendance.id);

        let Json(next_day) = attendance_by_class_and_date(
            State(state.clone()),
            Path((
                student.class_id.0.clone(),
                day_of(marked.attendance.date + DAY_MILLIS as u64),
            )),
        )
        .await
        .unwrap();
        assert!(next_day.is_empty());

        let Json(other_class) = attendance_by_class_and_date(
            State(state.clone()),
            Path(("other".into(), day_of(marked.attendance.date))),
        )
        .await
        .unwrap();
        assert!(other_class.is_empty());
    }

    #[tokio::test]
    async fn malformed_date_is_400() {
        let state = AppState::for_tests();
        let err = attendance_by_class_and_date(
            State(state),
            Path(("c1".into(), "yesterday".into())),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert_eq!(err.1, "Invalid date");
    }

    #[tokio::test]
    async fn department_summary_lists_unpopulated_entries() {
        let state = AppState::for_tests();
        let student = enrolled(&state).await;
        for status in ["Present", "Absent"] {
            mark_attendance(State(state.clone()), mark(&student, status))
                .await
                .unwrap();
        }
        let other = departments::tests::create(&state, "EE").await;

        let Json(summary) =
            department_summary(State(state.clone()), Path(student.department_id.0.clone())).await;
        assert_eq!(summary.len(), 2);
        assert!(summary.iter().all(|a| a.student_id == student.id));
        let json = serde_json::to_value(&summary[0]).unwrap();
        assert_eq!(json["studentId"], student.id.as_str());

        let Json(empty) = department_summary(State(state), Path(other.id.0.clone())).await;
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn unknown_student_history_is_empty() {
        let state = AppState::for_tests();
        let Json(history) = attendance_by_student(State(state), Path("ghost".into())).await;
        assert!(history.attendance.is_empty());
        assert!(history.blockchain_data.is_empty());
    }
}
