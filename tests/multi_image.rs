mod common;

use common::{new_session, seed_record, solid_png};
use image_workbench::error::AppError;
use image_workbench::handles::HandleSlot;
use image_workbench::workspace::WorkspaceStatus;
use serde_json::json;

#[tokio::test]
async fn add_sends_workspace_image_before_selection() {
    let mut session = new_session();
    let base = seed_record(&session, 16, 16, [10, 10, 10]);
    let first = seed_record(&session, 16, 16, [20, 20, 20]);
    let second = seed_record(&session, 16, 16, [30, 30, 30]);
    session.pick(base).expect("pick");
    session.load_into_workspace().expect("load");

    let entry = session
        .apply_multi_operation("add", &[second, first], None, None)
        .await
        .expect("add");

    assert_eq!(entry, "Applied Multiple Image Operation: Add");
    let inputs = session.service().multi_inputs();
    assert_eq!(
        inputs[0],
        vec![
            solid_png(16, 16, [10, 10, 10]),
            solid_png(16, 16, [30, 30, 30]),
            solid_png(16, 16, [20, 20, 20]),
        ]
    );
    assert_eq!(session.service().wire_payloads()[0], json!({
        "operation_type": "multi_image_operation",
        "operation": "add",
    }));
    assert_eq!(session.workspace().status(), WorkspaceStatus::Dirty);
}

#[tokio::test]
async fn picker_filters_candidates_by_workspace_dimensions() {
    let mut session = new_session();
    let base = seed_record(&session, 16, 16, [1, 1, 1]);
    let same = seed_record(&session, 16, 16, [2, 2, 2]);
    let _different = seed_record(&session, 64, 16, [3, 3, 3]);
    session.pick(base).expect("pick");
    session.load_into_workspace().expect("load");

    let candidates = session.open_picker("subtract").expect("open picker");
    let ids: Vec<i64> = candidates.iter().map(|item| item.id).collect();
    assert_eq!(ids, [base, same]);
    assert_eq!(session.handles().live_count(), 4);

    assert!(session.toggle_candidate(same).expect("toggle on"));
    let entry = session.confirm_picker(None, None).await.expect("confirm");

    assert_eq!(entry, "Applied Multiple Image Operation: Subtract");
    assert!(session.picker().is_none());
    assert!(session.handles().slot_handle(HandleSlot::Candidate(same)).is_none());
    assert_eq!(session.handles().live_count(), 2);
}

#[tokio::test]
async fn picker_on_blank_workspace_reports_missing_dimensions() {
    let mut session = new_session();
    seed_record(&session, 16, 16, [1, 1, 1]);

    let err = session.open_picker("add").unwrap_err();
    assert_eq!(err.violations(), ["Workspace image dimensions not available for this operation."]);
    assert!(session.picker().is_none());
}

#[tokio::test]
async fn cut_and_paste_sends_source_then_destination() {
    let mut session = new_session();
    let workspace_source = seed_record(&session, 8, 8, [0, 0, 0]);
    let destination = seed_record(&session, 64, 64, [200, 0, 0]);
    let source = seed_record(&session, 32, 32, [0, 200, 0]);
    session.pick(workspace_source).expect("pick");
    session.load_into_workspace().expect("load");

    let candidates = session.open_picker("cut_and_paste").expect("open picker");
    assert_eq!(candidates.len(), 3);

    session.toggle_candidate(source).expect("select source");
    session.toggle_candidate(destination).expect("select destination");
    let err = session.toggle_candidate(workspace_source).unwrap_err();
    assert_eq!(
        err.violations(),
        ["You can only select up to 2 images for the Cut and Paste operation."]
    );

    let entry = session
        .confirm_picker(Some("(0, 0, 4, 4)".to_string()), Some("1,1".to_string()))
        .await
        .expect("cut and paste");

    assert_eq!(
        entry,
        "Applied Multiple Image Operation: Cut And Paste (src region: [0, 0, 4, 4], dest position: [1, 1])"
    );
    assert_eq!(
        session.service().multi_inputs()[0],
        vec![solid_png(32, 32, [0, 200, 0]), solid_png(64, 64, [200, 0, 0])]
    );
    assert_eq!(session.service().wire_payloads()[0], json!({
        "operation_type": "multi_image_operation",
        "operation": "cut_and_paste",
        "src_region": [0, 0, 4, 4],
        "dest_position": [1, 1],
    }));
}

#[tokio::test]
async fn confirm_enforces_cardinality_and_keeps_picker_open() {
    let mut session = new_session();
    let base = seed_record(&session, 8, 8, [0, 0, 0]);
    let other = seed_record(&session, 8, 8, [9, 9, 9]);
    session.pick(base).expect("pick");
    session.load_into_workspace().expect("load");

    session.open_picker("cut_and_paste").expect("open picker");
    session.toggle_candidate(other).expect("select one");
    let err = session.confirm_picker(None, None).await.unwrap_err();
    assert_eq!(
        err.violations(),
        ["Cut and Paste operation requires exactly two images (source and destination)."]
    );
    assert!(session.picker().is_some());

    session.open_picker("add").expect("reopen picker");
    let err = session.confirm_picker(None, None).await.unwrap_err();
    assert_eq!(err.violations(), ["Please select at least one image for the add operation."]);
    assert_eq!(session.service().call_count("transform_multi"), 0);

    session.close_picker();
    assert!(matches!(session.toggle_candidate(other), Err(AppError::Validation(_))));
}

#[tokio::test]
async fn failed_multi_operation_keeps_workspace_and_picker() {
    let mut session = new_session();
    let base = seed_record(&session, 8, 8, [0, 0, 0]);
    let other = seed_record(&session, 8, 8, [9, 9, 9]);
    session.pick(base).expect("pick");
    session.load_into_workspace().expect("load");
    let before = session.workspace().triple().clone();

    session.open_picker("add").expect("open picker");
    session.toggle_candidate(other).expect("select");
    session.service().fail_transforms(true);
    let err = session.confirm_picker(None, None).await.unwrap_err();

    assert_eq!(err.code(), "transformation");
    assert_eq!(session.workspace().triple(), &before);
    assert_eq!(session.workspace().status(), WorkspaceStatus::Loaded);
    assert!(session.workspace().history().is_empty());
    assert_eq!(session.picker().map(|picker| picker.selected().to_vec()), Some(vec![other]));
}
