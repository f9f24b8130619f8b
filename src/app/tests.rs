use super::*;
use crate::error::SubmissionError;
use crate::model::AppConfig;
use crate::services::transport::Row;

fn state() -> AppState {
    AppState::new(AppConfig::default()).unwrap()
}

fn row(id: &str, first: &str) -> Row {
    let mut r = Row {
        id: Some(id.into()),
        ..Default::default()
    };
    r.cells.insert("first_name".into(), first.into());
    r.cells.insert("last_name".into(), "Bros".into());
    r
}

fn page(n: u64, total_pages: u64, rows: Vec<Row>) -> Page {
    Page {
        page: n,
        total_pages,
        total: Some(rows.len() as u64),
        rows,
    }
}

fn fetched(st: &mut AppState, p: Page) -> Vec<Effect> {
    let entity = st.listing.entity.clone();
    let n = st.listing.page;
    update(
        st,
        AppMsg::Fetched {
            entity,
            page: n,
            result: Ok(p),
        },
    )
}

fn has_fetch(effects: &[Effect], entity: &str, n: u64) -> bool {
    effects.iter().any(|e| {
        matches!(e, Effect::FetchPage { entity: en, page } if en == entity && *page == n)
    })
}

fn toast_text(effects: &[Effect]) -> Option<&str> {
    effects.iter().find_map(|e| match e {
        Effect::ShowToast { text, .. } => Some(text.as_str()),
        _ => None,
    })
}

#[test]
fn switching_tab_resets_listing_and_fetches_first_page() {
    let mut st = state();
    st.listing.page = 3;
    let effects = update(&mut st, AppMsg::SwitchTab(0));
    assert!(has_fetch(&effects, "address", 0));
    assert_eq!(st.dispatcher.entity(), "address");
    assert!(st.listing.loading);
    // Same tab again is a no-op.
    assert!(update(&mut st, AppMsg::SwitchTab(0)).is_empty());
}

#[test]
fn fetched_rows_drive_selection() {
    let mut st = state();
    let _ = fetched(&mut st, page(0, 2, vec![row("p1", "Mario"), row("p2", "Luigi")]));
    assert!(!st.listing.loading);
    assert_eq!(st.dispatcher.selected().and_then(|r| r.id.as_deref()), Some("p1"));
    let _ = update(&mut st, AppMsg::MoveSelection(5));
    assert_eq!(st.listing.selected, 1);
    assert_eq!(st.dispatcher.selected().and_then(|r| r.id.as_deref()), Some("p2"));
    let _ = update(&mut st, AppMsg::MoveSelection(-9));
    assert_eq!(st.listing.selected, 0);
}

#[test]
fn stale_pages_are_dropped() {
    let mut st = state();
    let _ = update(&mut st, AppMsg::SwitchTab(0));
    let effects = update(
        &mut st,
        AppMsg::Fetched {
            entity: "person".into(),
            page: 0,
            result: Ok(page(0, 1, vec![row("p1", "Mario")])),
        },
    );
    assert!(effects.is_empty());
    assert!(st.listing.rows.is_empty());
    assert!(st.listing.loading);
}

#[test]
fn page_changes_stay_in_range() {
    let mut st = state();
    let _ = fetched(&mut st, page(0, 2, vec![row("p1", "Mario")]));
    assert!(update(&mut st, AppMsg::ChangePage(-1)).is_empty());
    let effects = update(&mut st, AppMsg::ChangePage(1));
    assert!(has_fetch(&effects, "person", 1));
    assert!(update(&mut st, AppMsg::ChangePage(1)).is_empty());
}

#[test]
fn fetch_failure_surfaces_backend_message() {
    let mut st = state();
    let effects = update(
        &mut st,
        AppMsg::Fetched {
            entity: "person".into(),
            page: 0,
            result: Err(SubmissionError::Server {
                status: Some(500),
                message: "database offline".into(),
            }),
        },
    );
    assert_eq!(toast_text(&effects), Some("database offline"));
    assert_eq!(st.listing.error.as_deref(), Some("database offline"));
}

#[test]
fn update_opens_selected_row_and_cat_is_refused() {
    let mut st = state();
    let effects = update(&mut st, AppMsg::OpenUpdate);
    assert_eq!(toast_text(&effects), Some("no row selected"));
    let _ = fetched(&mut st, page(0, 1, vec![row("p1", "Mario")]));
    let effects = update(&mut st, AppMsg::OpenCat);
    assert_eq!(
        toast_text(&effects),
        Some("Operator not yet supported for this table.")
    );
    let effects = update(&mut st, AppMsg::OpenUpdate);
    assert!(effects.is_empty());
    let tree = st.board.render().unwrap();
    assert_eq!(tree.title, "Update Person");
    assert_eq!(tree.target.path, "/update_person?oid=p1");
    assert_eq!(st.form.depth(), 1);
}

#[test]
fn successful_submit_pops_toasts_and_reloads() {
    let mut st = state();
    let _ = update(&mut st, AppMsg::OpenInsert);
    for (name, value) in [
        ("first_name", "Mario"),
        ("last_name", "Mario"),
        ("emergency_contact", "5551234"),
        ("sex", "Male"),
    ] {
        let _ = update(
            &mut st,
            AppMsg::EditField {
                name: name.into(),
                value: value.into(),
            },
        );
    }
    let effects = update(&mut st, AppMsg::Submit);
    let ticket = match effects.as_slice() {
        [Effect::Submit(p)] => {
            assert_eq!(p.request.target.path, "/insert_person");
            assert_eq!(p.request.payload.get("first_name").map(String::as_str), Some("Mario"));
            assert!(!p.request.payload.contains_key("dob"));
            p.ticket
        }
        _ => panic!("expected a submit effect"),
    };
    // A second submit while in flight is refused.
    let effects = update(&mut st, AppMsg::Submit);
    assert_eq!(toast_text(&effects), Some("Submitting..."));

    let effects = update(
        &mut st,
        AppMsg::Submitted {
            ticket,
            result: Ok(SubmitResponse::Inserted {
                id: Some("p9".into()),
            }),
        },
    );
    assert_eq!(toast_text(&effects), Some("Successfully added new row!"));
    assert!(has_fetch(&effects, "person", 0));
    assert!(!st.board.is_visible());
    assert_eq!(st.form.depth(), 0);
}

#[test]
fn invalid_submit_stays_local() {
    let mut st = state();
    let _ = update(&mut st, AppMsg::OpenInsert);
    let effects = update(&mut st, AppMsg::Submit);
    assert!(effects.is_empty());
    assert_eq!(
        st.board.status().map(|s| s.text.as_str()),
        Some("Invalid input detected.")
    );
}

#[test]
fn quit_is_immediate_without_open_records() {
    let mut st = state();
    let effects = update(&mut st, AppMsg::Quit);
    assert!(matches!(effects.as_slice(), [Effect::Quit]));
}

#[test]
fn quit_with_dirty_record_waits_for_answer() {
    let mut st = state();
    let _ = update(&mut st, AppMsg::OpenInsert);
    let _ = update(
        &mut st,
        AppMsg::EditField {
            name: "first_name".into(),
            value: "Mario".into(),
        },
    );
    assert!(update(&mut st, AppMsg::Quit).is_empty());
    assert!(st.quit_after_confirm);
    assert!(update(&mut st, AppMsg::ConfirmAnswer(false)).is_empty());
    assert!(st.board.is_visible());
    assert!(!st.quit_after_confirm);

    assert!(update(&mut st, AppMsg::Quit).is_empty());
    let effects = update(&mut st, AppMsg::ConfirmAnswer(true));
    assert!(effects.iter().any(|e| matches!(e, Effect::Quit)));
    assert!(!st.board.is_visible());
}
