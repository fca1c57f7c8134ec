use chrono::NaiveDate;

use ownerlog::{
    dates::{DateParseError, extract_calendar_date, format_date, parse_date},
    owner::{OwnershipPatch, OwnershipRecord},
    wire::{AddOwnershipRequest, UpdateOwnershipRequest, parse_rows},
};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[test]
fn timestamps_keep_their_own_calendar_day() {
    let cases = [
        ("2024-03-15", day(2024, 3, 15)),
        ("2024-03-15T23:30:00-05:00", day(2024, 3, 15)),
        ("2024-03-15T00:30:00+09:00", day(2024, 3, 15)),
        ("2024-03-15 23:59:59", day(2024, 3, 15)),
        ("  2024-03-15T00:00:00.000Z  ", day(2024, 3, 15)),
        ("Fri, 15 Mar 2024 23:30:00 -0500", day(2024, 3, 15)),
    ];
    for (raw, expected) in cases {
        assert_eq!(extract_calendar_date(raw), Ok(expected), "input {raw:?}");
    }
}

#[test]
fn bad_dates_are_classified() {
    assert_eq!(extract_calendar_date("   "), Err(DateParseError::Empty));
    assert_eq!(
        extract_calendar_date("2024-02-30"),
        Err(DateParseError::OutOfRange("2024-02-30".to_string()))
    );
    assert_eq!(
        extract_calendar_date("last tuesday"),
        Err(DateParseError::Unrecognized("last tuesday".to_string()))
    );
}

#[test]
fn strict_parse_rejects_timestamps() {
    assert_eq!(parse_date("2024-01-10"), Ok(day(2024, 1, 10)));
    assert!(matches!(
        parse_date("2024-01-10T00:00:00Z"),
        Err(DateParseError::Unrecognized(_))
    ));
    assert_eq!(parse_date(""), Err(DateParseError::Empty));
    assert_eq!(format_date(day(2024, 1, 5)), "2024-01-05");
}

#[test]
fn rows_accept_timestamps_nulls_and_tinyint_flags() {
    let body = r#"[
        {
            "id": 11,
            "gemstone_id": 3,
            "owner_name": "Ada",
            "owner_phone": "555-0100",
            "owner_email": "",
            "ownership_start_date": "2021-04-01T00:00:00.000Z",
            "ownership_end_date": "2022-08-15T00:00:00.000Z",
            "is_current_owner": 0
        },
        {
            "id": 12,
            "gemstone_id": 3,
            "owner_name": "Ben",
            "owner_phone": "555-0101",
            "notes": "appraised",
            "ownership_start_date": "2022-08-15",
            "ownership_end_date": null,
            "is_current_owner": 1
        },
        {
            "id": 13,
            "gemstone_id": 3,
            "owner_name": "Cy",
            "ownership_start_date": "2020-01-01",
            "ownership_end_date": "",
            "is_current_owner": false
        }
    ]"#;

    let rows = parse_rows(body).expect("rows");
    assert_eq!(rows.len(), 3);

    let ada = &rows[0];
    assert_eq!(ada.ownership_start_date, day(2021, 4, 1));
    assert_eq!(ada.ownership_end_date, Some(day(2022, 8, 15)));
    assert_eq!(ada.owner_email, None);
    assert!(!ada.is_current_owner);

    let ben = &rows[1];
    assert!(ben.is_current_owner);
    assert_eq!(ben.ownership_end_date, None);
    assert_eq!(ben.notes.as_deref(), Some("appraised"));

    let cy = &rows[2];
    assert_eq!(cy.owner_phone, "");
    assert_eq!(cy.ownership_end_date, None);
}

#[test]
fn malformed_row_dates_fail_the_whole_body() {
    let body = r#"[{"id": 1, "gemstone_id": 1, "owner_name": "X", "ownership_start_date": "soon"}]"#;
    let err = parse_rows(body).expect_err("bad date");
    assert!(err.to_string().contains("unrecognized date"));
}

#[test]
fn transfer_requests_drop_the_end_date() {
    let request = AddOwnershipRequest {
        owner_name: "Ben".to_string(),
        owner_phone: "555-0101".to_string(),
        owner_email: Some("  ".to_string()),
        owner_address: None,
        ownership_start_date: day(2024, 3, 1),
        ownership_end_date: Some(day(2024, 9, 1)),
        notes: None,
        is_transfer: true,
    };

    let json = serde_json::to_value(&request).expect("json");
    assert_eq!(json["ownership_start_date"], "2024-03-01");
    assert_eq!(json["is_transfer"], true);

    let (draft, transfer) = request.into_draft();
    assert!(transfer);
    assert_eq!(draft.ownership_end_date, None);
    assert_eq!(draft.owner_email, None);
}

#[test]
fn update_request_replaces_every_field() {
    let record = OwnershipRecord {
        id: 4,
        gemstone_id: 2,
        owner_name: "Ada".to_string(),
        owner_phone: "555-0100".to_string(),
        owner_email: None,
        owner_address: Some("1 Main St".to_string()),
        notes: None,
        ownership_start_date: day(2024, 1, 1),
        ownership_end_date: Some(day(2024, 2, 1)),
        is_current_owner: false,
    };

    let request = UpdateOwnershipRequest::from_record(&record);
    let json = serde_json::to_value(&request).expect("json");
    assert_eq!(json["ownership_end_date"], "2024-02-01");
    assert!(json.get("owner_email").is_none());

    let patch = request.into_patch();
    assert_eq!(patch.owner_email, Some(None));
    assert_eq!(patch.is_current_owner, None);

    let mut applied = record.clone();
    patch.apply_to(&mut applied);
    assert_eq!(applied, record);
}

#[test]
fn patch_json_distinguishes_absent_from_null() {
    let clear: OwnershipPatch =
        serde_json::from_str(r#"{"ownership_end_date": null}"#).expect("clear");
    assert_eq!(clear.ownership_end_date, Some(None));

    let untouched: OwnershipPatch = serde_json::from_str("{}").expect("empty");
    assert_eq!(untouched.ownership_end_date, None);
    assert!(untouched.is_empty());

    let text = serde_json::to_string(&OwnershipPatch::end_date(None)).expect("serialize");
    assert_eq!(text, r#"{"ownership_end_date":null}"#);
}
