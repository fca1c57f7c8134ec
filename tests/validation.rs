use chrono::NaiveDate;

use ownerlog::{
    interval::{DateConstraints, DateError, OwnershipChain, ValidationContext, validate},
    owner::OwnershipRecord,
};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn rec(id: u64, start: NaiveDate, end: Option<NaiveDate>, current: bool) -> OwnershipRecord {
    OwnershipRecord {
        id,
        gemstone_id: 1,
        owner_name: format!("Owner {id}"),
        owner_phone: "555-0100".to_string(),
        owner_email: None,
        owner_address: None,
        notes: None,
        ownership_start_date: start,
        ownership_end_date: end,
        is_current_owner: current,
    }
}

#[test]
fn transfer_before_current_owner_start_is_rejected() {
    let chain = OwnershipChain::from_records(vec![rec(1, day(2024, 1, 10), None, true)]);
    let bounds = chain.add_constraints(true);
    let ctx = ValidationContext::for_add(&chain, true);

    let early = validate(Some(day(2024, 1, 5)), None, &bounds, &ctx);
    assert_eq!(early.start, Some(DateError::StartBeforeMin(day(2024, 1, 10))));
    assert_eq!(early.end, None);

    let later = validate(Some(day(2024, 1, 15)), None, &bounds, &ctx);
    assert!(later.is_empty(), "unexpected errors: {later}");
}

#[test]
fn historical_end_after_earliest_start_is_rejected() {
    let chain = OwnershipChain::from_records(vec![rec(1, day(2024, 3, 1), None, true)]);
    let bounds = chain.add_constraints(false);
    let ctx = ValidationContext::for_add(&chain, false);

    let late = validate(Some(day(2024, 1, 1)), Some(day(2024, 3, 5)), &bounds, &ctx);
    assert_eq!(late.start, None);
    assert_eq!(late.end, Some(DateError::EndAfterMax(day(2024, 3, 1))));

    let ok = validate(Some(day(2024, 1, 1)), Some(day(2024, 2, 28)), &bounds, &ctx);
    assert!(ok.is_empty(), "unexpected errors: {ok}");
}

#[test]
fn historical_add_requires_end_while_someone_owns_the_stone() {
    let chain = OwnershipChain::from_records(vec![rec(1, day(2024, 3, 1), None, true)]);
    let ctx = ValidationContext::for_add(&chain, false);
    assert!(ctx.end_required);

    let errors = validate(Some(day(2024, 1, 1)), None, &chain.add_constraints(false), &ctx);
    assert_eq!(errors.end, Some(DateError::EndRequired));

    let empty = OwnershipChain::default();
    assert!(!ValidationContext::for_add(&empty, false).end_required);
}

#[test]
fn historical_add_requires_end_even_without_a_current_owner() {
    let chain = OwnershipChain::from_records(vec![rec(
        1,
        day(2024, 3, 1),
        Some(day(2024, 6, 1)),
        false,
    )]);
    assert!(chain.current_owner().is_none());
    let ctx = ValidationContext::for_add(&chain, false);
    assert!(ctx.end_required);

    let errors = validate(Some(day(2024, 1, 1)), None, &chain.add_constraints(false), &ctx);
    assert_eq!(errors.end, Some(DateError::EndRequired));

    let ok = validate(
        Some(day(2024, 1, 1)),
        Some(day(2024, 3, 1)),
        &chain.add_constraints(false),
        &ctx,
    );
    assert!(ok.is_empty(), "unexpected errors: {ok}");
}

#[test]
fn end_on_or_before_start_is_rejected_without_bounds() {
    let unbounded = DateConstraints::default();
    let ctx = ValidationContext::default();

    for end in [day(2024, 5, 1), day(2024, 4, 30)] {
        let errors = validate(Some(day(2024, 5, 1)), Some(end), &unbounded, &ctx);
        assert_eq!(errors.end, Some(DateError::EndNotAfterStart));
    }
}

#[test]
fn end_without_start_flags_the_start_field() {
    let errors = validate(
        None,
        Some(day(2024, 5, 1)),
        &DateConstraints::default(),
        &ValidationContext::default(),
    );
    assert_eq!(errors.start, Some(DateError::StartMissingForEnd));
    assert_eq!(errors.end, None);
}

#[test]
fn missing_start_is_required() {
    let chain = OwnershipChain::default();
    let errors = validate(
        None,
        None,
        &chain.add_constraints(true),
        &ValidationContext::for_add(&chain, true),
    );
    assert_eq!(errors.start, Some(DateError::StartRequired));
}

#[test]
fn start_and_end_errors_are_reported_independently() {
    let bounds = DateConstraints {
        min_start_date: Some(day(2024, 2, 1)),
        max_start_date: None,
        min_end_date: None,
        max_end_date: Some(day(2024, 3, 1)),
    };
    let errors = validate(
        Some(day(2024, 1, 1)),
        Some(day(2024, 4, 1)),
        &bounds,
        &ValidationContext::default(),
    );
    assert_eq!(errors.start, Some(DateError::StartBeforeMin(day(2024, 2, 1))));
    assert_eq!(errors.end, Some(DateError::EndAfterMax(day(2024, 3, 1))));
    assert_eq!(errors.iter().count(), 2);
}

#[test]
fn min_end_bound_is_enforced() {
    let bounds = DateConstraints {
        min_end_date: Some(day(2024, 6, 1)),
        ..DateConstraints::default()
    };
    let errors = validate(
        Some(day(2024, 1, 1)),
        Some(day(2024, 5, 1)),
        &bounds,
        &ValidationContext::default(),
    );
    assert_eq!(errors.end, Some(DateError::EndBeforeMin(day(2024, 6, 1))));
}

#[test]
fn open_ended_contexts_ignore_the_end_date() {
    let current = rec(2, day(2024, 2, 1), None, true);
    let ctx = ValidationContext::for_edit(&current);
    assert!(ctx.open_ended);
    assert!(!ctx.end_required);

    let errors = validate(
        Some(day(2024, 2, 1)),
        Some(day(2024, 1, 1)),
        &DateConstraints::default(),
        &ctx,
    );
    assert!(errors.is_empty());
}

#[test]
fn former_owner_edit_requires_end() {
    let former = rec(1, day(2024, 1, 1), Some(day(2024, 2, 1)), false);
    let errors = validate(
        Some(day(2024, 1, 1)),
        None,
        &DateConstraints::default(),
        &ValidationContext::for_edit(&former),
    );
    assert_eq!(errors.end, Some(DateError::EndRequired));
}

#[test]
fn revalidation_yields_identical_errors() {
    let chain = OwnershipChain::from_records(vec![
        rec(1, day(2024, 1, 1), Some(day(2024, 2, 1)), false),
        rec(2, day(2024, 2, 1), None, true),
    ]);
    let bounds = chain.edit_constraints(1, day(2024, 6, 1)).expect("bounds");
    let ctx = ValidationContext::for_edit(&chain.records()[0]);

    let first = validate(Some(day(2023, 1, 1)), Some(day(2024, 3, 1)), &bounds, &ctx);
    let second = validate(Some(day(2023, 1, 1)), Some(day(2024, 3, 1)), &bounds, &ctx);
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[test]
fn messages_name_the_violated_bound() {
    assert_eq!(
        DateError::StartBeforeMin(day(2024, 1, 10)).to_string(),
        "start date cannot be before 2024-01-10"
    );
    assert_eq!(
        DateError::EndAfterMax(day(2024, 3, 1)).to_string(),
        "end date cannot be after 2024-03-01"
    );
}
