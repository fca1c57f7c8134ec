use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use chrono::NaiveDate;

use ownerlog::{
    core::store::OwnershipStore,
    interval::{CascadeKind, ChainViolation, DateError, IntervalError},
    owner::OwnershipRecord,
    persist::PersistError,
    runtime::handle::{LedgerHandle, RuntimeConfig, RuntimeError, spawn_ledger},
    service::{OwnershipApi, OwnershipEditor, OwnershipForm, SubmitError},
    types::{GemstoneId, OwnershipId},
    wire::{AddOwnershipRequest, UpdateOwnershipRequest},
};

const GEM: GemstoneId = 7;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn form(name: &str, start: NaiveDate, end: Option<NaiveDate>) -> OwnershipForm {
    OwnershipForm {
        owner_name: name.to_string(),
        owner_phone: "555-0100".to_string(),
        start: Some(start),
        end,
        ..OwnershipForm::default()
    }
}

/// Ledger-backed api that counts writes and can be told to fail.
#[derive(Clone)]
struct ScriptedApi {
    inner: LedgerHandle,
    writes: Arc<AtomicUsize>,
    failing_updates: Arc<Mutex<HashSet<OwnershipId>>>,
    list_down: Arc<AtomicBool>,
    adds_down: Arc<AtomicBool>,
}

impl ScriptedApi {
    fn new() -> Self {
        Self {
            inner: spawn_ledger(OwnershipStore::new(), None, RuntimeConfig::default()),
            writes: Arc::new(AtomicUsize::new(0)),
            failing_updates: Arc::new(Mutex::new(HashSet::new())),
            list_down: Arc::new(AtomicBool::new(false)),
            adds_down: Arc::new(AtomicBool::new(false)),
        }
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn fail_updates_of(&self, id: OwnershipId) {
        self.failing_updates.lock().expect("lock").insert(id);
    }
}

fn injected() -> RuntimeError {
    RuntimeError::Persist(PersistError::Message("injected failure".to_string()))
}

impl OwnershipApi for ScriptedApi {
    type Error = RuntimeError;

    async fn list(&self, gemstone: GemstoneId) -> Result<Vec<OwnershipRecord>, RuntimeError> {
        if self.list_down.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.list(gemstone).await
    }

    async fn add(
        &self,
        gemstone: GemstoneId,
        request: AddOwnershipRequest,
    ) -> Result<OwnershipId, RuntimeError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.adds_down.load(Ordering::SeqCst) {
            return Err(injected());
        }
        OwnershipApi::add(&self.inner, gemstone, request).await
    }

    async fn update(
        &self,
        id: OwnershipId,
        request: UpdateOwnershipRequest,
    ) -> Result<OwnershipRecord, RuntimeError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_updates.lock().expect("lock").contains(&id);
        if failing {
            return Err(injected());
        }
        OwnershipApi::update(&self.inner, id, request).await
    }
}

/// A(1/1..2/1), B(2/1..3/1), C(3/1..) built through transfers.
async fn three_owner_editor(api: ScriptedApi) -> (OwnershipEditor<ScriptedApi>, [OwnershipId; 3]) {
    let mut editor = OwnershipEditor::load(api, GEM)
        .await
        .expect("load")
        .with_today(day(2024, 6, 1));
    let a = editor
        .submit_add(&form("Ada", day(2024, 1, 1), None), true)
        .await
        .expect("a");
    let b = editor
        .submit_add(&form("Ben", day(2024, 2, 1), None), true)
        .await
        .expect("b");
    let c = editor
        .submit_add(&form("Cy", day(2024, 3, 1), None), true)
        .await
        .expect("c");
    (editor, [a, b, c])
}

#[tokio::test]
async fn transfers_and_historical_adds_build_a_contiguous_chain() {
    let api = ScriptedApi::new();
    let mut editor = OwnershipEditor::load(api.clone(), GEM)
        .await
        .expect("load")
        .with_today(day(2024, 6, 1));
    assert!(editor.chain().is_empty());
    assert!(editor.add_constraints(true).is_unbounded());

    let first = editor
        .submit_add(&form("Ada", day(2024, 1, 10), None), true)
        .await
        .expect("first owner");
    let second = editor
        .submit_add(&form("Ben", day(2024, 3, 1), Some(day(2024, 4, 1))), true)
        .await
        .expect("transfer");

    let closed = editor.chain().get(first).expect("first");
    assert_eq!(closed.ownership_end_date, Some(day(2024, 3, 1)));
    let current = editor.chain().current_owner().expect("current");
    assert_eq!(current.id, second);
    assert_eq!(current.ownership_end_date, None);

    let bounds = editor.add_constraints(false);
    assert_eq!(bounds.max_start_date, Some(day(2024, 1, 10)));
    assert_eq!(bounds.max_end_date, Some(day(2024, 1, 10)));

    let old = editor
        .submit_add(&form("Cy", day(2023, 2, 1), Some(day(2024, 1, 10))), false)
        .await
        .expect("historical");

    let ids: Vec<_> = editor.chain().records().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![old, first, second]);
    assert!(editor.chain().violations().is_empty());

    api.inner.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn invalid_forms_never_reach_the_api() {
    let api = ScriptedApi::new();
    let (mut editor, [a, ..]) = three_owner_editor(api.clone()).await;
    let writes = api.writes();

    let err = editor
        .submit_add(&form("Early", day(2024, 2, 15), None), true)
        .await
        .expect_err("transfer before current start");
    match err {
        SubmitError::Invalid(errors) => {
            assert_eq!(errors.start, Some(DateError::StartBeforeMin(day(2024, 3, 1))));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }

    let err = editor
        .submit_add(&form("Lost", day(2023, 1, 1), None), false)
        .await
        .expect_err("historical without end");
    assert!(matches!(
        err,
        SubmitError::Invalid(ref errors) if errors.end == Some(DateError::EndRequired)
    ));

    let mut edit = OwnershipForm::from_record(editor.chain().get(a).expect("a"));
    edit.end = None;
    let err = editor.submit_edit(a, &edit).await.expect_err("former owner without end");
    assert!(matches!(err, SubmitError::Invalid(_)));

    let err = editor
        .submit_edit(999, &form("Ghost", day(2024, 1, 1), None))
        .await
        .expect_err("unknown record");
    assert!(matches!(
        err,
        SubmitError::Interval(IntervalError::UnknownRecord(999))
    ));

    assert_eq!(api.writes(), writes);
    api.inner.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn edit_cascades_to_both_neighbors() {
    let api = ScriptedApi::new();
    let (mut editor, [a, b, c]) = three_owner_editor(api.clone()).await;

    let bounds = editor.edit_constraints(b).expect("bounds");
    assert_eq!(bounds.min_start_date, Some(day(2024, 1, 1)));
    assert_eq!(bounds.max_start_date, Some(day(2024, 3, 1)));
    assert_eq!(bounds.max_end_date, Some(day(2024, 3, 1)));

    let mut edit = OwnershipForm::from_record(editor.chain().get(b).expect("b"));
    edit.start = Some(day(2024, 2, 10));
    edit.end = Some(day(2024, 2, 25));

    let outcome = editor.submit_edit(b, &edit).await.expect("edit");
    assert_eq!(outcome.record.ownership_start_date, day(2024, 2, 10));
    assert!(outcome.failed.is_empty());
    let moved: Vec<_> = outcome.cascaded.iter().map(|u| (u.target, u.kind)).collect();
    assert_eq!(
        moved,
        vec![(a, CascadeKind::PreviousEnd), (c, CascadeKind::NextStart)]
    );

    let chain = editor.chain();
    assert!(chain.violations().is_empty(), "{:?}", chain.violations());
    assert_eq!(chain.get(a).and_then(|r| r.ownership_end_date), Some(day(2024, 2, 10)));
    assert_eq!(chain.get(c).map(|r| r.ownership_start_date), Some(day(2024, 2, 25)));
    assert_eq!(chain.current_owner().map(|r| r.id), Some(c));

    api.inner.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn failed_cascade_keeps_the_primary_edit() {
    let api = ScriptedApi::new();
    let (mut editor, [a, b, c]) = three_owner_editor(api.clone()).await;
    api.fail_updates_of(a);

    let mut edit = OwnershipForm::from_record(editor.chain().get(b).expect("b"));
    edit.start = Some(day(2024, 2, 10));
    edit.end = Some(day(2024, 2, 25));

    let outcome = editor.submit_edit(b, &edit).await.expect("primary edit commits");
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].target, a);
    assert_eq!(outcome.cascaded.len(), 1);
    assert_eq!(outcome.cascaded[0].target, c);

    let chain = editor.chain();
    assert_eq!(chain.get(b).map(|r| r.ownership_start_date), Some(day(2024, 2, 10)));
    assert_eq!(chain.get(a).and_then(|r| r.ownership_end_date), Some(day(2024, 2, 1)));
    assert!(chain.violations().contains(&ChainViolation::Gap { before: a, after: b }));

    api.inner.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn failed_primary_edit_aborts_before_any_cascade() {
    let api = ScriptedApi::new();
    let (mut editor, [a, b, c]) = three_owner_editor(api.clone()).await;
    api.fail_updates_of(b);
    let chain_before = editor.chain().clone();
    let writes = api.writes();

    let mut edit = OwnershipForm::from_record(editor.chain().get(b).expect("b"));
    edit.start = Some(day(2024, 2, 10));
    edit.end = Some(day(2024, 2, 25));

    let err = editor.submit_edit(b, &edit).await.expect_err("primary update fails");
    assert!(matches!(err, SubmitError::Remote(_)));
    assert_eq!(api.writes(), writes + 1, "no cascade may follow a failed primary edit");
    assert_eq!(editor.chain(), &chain_before);
    assert!(!editor.is_stale());

    let prev = api.inner.get(a).await.expect("get").expect("a");
    assert_eq!(prev.ownership_end_date, Some(day(2024, 2, 1)));
    let next = api.inner.get(c).await.expect("get").expect("c");
    assert_eq!(next.ownership_start_date, day(2024, 3, 1));
    let edited = api.inner.get(b).await.expect("get").expect("b");
    assert_eq!(edited.ownership_start_date, day(2024, 2, 1));

    api.failing_updates.lock().expect("lock").clear();
    let outcome = editor.submit_edit(b, &edit).await.expect("resubmitted form");
    assert_eq!(outcome.cascaded.len(), 2);
    assert!(editor.chain().violations().is_empty());

    api.inner.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn failed_primary_add_leaves_the_chain_untouched() {
    let api = ScriptedApi::new();
    let (mut editor, [.., c]) = three_owner_editor(api.clone()).await;
    api.adds_down.store(true, Ordering::SeqCst);
    let chain_before = editor.chain().clone();

    let transfer = form("Dee", day(2024, 4, 1), None);
    let err = editor
        .submit_add(&transfer, true)
        .await
        .expect_err("primary add fails");
    assert!(matches!(err, SubmitError::Remote(_)));
    assert_eq!(editor.chain(), &chain_before);
    assert_eq!(api.inner.list(GEM).await.expect("list").len(), 3);

    api.adds_down.store(false, Ordering::SeqCst);
    let d = editor.submit_add(&transfer, true).await.expect("resubmitted form");
    assert_eq!(editor.chain().current_owner().map(|r| r.id), Some(d));
    assert_eq!(
        editor.chain().get(c).and_then(|r| r.ownership_end_date),
        Some(day(2024, 4, 1))
    );

    api.inner.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn failed_refetch_marks_the_editor_stale_until_next_submit() {
    let api = ScriptedApi::new();
    let mut editor = OwnershipEditor::load(api.clone(), GEM)
        .await
        .expect("load")
        .with_today(day(2024, 6, 1));

    api.list_down.store(true, Ordering::SeqCst);
    let first = editor
        .submit_add(&form("Ada", day(2024, 1, 1), None), true)
        .await
        .expect("add commits even if refetch fails");
    assert!(editor.is_stale());
    assert!(editor.chain().is_empty());

    let err = editor
        .submit_add(&form("Ben", day(2024, 2, 1), None), true)
        .await
        .expect_err("stale editor cannot refresh");
    assert!(matches!(err, SubmitError::Remote(_)));
    assert_eq!(api.writes(), 1);

    api.list_down.store(false, Ordering::SeqCst);
    editor
        .submit_add(&form("Ben", day(2024, 2, 1), None), true)
        .await
        .expect("transfer after refresh");
    assert!(!editor.is_stale());
    assert_eq!(
        editor.chain().get(first).and_then(|r| r.ownership_end_date),
        Some(day(2024, 2, 1))
    );

    api.inner.shutdown().await.expect("shutdown");
}
