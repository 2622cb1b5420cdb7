//! End-to-end behaviour of `DataService` over the in-memory driver.

use std::sync::{Arc, Mutex};

use datakit::events::DataOperation;
use datakit::prelude::*;
use datakit::{
    ArgumentErrorKind, ConditionCombination, ConditionOperator, ExecuteOutput, Operand,
    ScalarOutput, Sequence, StorageErrorKind,
};
use datakit_memory::MemoryTransaction;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Member {
    #[serde(rename = "SiteId")]
    site_id: u32,
    #[serde(rename = "MemberId")]
    member_id: u64,
    #[serde(rename = "Name")]
    name: String,
}

impl Entity for Member {
    const NAME: &'static str = "Members";

    fn fields() -> &'static [FieldInfo] {
        static FIELDS: &[FieldInfo] = &[
            FieldInfo::new("SiteId", FieldType::UnsignedInteger).primary_key(true),
            FieldInfo::new("MemberId", FieldType::UnsignedBigInt).primary_key(true),
            FieldInfo::new("Name", FieldType::Text),
        ];
        FIELDS
    }
}

fn member(site_id: u32, member_id: u64, name: &str) -> Member {
    Member {
        site_id,
        member_id,
        name: name.to_string(),
    }
}

/// Delegates to a `MemoryDataAccess` and records every driver call.
#[derive(Debug, Default)]
struct Recording {
    inner: MemoryDataAccess,
    calls: Mutex<Vec<&'static str>>,
}

impl Recording {
    fn new(inner: MemoryDataAccess) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

impl DataAccess for Recording {
    type Transaction<'a>
        = MemoryTransaction<'a>
    where
        Self: 'a;

    fn primary_key(&self, name: &str) -> Result<Vec<String>> {
        self.record("primary_key");
        self.inner.primary_key(name)
    }

    fn select<T: DeserializeOwned>(
        &self,
        name: &str,
        condition: Option<&Criteria>,
        grouping: Option<&Grouping>,
        scope: Option<&str>,
        paging: Option<&mut Paging>,
        sortings: &[Sorting],
    ) -> Result<Vec<T>> {
        self.record("select");
        self.inner
            .select(name, condition, grouping, scope, paging, sortings)
    }

    fn exists(&self, name: &str, condition: Option<&Criteria>) -> Result<bool> {
        self.record("exists");
        self.inner.exists(name, condition)
    }

    fn count(
        &self,
        name: &str,
        condition: Option<&Criteria>,
        includes: Option<&str>,
    ) -> Result<u64> {
        self.record("count");
        self.inner.count(name, condition, includes)
    }

    fn increment(
        &self,
        name: &str,
        member: &str,
        condition: Option<&Criteria>,
        interval: i64,
    ) -> Result<i64> {
        self.record("increment");
        self.inner.increment(name, member, condition, interval)
    }

    fn insert(&self, name: &str, data: &DataDictionary, scope: Option<&str>) -> Result<u64> {
        self.record("insert");
        self.inner.insert(name, data, scope)
    }

    fn update(
        &self,
        name: &str,
        data: &DataDictionary,
        condition: Option<&Criteria>,
        scope: Option<&str>,
    ) -> Result<u64> {
        self.record("update");
        self.inner.update(name, data, condition, scope)
    }

    fn delete(&self, name: &str, condition: &Criteria, cascades: Option<&str>) -> Result<u64> {
        self.record("delete");
        self.inner.delete(name, condition, cascades)
    }

    fn execute<T: DeserializeOwned>(
        &self,
        name: &str,
        inputs: &DataDictionary,
    ) -> Result<ExecuteOutput<T>> {
        self.record("execute");
        self.inner.execute(name, inputs)
    }

    fn execute_scalar(&self, name: &str, inputs: &DataDictionary) -> Result<ScalarOutput> {
        self.record("execute_scalar");
        self.inner.execute_scalar(name, inputs)
    }

    fn begin(&self) -> Result<Self::Transaction<'_>> {
        self.record("begin");
        self.inner.begin()
    }
}

/// Counts reservations on top of a `MemorySequence`.
#[derive(Debug, Default)]
struct CountingSequence {
    inner: MemorySequence,
    keys: Mutex<Vec<String>>,
}

impl Sequence for CountingSequence {
    fn increment(&self, key: &str, step: i64, seed: i64) -> Result<i64> {
        self.keys.lock().unwrap().push(key.to_string());
        self.inner.increment(key, step, seed)
    }
}

fn members() -> DataService<Member, Arc<Recording>> {
    let access = MemoryDataAccess::new().with_table("Members", ["SiteId", "MemberId"]);
    DataServiceBuilder::new()
        .build(Arc::new(Recording::new(access)), &ServiceRegistry::new())
        .unwrap()
}

fn sequenced() -> (DataService<Member, Arc<Recording>>, Arc<CountingSequence>) {
    let sequence = Arc::new(CountingSequence::default());
    let registry = ServiceRegistry::new().with_sequence(sequence.clone());
    let access = MemoryDataAccess::new().with_table("Members", ["SiteId", "MemberId"]);
    let service = DataServiceBuilder::new()
        .sequence(SequenceDirective::new(["SiteId", "MemberId"]).seed(100))
        .build(Arc::new(Recording::new(access)), &registry)
        .unwrap();
    (service, sequence)
}

// ============================================================================
// Key resolution
// ============================================================================

#[test]
fn test_composite_key_resolves_to_and_singleton() {
    let service = members();
    let resolved = service.resolve_key(&keys![1, 2]).unwrap();

    assert!(resolved.singleton);
    let collection = resolved.criteria.as_collection().unwrap();
    assert_eq!(collection.combination(), ConditionCombination::And);
    assert_eq!(collection.len(), 2);

    let first = collection[0].as_condition().unwrap();
    assert_eq!(first.name(), "SiteId");
    assert_eq!(first.operator(), ConditionOperator::Equal);
    assert_eq!(first.operand(), &Operand::Single(Value::Int(1)));
    assert_eq!(collection[1].as_condition().unwrap().name(), "MemberId");
}

#[test]
fn test_four_keys_are_rejected_before_the_driver() {
    let service = members();
    let err = service.get(&keys![1, 2, 3, 4], &QueryOptions::new()).unwrap_err();

    assert_eq!(err.argument_kind(), Some(ArgumentErrorKind::TooManyKeys));
    assert!(service.access().calls().is_empty());
}

#[test]
fn test_arity_mismatch_without_strategy_is_unresolved() {
    let service = members();
    let err = service.get(&keys![1], &QueryOptions::new()).unwrap_err();

    assert_eq!(err.argument_kind(), Some(ArgumentErrorKind::UnresolvedKey));
    assert!(err.to_string().contains("Members"));
}

#[test]
fn test_get_by_composite_key_returns_single_row() {
    let service = members();
    service.insert(&member(1, 2, "alice"), None).unwrap();
    service.insert(&member(1, 3, "bob"), None).unwrap();

    let found = service.get(&keys![1, 3], &QueryOptions::new()).unwrap();
    assert_eq!(found, GetResult::Single(Some(member(1, 3, "bob"))));

    let missing = service.get(&keys![9, 9], &QueryOptions::new()).unwrap();
    assert_eq!(missing, GetResult::Single(None));
}

#[test]
fn test_search_strategy_returns_a_set() {
    let access = MemoryDataAccess::new().with_table("Members", ["SiteId", "MemberId"]);
    let service: DataService<Member, _> = DataServiceBuilder::new()
        .search_keys(
            SearchKeyMap::new()
                .key("Name", ["Name"], false)
                .default_tag("Name"),
        )
        .build(access, &ServiceRegistry::new())
        .unwrap();

    service.insert(&member(1, 1, "alice"), None).unwrap();
    service.insert(&member(2, 1, "alice"), None).unwrap();
    service.insert(&member(2, 2, "bob"), None).unwrap();

    let found = service.search("alice", &QueryOptions::new()).unwrap();
    assert!(!found.is_single());
    assert_eq!(found.into_vec().len(), 2);

    let tagged = service.search("name:bob", &QueryOptions::new()).unwrap();
    assert_eq!(tagged.into_vec(), vec![member(2, 2, "bob")]);

    let err = service.search("Email:x", &QueryOptions::new()).unwrap_err();
    assert_eq!(err.argument_kind(), Some(ArgumentErrorKind::UnresolvedKey));
}

// ============================================================================
// Sequences
// ============================================================================

#[test]
fn test_unset_sequence_field_reserves_once() {
    let (service, sequence) = sequenced();
    service.insert(&member(7, 0, "alice"), None).unwrap();

    assert_eq!(
        *sequence.keys.lock().unwrap(),
        vec!["datakit.sequence:7:memberid".to_string()]
    );
    let found = service.get(&keys![7, 101], &QueryOptions::new()).unwrap();
    assert_eq!(found.into_single(), Some(member(7, 101, "alice")));
}

#[test]
fn test_preset_sequence_field_reserves_nothing() {
    let (service, sequence) = sequenced();
    service.insert(&member(7, 55, "alice"), None).unwrap();

    assert!(sequence.keys.lock().unwrap().is_empty());
    assert!(service.exists_key(&keys![7, 55]).unwrap());
}

#[test]
fn test_sequence_value_is_visible_to_inserting_subscribers() {
    let (mut service, _) = sequenced();
    let seen = Arc::new(Mutex::new(None));
    let observed = Arc::clone(&seen);
    service.events_mut().inserting.subscribe(move |args| {
        *observed.lock().unwrap() = args.data.get("MemberId").cloned();
        Ok(())
    });

    service.insert(&member(1, 0, "alice"), None).unwrap();
    assert_eq!(*seen.lock().unwrap(), Some(Value::UBigInt(101)));
}

#[test]
fn test_insert_many_reserves_per_row() {
    let (service, sequence) = sequenced();
    let rows = vec![member(1, 0, "a"), member(1, 0, "b"), member(2, 0, "c")];

    assert_eq!(service.insert_many(&rows, None).unwrap(), 3);
    assert_eq!(sequence.keys.lock().unwrap().len(), 3);
    assert!(service.exists_key(&keys![1, 102]).unwrap());
    assert!(service.exists_key(&keys![2, 101]).unwrap());
}

// ============================================================================
// Transactions
// ============================================================================

#[test]
fn test_failed_bulk_insert_leaves_nothing_behind() {
    let service = members();
    let rows = vec![
        member(1, 1, "a"),
        member(1, 2, "b"),
        member(1, 1, "duplicate"),
        member(1, 4, "d"),
    ];

    let err = service.insert_many(&rows, None).unwrap_err();
    assert_eq!(err.storage_kind(), Some(StorageErrorKind::Conflict));
    assert_eq!(service.count(None, None).unwrap(), 0);

    let inserts = service
        .access()
        .calls()
        .iter()
        .filter(|c| **c == "insert")
        .count();
    assert_eq!(inserts, 3);
}

#[test]
fn test_bulk_insert_raises_one_event_pair() {
    let mut service = members();
    let counts = Arc::new(Mutex::new((0, 0, 0)));

    let c = Arc::clone(&counts);
    service.events_mut().many_inserting.subscribe(move |args| {
        c.lock().unwrap().0 += args.data.len();
        Ok(())
    });
    let c = Arc::clone(&counts);
    service.events_mut().inserting.subscribe(move |_| {
        c.lock().unwrap().1 += 1;
        Ok(())
    });
    let c = Arc::clone(&counts);
    service.events_mut().many_inserted.subscribe(move |args| {
        c.lock().unwrap().2 += args.count;
        Ok(())
    });

    let rows = vec![member(1, 1, "a"), member(1, 2, "b")];
    service.insert_many(&rows, None).unwrap();
    assert_eq!(*counts.lock().unwrap(), (2, 0, 2));
}

#[test]
fn test_failed_bulk_update_rolls_back() {
    let service = members();
    service
        .insert_many(&[member(1, 1, "a"), member(1, 2, "b")], None)
        .unwrap();

    let changes = vec![
        serde_json::json!({ "SiteId": 1, "MemberId": 1, "Name": "A" }),
        serde_json::json!({ "Name": "no key" }),
    ];
    let err = service.update_many(&changes, None, None).unwrap_err();
    assert!(err.is_invalid_argument());

    let first = service.get(&keys![1, 1], &QueryOptions::new()).unwrap();
    assert_eq!(first.into_single().map(|m| m.name).as_deref(), Some("a"));
}

// ============================================================================
// Event pipeline
// ============================================================================

#[test]
fn test_cancelled_getting_returns_subscriber_result() {
    let mut service = members();
    service.events_mut().getting.subscribe(|args| {
        args.cancel = true;
        args.result = Some(member(0, 0, "cached"));
        Ok(())
    });

    let found = service.get(&keys![1, 2], &QueryOptions::new()).unwrap();
    assert_eq!(found.into_single(), Some(member(0, 0, "cached")));
    assert_eq!(service.access().calls(), vec!["primary_key"]);
}

#[test]
fn test_delete_without_condition_never_reaches_driver() {
    let service = members();
    let err = service.delete(None, None).unwrap_err();

    assert!(err.is_invalid_argument());
    assert!(service.access().calls().is_empty());
}

#[test]
fn test_deleting_subscriber_can_supply_condition() {
    let mut service = members();
    service.insert(&member(1, 1, "a"), None).unwrap();
    service.events_mut().deleting.subscribe(|args| {
        args.condition
            .get_or_insert_with(|| Condition::equal("Name", "a").into());
        Ok(())
    });

    assert_eq!(service.delete(None, None).unwrap(), 1);
}

#[test]
fn test_handler_error_aborts_operation() {
    let mut service = members();
    service.events_mut().inserting.subscribe(|args| {
        if args.data.get("Name").and_then(Value::as_str) == Some("") {
            return Err(Error::missing("Name"));
        }
        Ok(())
    });

    let err = service.insert(&member(1, 1, ""), None).unwrap_err();
    assert_eq!(err.argument_kind(), Some(ArgumentErrorKind::Missing));
    assert!(!service.access().calls().contains(&"insert"));
}

#[test]
fn test_failed_event_sees_driver_error_which_still_propagates() {
    let mut service = members();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let observed = Arc::clone(&seen);
    service.events_mut().failed.subscribe(move |args| {
        observed.lock().unwrap().push(args.operation);
    });

    let err = service.execute_scalar("Missing", DataDictionary::new()).unwrap_err();
    assert_eq!(err.storage_kind(), Some(StorageErrorKind::NotFound));
    assert_eq!(*seen.lock().unwrap(), vec![DataOperation::ExecuteScalar]);
}

#[test]
fn test_selected_subscriber_filters_rows() {
    let mut service = members();
    service
        .insert_many(&[member(1, 1, "a"), member(1, 2, "b")], None)
        .unwrap();
    service.events_mut().selected.subscribe(|args| {
        args.result.retain(|m| m.name != "a");
        Ok(())
    });

    let rows = service
        .select(Some(Condition::equal("SiteId", 1).into()), &QueryOptions::new())
        .unwrap();
    assert_eq!(rows, vec![member(1, 2, "b")]);
}

// ============================================================================
// Ranges
// ============================================================================

#[test]
fn test_parsed_range_selects_rows() {
    let service = members();
    service
        .insert_many(
            &[member(1, 1, "a"), member(1, 5, "b"), member(1, 9, "c")],
            None,
        )
        .unwrap();

    let range = ConditionalRange::try_parse::<u64>("(2 ~ 8)").unwrap().unwrap();
    let condition = range.to_condition("MemberId").unwrap();
    assert_eq!(condition.operator(), ConditionOperator::Between);

    let rows = service
        .select(Some(condition.into()), &QueryOptions::new())
        .unwrap();
    assert_eq!(rows, vec![member(1, 5, "b")]);
}

#[test]
fn test_range_text_forms() {
    assert!(ConditionalRange::try_parse::<i32>("").is_err());
    assert!(ConditionalRange::try_parse::<i32>("   ").is_err());
    assert_eq!(ConditionalRange::try_parse::<i32>("(~)").unwrap(), None);

    let from_only = ConditionalRange::parse::<i32>("(10~)").unwrap();
    assert_eq!(from_only.to_string(), "(10)");
    assert_eq!(ConditionalRange::parse::<i32>(&from_only.to_string()), Some(from_only));
}
