//! Services built from JSON configuration and shared across threads.

use std::sync::Arc;
use std::thread;

use datakit::prelude::*;
use datakit::ArgumentErrorKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Ticket {
    #[serde(rename = "Namespace")]
    namespace: String,
    #[serde(rename = "TicketId")]
    ticket_id: u64,
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Email", default)]
    email: Option<String>,
}

impl Entity for Ticket {
    const NAME: &'static str = "Tickets";

    fn fields() -> &'static [FieldInfo] {
        static FIELDS: &[FieldInfo] = &[
            FieldInfo::new("Namespace", FieldType::Text),
            FieldInfo::new("TicketId", FieldType::UnsignedBigInt).primary_key(true),
            FieldInfo::new("Title", FieldType::Text),
            FieldInfo::new("Email", FieldType::Text).nullable(true),
        ];
        FIELDS
    }
}

const CONFIG: &str = r#"{
    "name": "Help.Tickets",
    "sequences": [
        { "keys": ["Namespace", "TicketId"], "prefix": "help", "seed": 10000, "sequence": "tickets" }
    ],
    "search": {
        "keys": [
            { "tag": "Key", "fields": ["Title", "Email"], "singleton": false },
            { "tag": "Namespace", "fields": ["Namespace"] }
        ],
        "default_tag": "Key"
    }
}"#;

fn ticket(namespace: &str, title: &str) -> Ticket {
    Ticket {
        namespace: namespace.to_string(),
        ticket_id: 0,
        title: title.to_string(),
        email: None,
    }
}

fn service() -> (DataService<Ticket, MemoryDataAccess>, Arc<MemorySequence>) {
    let sequence = Arc::new(MemorySequence::new());
    let registry = ServiceRegistry::new().with_named_sequence("tickets", sequence.clone());
    let service = DataServiceBuilder::new()
        .config(DataServiceConfig::from_json(CONFIG).unwrap())
        .build(
            MemoryDataAccess::new().with_table("Help.Tickets", ["TicketId"]),
            &registry,
        )
        .unwrap();
    (service, sequence)
}

#[test]
fn test_config_drives_name_sequences_and_search() {
    let (service, sequence) = service();
    assert_eq!(service.name(), "Help.Tickets");

    service.insert(&ticket("Ops", "disk full"), None).unwrap();
    service.insert(&ticket("ops", "printer"), None).unwrap();
    assert_eq!(
        sequence.current("datakit.sequence:help:ops:ticketid"),
        Some(10002)
    );

    let found = service.search("printer", &QueryOptions::new()).unwrap();
    assert_eq!(found.into_vec()[0].ticket_id, 10002);

    let by_namespace = service
        .search("Namespace:Ops", &QueryOptions::new())
        .unwrap();
    assert_eq!(by_namespace.into_vec().len(), 1);

    let err = service.search("Namespace:", &QueryOptions::new()).unwrap_err();
    assert_eq!(err.argument_kind(), Some(ArgumentErrorKind::UnresolvedKey));
}

#[test]
fn test_config_with_unknown_sequence_fails_to_build() {
    let result = DataServiceBuilder::<Ticket>::new()
        .config(DataServiceConfig::from_json(CONFIG).unwrap())
        .build(MemoryDataAccess::new(), &ServiceRegistry::new());
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_concurrent_inserts_get_distinct_keys() {
    let (service, _) = service();
    let service = Arc::new(service);

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                for i in 0..25 {
                    service
                        .insert(&ticket("ops", &format!("{worker}-{i}")), None)
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(service.count(None, None).unwrap(), 100);
    let last = service
        .get(&keys![10100], &QueryOptions::new())
        .unwrap()
        .into_single();
    assert!(last.is_some());
}
