#![allow(clippy::unwrap_used)] // Integration tests use unwrap for brevity

//! End-to-end reservation flows against a real `SQLite` database.

use std::collections::BTreeSet;

use labres_registry::{
    AddOutcome, NewMachine, Registry, RegistryDatabase, ReleaseOutcome, ReserveOutcome,
};

async fn registry() -> Registry<RegistryDatabase> {
    Registry::new(RegistryDatabase::open_in_memory().await.unwrap())
}

#[tokio::test]
async fn grouped_machine_lifecycle() {
    let reg = registry().await;
    assert_eq!(
        reg.add(&NewMachine::named("alpha").with_group("beta"))
            .await
            .unwrap(),
        AddOutcome::Added
    );

    assert_eq!(
        reg.reserve("alpha", "carol").await.unwrap(),
        ReserveOutcome::Forbidden {
            group: "beta".into()
        }
    );

    reg.associate("carol", "beta").await.unwrap();
    assert_eq!(
        reg.reserve("alpha", "carol").await.unwrap(),
        ReserveOutcome::Reserved
    );
    assert_eq!(
        reg.get_info("alpha").await.unwrap().unwrap().user.as_deref(),
        Some("carol")
    );

    assert_eq!(
        reg.reserve("alpha", "dave").await.unwrap(),
        ReserveOutcome::AlreadyReserved {
            holder: "carol".into()
        }
    );

    assert_eq!(reg.release("alpha").await.unwrap(), ReleaseOutcome::Released);
    assert!(
        reg.list_available()
            .await
            .unwrap()
            .contains(&"alpha".to_string())
    );
}

#[tokio::test]
async fn available_and_reserved_partition_all() {
    let reg = registry().await;
    for name in ["m1", "m2", "m3", "m4", "m5", "m6"] {
        reg.add(&NewMachine::named(name)).await.unwrap();
    }
    reg.add(&NewMachine::named("g1").with_group("lab"))
        .await
        .unwrap();

    let steps: [(&str, &str); 5] = [
        ("m2", "carol"),
        ("m5", "dave"),
        ("g1", "dave"),
        ("m2", "erin"),
        ("m6", "carol"),
    ];

    for (machine, user) in steps {
        reg.reserve(machine, user).await.unwrap();
        check_partition(&reg).await;
    }

    reg.release("m2").await.unwrap();
    check_partition(&reg).await;
    reg.remove("m5").await.unwrap();
    check_partition(&reg).await;

    assert_eq!(reg.list_reserved().await.unwrap(), vec!["m6"]);
    assert_eq!(reg.list_users().await.unwrap(), vec!["carol"]);
    assert_eq!(reg.list_by_user("carol").await.unwrap(), vec!["m6"]);
}

async fn check_partition(reg: &Registry<RegistryDatabase>) {
    let all: BTreeSet<String> = reg.list_all().await.unwrap().into_iter().collect();
    let available: BTreeSet<String> = reg.list_available().await.unwrap().into_iter().collect();
    let reserved: BTreeSet<String> = reg.list_reserved().await.unwrap().into_iter().collect();

    assert!(available.is_disjoint(&reserved));
    let union: BTreeSet<String> = available.union(&reserved).cloned().collect();
    assert_eq!(union, all);
}

#[tokio::test]
async fn concurrent_reservations_have_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let db = RegistryDatabase::open(&dir.path().join("registry.db"))
        .await
        .unwrap();
    let reg = Registry::new(db);
    reg.add(&NewMachine::named("alpha")).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..16 {
        let reg = reg.clone();
        tasks.push(tokio::spawn(async move {
            let user = format!("user{i}");
            let outcome = reg.reserve("alpha", &user).await.unwrap();
            (user, outcome)
        }));
    }

    let mut winners = Vec::new();
    for task in tasks {
        let (user, outcome) = task.await.unwrap();
        match outcome {
            ReserveOutcome::Reserved => winners.push(user),
            ReserveOutcome::AlreadyReserved { .. } => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(
        reg.get_info("alpha").await.unwrap().unwrap().user,
        Some(winners[0].clone())
    );
}

#[tokio::test]
async fn reservations_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.db");

    {
        let reg = Registry::new(RegistryDatabase::open(&path).await.unwrap());
        reg.add(&NewMachine::named("alpha").with_id("7"))
            .await
            .unwrap();
        reg.reserve("alpha", "carol").await.unwrap();
        reg.store().pool().close().await;
    }

    let reg = Registry::new(RegistryDatabase::open(&path).await.unwrap());
    let info = reg.get_info("alpha").await.unwrap().unwrap();
    assert_eq!(info.user.as_deref(), Some("carol"));
    assert_eq!(info.id.as_deref(), Some("7"));
}
