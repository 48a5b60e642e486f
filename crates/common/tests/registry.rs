//! Integration tests for registry events, id allocation and listings

mod common;

use std::collections::BTreeSet;

use ::common::identity::Identity;
use ::common::registry::RegistryEvent;
use crate::common::{alice, bob, carol, setup_test_env};

#[tokio::test]
async fn test_events_follow_ledger_changes_in_order() {
    let pipeline = setup_test_env();
    let mut events = pipeline.subscribe();

    let id = pipeline.upload(b"watched", &alice()).await.unwrap();
    pipeline.grant(id, &alice(), &bob()).await.unwrap();
    pipeline.revoke(id, &alice(), &bob()).await.unwrap();

    match events.recv().await.unwrap() {
        RegistryEvent::FileUploaded { file_id, owner, .. } => {
            assert_eq!(file_id, id);
            assert_eq!(owner, alice());
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(
        events.recv().await.unwrap(),
        RegistryEvent::FileGranted {
            file_id: id,
            owner: alice(),
            grantee: bob(),
        }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        RegistryEvent::FileGrantRevoked {
            file_id: id,
            owner: alice(),
            grantee: bob(),
        }
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_rejected_operations_emit_nothing() {
    let pipeline = setup_test_env();
    let id = pipeline.upload(b"quiet", &alice()).await.unwrap();
    pipeline.grant(id, &alice(), &bob()).await.unwrap();
    let mut events = pipeline.subscribe();

    let _ = pipeline.grant(id, &alice(), &bob()).await;
    let _ = pipeline.grant(id, &bob(), &carol()).await;
    let _ = pipeline.revoke(id, &alice(), &carol()).await;

    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_concurrent_uploads_get_distinct_monotonic_ids() {
    let pipeline = setup_test_env();

    let mut handles = Vec::new();
    for i in 0..20u8 {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            pipeline.upload(&[i; 32], &alice()).await.unwrap()
        }));
    }

    let mut ids = BTreeSet::new();
    for handle in handles {
        assert!(ids.insert(handle.await.unwrap()));
    }

    assert_eq!(ids, (1..=20).collect::<BTreeSet<_>>());
    assert_eq!(pipeline.latest_file_id().await.unwrap(), Some(20));
    assert_eq!(
        pipeline.list_owned(&alice()).await.unwrap(),
        (1..=20).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_concurrent_grant_and_revoke_on_one_file() {
    let pipeline = setup_test_env();
    let id = pipeline.upload(b"busy", &alice()).await.unwrap();
    let grantees: Vec<_> = (0..16).map(|i| Identity::from(format!("user-{}", i))).collect();

    let mut handles = Vec::new();
    for grantee in grantees.clone() {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            pipeline.grant(id, &alice(), &grantee).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(pipeline.grants(id, &alice()).await.unwrap().len(), 16);

    let mut handles = Vec::new();
    for grantee in grantees.iter().step_by(2).cloned() {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            assert!(pipeline.revoke(id, &alice(), &grantee).await.unwrap());
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let remaining = pipeline.grants(id, &alice()).await.unwrap();
    assert_eq!(remaining.len(), 8);
    for (i, grantee) in grantees.iter().enumerate() {
        let present = remaining.iter().any(|g| g.grantee == *grantee);
        assert_eq!(present, i % 2 == 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_grant_and_revoke_publish_in_commit_order() {
    let pipeline = setup_test_env();
    let id = pipeline.upload(b"contended", &alice()).await.unwrap();
    let mut events = pipeline.subscribe();

    let mut handles = Vec::new();
    for i in 0..60 {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            // losers see AlreadyGranted or a no-op revoke
            if i % 2 == 0 {
                let _ = pipeline.grant(id, &alice(), &bob()).await;
            } else {
                let _ = pipeline.revoke(id, &alice(), &bob()).await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // committed changes strictly alternate, so the published ones must too
    let mut granted = false;
    while let Ok(event) = events.try_recv() {
        match event {
            RegistryEvent::FileGranted { grantee, .. } => {
                assert_eq!(grantee, bob());
                assert!(!granted, "granted twice in a row");
                granted = true;
            }
            RegistryEvent::FileGrantRevoked { grantee, .. } => {
                assert_eq!(grantee, bob());
                assert!(granted, "revoked without a grant");
                granted = false;
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    let holds_grant = pipeline
        .grants(id, &alice())
        .await
        .unwrap()
        .iter()
        .any(|g| g.grantee == bob());
    assert_eq!(granted, holds_grant);
}

#[tokio::test]
async fn test_list_owned_is_per_owner() {
    let pipeline = setup_test_env();
    let a1 = pipeline.upload(b"a1", &alice()).await.unwrap();
    let b1 = pipeline.upload(b"b1", &bob()).await.unwrap();
    let a2 = pipeline.upload(b"a2", &alice()).await.unwrap();

    pipeline.grant(b1, &bob(), &alice()).await.unwrap();

    // shared files are not owned files
    assert_eq!(pipeline.list_owned(&alice()).await.unwrap(), vec![a1, a2]);
    assert_eq!(pipeline.list_owned(&bob()).await.unwrap(), vec![b1]);
    assert!(pipeline.list_owned(&carol()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_metadata_and_grant_listing() {
    let pipeline = setup_test_env();
    let id = pipeline.upload(b"meta", &alice()).await.unwrap();
    pipeline.grant(id, &alice(), &carol()).await.unwrap();
    pipeline.grant(id, &alice(), &bob()).await.unwrap();

    let metadata = pipeline.metadata(id).await.unwrap();
    assert_eq!(metadata.owner, alice());
    assert_eq!(metadata.grantee_count, 2);
    assert!(pipeline.exists(id).await.unwrap());
    assert!(!pipeline.exists(id + 1).await.unwrap());

    let grantees: Vec<_> = pipeline
        .grants(id, &alice())
        .await
        .unwrap()
        .into_iter()
        .map(|g| g.grantee)
        .collect();
    assert_eq!(grantees, vec![bob(), carol()]);
}
