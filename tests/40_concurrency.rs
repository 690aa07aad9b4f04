mod common;

use anyhow::Result;

use common::SYSTEM;
use vendornet::authority::{MANAGE_VENDORS, VERIFY_DOCUMENT};
use vendornet::error::NetworkError;
use vendornet::hierarchy::{NewVendor, VendorType};
use vendornet::types::Operation;
use vendornet::workflow::{DocumentStatus, VerificationRequest};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_approvals_commit_exactly_once() -> Result<()> {
    for _ in 0..25 {
        let h = common::harness();
        let chain = h.chain().await?;
        let a = h.user_with(chain.r, &[VERIFY_DOCUMENT]).await?;
        let b = h.user_with(chain.s, &[VERIFY_DOCUMENT]).await?;
        let doc = h.upload(SYSTEM, chain.c, 2).await?;
        let audited = h.audit.len().await;

        let first = {
            let network = h.network.clone();
            tokio::spawn(async move { network.apply(a, doc.id, VerificationRequest::approve(1)).await })
        };
        let second = {
            let network = h.network.clone();
            tokio::spawn(async move { network.apply(b, doc.id, VerificationRequest::approve(1)).await })
        };
        let outcomes = [first.await?, second.await?];

        let winners = outcomes.iter().filter(|o| o.is_ok()).count();
        assert_eq!(winners, 1);
        let loser = outcomes.iter().find_map(|o| o.as_ref().err()).unwrap();
        assert!(matches!(loser.error, NetworkError::VerificationConflict { level: 1, .. }));
        assert_eq!(loser.document().map(|d| d.current_level), Some(1));

        let entry = h.network.document(doc.id).await?;
        assert_eq!(entry.record.status, DocumentStatus::UnderReview);
        assert_eq!(entry.record.version, doc.version + 1);
        assert_eq!(entry.decisions.len(), 1);
        assert_eq!(h.audit.len().await, audited + 1);
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inserts_keep_the_tree_valid() -> Result<()> {
    let h = common::harness();
    let chain = h.chain().await?;
    let admin = h.user_with(chain.s, &[MANAGE_VENDORS]).await?;
    let parents = [chain.s, chain.r, chain.c];

    let mut tasks = Vec::new();
    for i in 0..12 {
        let network = h.network.clone();
        let parent = parents[i % parents.len()];
        tasks.push(tokio::spawn(async move {
            network
                .insert_vendor(admin, parent, NewVendor::new(format!("Local {}", i), format!("L{}", i), VendorType::Local))
                .await
        }));
    }

    let mut inserted = 0;
    for task in tasks {
        if task.await?.is_ok() {
            inserted += 1;
        }
    }
    assert_eq!(inserted, 12);

    let snapshot = h.network.current().await;
    snapshot.tree.check_invariants()?;
    assert_eq!(snapshot.tree.len(), 15);
    assert_eq!(snapshot.tree.root().map(|n| n.descendant_count()), Some(14));

    let inserts = h
        .audit
        .records()
        .await
        .iter()
        .filter(|r| r.operation == Operation::InsertVendor)
        .count();
    assert_eq!(inserts, 15);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn transitions_on_different_documents_all_commit() -> Result<()> {
    let h = common::harness();
    let chain = h.chain().await?;
    let verifier = h.user_with(chain.s, &[VERIFY_DOCUMENT]).await?;

    let mut docs = Vec::new();
    for _ in 0..8 {
        docs.push(h.upload(SYSTEM, chain.c, 1).await?);
    }

    let mut tasks = Vec::new();
    for doc in &docs {
        let network = h.network.clone();
        let id = doc.id;
        tasks.push(tokio::spawn(async move {
            network.apply(verifier, id, VerificationRequest::approve(1)).await
        }));
    }
    for task in tasks {
        assert_eq!(task.await??.status, DocumentStatus::Verified);
    }

    let records = h.network.documents_for_vendor(chain.c).await;
    assert_eq!(records.len(), docs.len());
    assert!(records.iter().all(|r| r.status == DocumentStatus::Verified));
    Ok(())
}
