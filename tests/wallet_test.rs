mod common;

use anyhow::Result;
use common::{register, test_service};
use pennypals::application::{AppError, ErrorKind};
use pennypals::domain::NotificationKind;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::test]
async fn test_pay_user_moves_money() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ana = register(&service, "ana").await?;
    let ben = register(&service, "ben").await?;

    service.load_balance(ana.id, 5000).await?;

    let result = service
        .pay_user(ana.id, ben.id, 3000, Some("Dinner".to_string()))
        .await?;
    assert_eq!(result.remaining_balance, 2000);
    assert_eq!(result.to_name, "Ben");
    assert_eq!(result.payment.note.as_deref(), Some("Dinner"));

    assert_eq!(service.get_wallet(ana.id).await?.balance_cents, 2000);
    assert_eq!(service.get_wallet(ben.id).await?.balance_cents, 3000);
    assert_eq!(service.total_wallet_balance().await?, 5000);

    Ok(())
}

#[tokio::test]
async fn test_overdraft_leaves_balances_unchanged() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ana = register(&service, "ana").await?;
    let ben = register(&service, "ben").await?;

    service.load_balance(ana.id, 5000).await?;
    service.pay_user(ana.id, ben.id, 3000, None).await?;

    let err = service.pay_user(ana.id, ben.id, 6000, None).await.unwrap_err();
    match err {
        AppError::InsufficientFunds { balance, required } => {
            assert_eq!(balance, 2000);
            assert_eq!(required, 6000);
        }
        other => panic!("expected InsufficientFunds, got {}", other),
    }

    assert_eq!(service.get_wallet(ana.id).await?.balance_cents, 2000);
    assert_eq!(service.get_wallet(ben.id).await?.balance_cents, 3000);
    assert_eq!(service.list_payments(ana.id).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_sender_without_wallet_has_no_funds() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ana = register(&service, "ana").await?;
    let ben = register(&service, "ben").await?;

    let err = service.pay_user(ana.id, ben.id, 100, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

    // reading a wallet never creates one
    let wallet = service.get_wallet(ana.id).await?;
    assert_eq!(wallet.balance_cents, 0);
    assert!(!wallet.has_linked_bank());
    assert_eq!(service.check_integrity().await?.wallet_count, 0);

    Ok(())
}

#[tokio::test]
async fn test_payment_validation() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ana = register(&service, "ana").await?;
    let ben = register(&service, "ben").await?;
    service.load_balance(ana.id, 1000).await?;

    let err = service.pay_user(ana.id, ana.id, 100, None).await.unwrap_err();
    assert!(matches!(err, AppError::SelfPayment));

    let err = service.pay_user(ana.id, ben.id, 0, None).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)));

    let err = service
        .pay_user(ana.id, Uuid::new_v4(), 100, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UserNotFound(_)));

    assert_eq!(service.get_wallet(ana.id).await?.balance_cents, 1000);
    assert!(service.list_payments(ana.id).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_load_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ana = register(&service, "ana").await?;

    service.load_balance(ana.id, 2500).await?;
    let wallet = service.load_balance(ana.id, 1000).await?;
    assert_eq!(wallet.balance_cents, 3500);

    let err = service.load_balance(ana.id, -5).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = service.load_balance(Uuid::new_v4(), 100).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    Ok(())
}

#[tokio::test]
async fn test_link_bank_keeps_last_four() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ana = register(&service, "ana").await?;

    let wallet = service.link_bank(ana.id, "1234-5678 9012").await?;
    assert_eq!(wallet.bank_last_four.as_deref(), Some("9012"));
    assert_eq!(wallet.balance_cents, 0);

    let err = service.link_bank(ana.id, "12a").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    assert!(service.get_wallet(ana.id).await?.has_linked_bank());
    Ok(())
}

#[tokio::test]
async fn test_payments_and_notifications() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ana = register(&service, "ana").await?;
    let ben = register(&service, "ben").await?;

    service.load_balance(ana.id, 10000).await?;
    let first = service.pay_user(ana.id, ben.id, 1250, None).await?;
    service.pay_user(ana.id, ben.id, 750, None).await?;
    service.pay_user(ben.id, ana.id, 500, None).await?;

    let ben_payments = service.list_payments(ben.id).await?;
    assert_eq!(ben_payments.len(), 3);
    let net_for_ben: i64 = ben_payments.iter().map(|p| p.effect_on(ben.id)).sum();
    assert_eq!(net_for_ben, 1500);
    assert_eq!(service.get_wallet(ben.id).await?.balance_cents, 1500);

    let notes = service.list_notifications(ben.id).await?;
    assert_eq!(notes.len(), 2);
    assert!(notes.iter().all(|n| n.kind == NotificationKind::Payment));
    assert!(notes.iter().all(|n| !n.read));
    assert!(notes.iter().any(|n| n.message.contains("12.50")));

    service.mark_notification_read(ben.id, notes[0].id).await?;
    let notes = service.list_notifications(ben.id).await?;
    assert_eq!(notes.iter().filter(|n| n.read).count(), 1);

    // another user's notification is not found
    let err = service
        .mark_notification_read(ana.id, notes[0].id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotificationNotFound(_)));

    assert_eq!(first.payment.from_user, ana.id);
    assert!(service.check_integrity().await?.is_healthy());
    assert_eq!(service.total_wallet_balance().await?, 10000);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_payments_never_overdraw() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ana = register(&service, "ana").await?;
    let ben = register(&service, "ben").await?;
    service.load_balance(ana.id, 5000).await?;
    let service = Arc::new(service);
    let (from, to) = (ana.id, ben.id);

    let mut handles = Vec::new();
    for _ in 0..12 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service.pay_user(from, to, 1000, None).await
        }));
    }

    let mut paid = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => paid += 1,
            Err(err) => assert!(
                matches!(err, AppError::InsufficientFunds { .. }),
                "unexpected error: {}",
                err
            ),
        }
    }

    assert_eq!(paid, 5);
    assert_eq!(service.get_wallet(ana.id).await?.balance_cents, 0);
    assert_eq!(service.get_wallet(ben.id).await?.balance_cents, 5000);
    assert_eq!(service.total_wallet_balance().await?, 5000);
    assert_eq!(service.list_payments(ana.id).await?.len(), 5);

    Ok(())
}
