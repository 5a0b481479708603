mod common;

use anyhow::Result;
use common::{parse_date, register, test_service, Trip};
use pennypals::application::{AppError, ErrorKind, NewExpense};
use pennypals::domain::NotificationKind;
use uuid::Uuid;

#[tokio::test]
async fn test_two_person_split() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ana = register(&service, "ana").await?;
    let ben = register(&service, "ben").await?;
    let group = service.create_group(ana.id, "Dinner club", &[ben.id]).await?;

    let details = service
        .record_expense(ana.id, NewExpense::in_group("Dinner", 8550, group.group.id))
        .await?;

    assert_eq!(details.expense.paid_by, ana.id);
    assert_eq!(details.splits.len(), 2);
    assert_eq!(details.share_of(ana.id), Some(4275));
    assert_eq!(details.share_of(ben.id), Some(4275));

    Ok(())
}

#[tokio::test]
async fn test_remainder_goes_to_payer_first() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let trip = Trip::create(&service).await?;

    let details = service
        .record_expense(trip.cat.id, NewExpense::in_group("Museum", 1000, trip.group))
        .await?;

    assert_eq!(details.share_of(trip.cat.id), Some(334));
    assert_eq!(details.share_of(trip.ana.id), Some(333));
    assert_eq!(details.share_of(trip.ben.id), Some(333));

    let total: i64 = details.splits.iter().map(|s| s.amount_cents).sum();
    assert_eq!(total, 1000);

    Ok(())
}

#[tokio::test]
async fn test_explicit_participants_override_group() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let trip = Trip::create(&service).await?;

    let details = service
        .record_expense(
            trip.ana.id,
            NewExpense::in_group("Taxi", 2001, trip.group).with_participants(vec![trip.ben.id, trip.cat.id]),
        )
        .await?;

    assert_eq!(details.splits.len(), 2);
    assert_eq!(details.share_of(trip.ana.id), None);
    assert_eq!(details.share_of(trip.ben.id), Some(1001));
    assert_eq!(details.share_of(trip.cat.id), Some(1000));

    Ok(())
}

#[tokio::test]
async fn test_ad_hoc_expense() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ana = register(&service, "ana").await?;
    let ben = register(&service, "ben").await?;

    let details = service
        .record_expense(
            ana.id,
            NewExpense::ad_hoc("Concert", 12000, vec![ana.id, ben.id, ben.id])
                .occurred_at(parse_date("2024-06-01")),
        )
        .await?;

    assert!(details.expense.group_id.is_none());
    assert_eq!(details.splits.len(), 2);
    assert_eq!(
        details.expense.occurred_at.date_naive().to_string(),
        "2024-06-01"
    );

    let fetched = service.get_expense(ben.id, details.expense.id).await?;
    assert_eq!(fetched.splits.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_expense_validation() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let trip = Trip::create(&service).await?;

    let err = service
        .record_expense(trip.ana.id, NewExpense::in_group("Nothing", 0, trip.group))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)));

    let err = service
        .record_expense(trip.ana.id, NewExpense::in_group("Refund", -500, trip.group))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = service
        .record_expense(trip.ana.id, NewExpense::in_group("", 500, trip.group))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    // two cents cannot be split three ways without a zero share
    let err = service
        .record_expense(trip.ana.id, NewExpense::in_group("Gum", 2, trip.group))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)));

    let err = service
        .record_expense(trip.ana.id, NewExpense::ad_hoc("Alone", 500, vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let err = service
        .record_expense(
            trip.ana.id,
            NewExpense::ad_hoc("Ghost", 500, vec![trip.ana.id, Uuid::new_v4()]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UserNotFound(_)));

    let err = service
        .record_expense(trip.ana.id, NewExpense::in_group("Lost", 500, Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::GroupNotFound(_)));

    assert!(service.list_group_expenses(trip.ana.id, trip.group).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_non_member_cannot_record_in_group() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let trip = Trip::create(&service).await?;
    let eve = register(&service, "eve").await?;

    let err = service
        .record_expense(eve.id, NewExpense::in_group("Crash", 900, trip.group))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    Ok(())
}

#[tokio::test]
async fn test_participants_are_notified_of_their_share() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let trip = Trip::create(&service).await?;

    service
        .record_expense(trip.ana.id, NewExpense::in_group("Hotel", 30000, trip.group))
        .await?;

    let latest = &service.list_notifications(trip.ben.id).await?[0];
    assert_eq!(latest.kind, NotificationKind::Expense);
    assert!(latest.message.contains("Hotel"));
    assert!(latest.message.contains("100.00"));

    // the payer gets no share notification
    let ana_notes = service.list_notifications(trip.ana.id).await?;
    assert!(ana_notes.iter().all(|n| n.kind != NotificationKind::Expense));

    Ok(())
}

#[tokio::test]
async fn test_list_group_expenses_newest_first() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let trip = Trip::create(&service).await?;

    for (title, date) in [
        ("Breakfast", "2024-05-01"),
        ("Dinner", "2024-05-03"),
        ("Lunch", "2024-05-02"),
    ] {
        service
            .record_expense(
                trip.ana.id,
                NewExpense::in_group(title, 3000, trip.group).occurred_at(parse_date(date)),
            )
            .await?;
    }

    let titles: Vec<String> = service
        .list_group_expenses(trip.ben.id, trip.group)
        .await?
        .into_iter()
        .map(|e| e.title)
        .collect();
    assert_eq!(titles, vec!["Dinner", "Lunch", "Breakfast"]);

    Ok(())
}

#[tokio::test]
async fn test_delete_expense() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let trip = Trip::create(&service).await?;
    let eve = register(&service, "eve").await?;

    let details = service
        .record_expense(trip.ana.id, NewExpense::in_group("Tickets", 4500, trip.group))
        .await?;

    let err = service
        .delete_expense(eve.id, details.expense.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotExpenseParticipant { .. }));

    let err = service
        .get_expense(eve.id, details.expense.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    // any group member may delete
    let removed = service.delete_expense(trip.ben.id, details.expense.id).await?;
    assert_eq!(removed, 3);

    let err = service
        .get_expense(trip.ana.id, details.expense.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ExpenseNotFound(_)));

    let balance = service.group_balance(trip.ben.id, trip.group).await?;
    assert_eq!(balance.net, 0);

    Ok(())
}
