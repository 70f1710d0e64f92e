//! Status projection and quota invariants exercised through the
//! service layer.

mod common;

use chrono::Utc;
use common::{harness, new_bot};
use meetbot::domain::models::{BotStatus, EventData, EventType, MeetingPlatform};
use meetbot::domain::ports::BotFilter;

#[tokio::test]
async fn status_tracks_the_latest_status_class_event() {
    let h = harness().await;
    let bot = h
        .services
        .bots
        .insert(new_bot(h.tenant.id, MeetingPlatform::Meet))
        .await
        .unwrap();

    let sequence = [
        (EventType::Deploying, BotStatus::Deploying),
        (EventType::JoiningCall, BotStatus::JoiningCall),
        (EventType::InWaitingRoom, BotStatus::InWaitingRoom),
        (EventType::InCall, BotStatus::InCall),
        (EventType::CallEnded, BotStatus::CallEnded),
        (EventType::Done, BotStatus::Done),
    ];

    for (event, expected) in sequence {
        h.services
            .event_log
            .record(bot.id, event, Utc::now(), EventData::default())
            .await
            .unwrap();

        // Interleave a log-only event; it must never move the status.
        h.services
            .event_log
            .record(
                bot.id,
                EventType::Log,
                Utc::now(),
                EventData::description("noise"),
            )
            .await
            .unwrap();

        let current = h.services.bots.get(bot.id).await.unwrap().unwrap().status;
        assert_eq!(current, expected);

        let latest = h
            .services
            .event_log
            .latest_status_event(bot.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.event_type.status(), Some(expected));
    }
}

#[tokio::test]
async fn terminal_status_rejects_further_transitions() {
    let h = harness().await;
    let bot = h
        .services
        .bots
        .insert(new_bot(h.tenant.id, MeetingPlatform::Meet))
        .await
        .unwrap();

    h.services
        .event_log
        .record(bot.id, EventType::Fatal, Utc::now(), EventData::default())
        .await
        .unwrap();

    for event in [EventType::Deploying, EventType::InCall, EventType::Done] {
        h.services
            .event_log
            .record(bot.id, event, Utc::now(), EventData::default())
            .await
            .unwrap();
        assert_eq!(
            h.services.bots.get(bot.id).await.unwrap().unwrap().status,
            BotStatus::Fatal
        );
    }
}

#[tokio::test]
async fn cancellation_is_terminal_and_removes_queue_entry() {
    let h = common::harness_with(|config| config.pool.max_size = 1).await;

    let holder = h
        .services
        .bots
        .insert(new_bot(h.tenant.id, MeetingPlatform::Meet))
        .await
        .unwrap();
    h.services.coordinator.deploy(holder.id, None).await.unwrap();

    let queued = h
        .services
        .bots
        .insert(new_bot(h.tenant.id, MeetingPlatform::Meet))
        .await
        .unwrap();
    h.services
        .coordinator
        .deploy(queued.id, Some(60_000))
        .await
        .unwrap();

    let cancelled = h
        .services
        .bot_service
        .cancel_deployment(&h.tenant, queued.id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, BotStatus::Cancelled);
    assert_eq!(common::queue_len(&h).await, 0);

    // Cancel is not available once terminal.
    let err = h
        .services
        .bot_service
        .cancel_deployment(&h.tenant, queued.id)
        .await
        .unwrap_err();
    assert!(err.is_client_error());
}

#[tokio::test]
async fn daily_quota_denies_after_limit() {
    let h = harness().await;

    // A custom-plan tenant with a 2-bot allowance.
    let tenant = h
        .services
        .tenants
        .insert(
            "small",
            meetbot::domain::models::SubscriptionPlan::Custom,
            Some(2),
            "UTC",
        )
        .await
        .unwrap();

    for _ in 0..2 {
        h.services
            .bot_service
            .create_bot(&tenant, new_bot(tenant.id, MeetingPlatform::Meet), None)
            .await
            .unwrap();
    }

    let err = h
        .services
        .bot_service
        .create_bot(&tenant, new_bot(tenant.id, MeetingPlatform::Meet), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        meetbot::domain::errors::ControlPlaneError::QuotaExceeded { usage: 2, limit: 2 }
    ));

    // Only the admitted bots exist.
    let bots = h
        .services
        .bots
        .list(BotFilter {
            tenant_id: Some(tenant.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(bots.len(), 2);
}

#[tokio::test]
async fn tenants_cannot_touch_each_others_bots() {
    let h = harness().await;
    let other = h
        .services
        .tenants
        .insert(
            "rival",
            meetbot::domain::models::SubscriptionPlan::Free,
            None,
            "UTC",
        )
        .await
        .unwrap();

    let bot = h
        .services
        .bots
        .insert(new_bot(h.tenant.id, MeetingPlatform::Meet))
        .await
        .unwrap();

    let err = h
        .services
        .bot_service
        .get_bot(&other, bot.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        meetbot::domain::errors::ControlPlaneError::Unauthorized(_)
    ));
}
