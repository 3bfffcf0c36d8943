use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use shared::messaging::{LearningEvent, TopicStatus};

/// Aggregated KPI counters for one user
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserStats {
    pub total_roadmaps: u64,
    pub topics_completed: u64,
    pub notes_created: u64,
}

/// One day in a user's activity log
#[derive(Debug, Clone, Serialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub events: u32,
}

#[derive(Default)]
struct StoreInner {
    /// Event ids already applied, so redeliveries are no-ops.
    seen_events: HashSet<Uuid>,
    user_stats: HashMap<String, UserStats>,
    daily_activity: HashMap<String, BTreeMap<NaiveDate, u32>>,
}

/// In-memory aggregate store fed by the event consumer.
///
/// Per-user KPI counters plus a daily activity log for streak tracking.
/// `apply` deduplicates by event id, which is what makes the consumer's
/// at-least-once delivery safe: redelivered events change nothing.
#[derive(Default)]
pub struct AnalyticsStore {
    inner: RwLock<StoreInner>,
}

impl AnalyticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the aggregates. Returns false when the event id
    /// was already applied.
    pub async fn apply(&self, event: &LearningEvent) -> bool {
        let mut inner = self.inner.write().await;

        if !inner.seen_events.insert(event.event_id()) {
            return false;
        }

        let user_id = event.user_id().to_string();
        let stats = inner.user_stats.entry(user_id.clone()).or_default();
        match event {
            LearningEvent::RoadmapCreated(_) => stats.total_roadmaps += 1,
            LearningEvent::NoteCreated(_) => stats.notes_created += 1,
            LearningEvent::TopicStatusChanged(e) if e.new_status == TopicStatus::Completed => {
                stats.topics_completed += 1
            }
            // Moving a topic to any other column still counts as activity.
            LearningEvent::TopicStatusChanged(_) => {}
        }

        let day = event.occurred_at().date_naive();
        *inner
            .daily_activity
            .entry(user_id)
            .or_default()
            .entry(day)
            .or_insert(0) += 1;

        true
    }

    pub async fn kpis(&self, user_id: &str) -> UserStats {
        self.inner
            .read()
            .await
            .user_stats
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn activity(&self, user_id: &str) -> Vec<DailyActivity> {
        self.inner
            .read()
            .await
            .daily_activity
            .get(user_id)
            .map(|days| {
                days.iter()
                    .map(|(date, events)| DailyActivity {
                        date: *date,
                        events: *events,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use shared::messaging::{NoteCreatedEvent, RoadmapCreatedEvent, TopicStatusChangedEvent};

    fn note_created(user_id: &str) -> LearningEvent {
        LearningEvent::NoteCreated(NoteCreatedEvent {
            event_id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            note_id: "note-1".to_string(),
            topic_id: None,
            occurred_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        })
    }

    #[tokio::test]
    async fn events_update_kpi_counters() {
        let store = AnalyticsStore::new();

        store.apply(&note_created("user-1")).await;
        store
            .apply(&LearningEvent::RoadmapCreated(RoadmapCreatedEvent {
                event_id: Uuid::new_v4(),
                user_id: "user-1".to_string(),
                roadmap_id: "roadmap-1".to_string(),
                title: "Learn Rust".to_string(),
                occurred_at: Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap(),
            }))
            .await;

        let kpis = store.kpis("user-1").await;
        assert_eq!(kpis.notes_created, 1);
        assert_eq!(kpis.total_roadmaps, 1);
        assert_eq!(kpis.topics_completed, 0);
    }

    #[tokio::test]
    async fn only_completed_topics_count_as_completions() {
        let store = AnalyticsStore::new();

        for status in [TopicStatus::InProgress, TopicStatus::Completed] {
            store
                .apply(&LearningEvent::TopicStatusChanged(TopicStatusChangedEvent {
                    event_id: Uuid::new_v4(),
                    user_id: "user-1".to_string(),
                    topic_id: "topic-1".to_string(),
                    roadmap_id: "roadmap-1".to_string(),
                    new_status: status,
                    occurred_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
                }))
                .await;
        }

        let kpis = store.kpis("user-1").await;
        assert_eq!(kpis.topics_completed, 1);

        // Both status changes are activity for the streak log.
        let activity = store.activity("user-1").await;
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].events, 2);
    }

    #[tokio::test]
    async fn redelivered_events_are_ignored() {
        let store = AnalyticsStore::new();
        let event = note_created("user-1");

        assert!(store.apply(&event).await);
        assert!(!store.apply(&event).await);

        let kpis = store.kpis("user-1").await;
        assert_eq!(kpis.notes_created, 1);
        assert_eq!(store.activity("user-1").await[0].events, 1);
    }

    #[tokio::test]
    async fn unknown_user_has_empty_aggregates() {
        let store = AnalyticsStore::new();
        let kpis = store.kpis("nobody").await;
        assert_eq!(kpis.total_roadmaps, 0);
        assert!(store.activity("nobody").await.is_empty());
    }
}
