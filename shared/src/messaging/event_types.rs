use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Core event types published on the Pathfinder event queue.
///
/// The wire names match what the producer services publish:
/// `roadmap.created` (roadmap-service), `note.created` (notes-service) and
/// `topic.status_changed` (topic-service).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "data")]
pub enum LearningEvent {
    #[serde(rename = "roadmap.created")]
    RoadmapCreated(RoadmapCreatedEvent),

    #[serde(rename = "note.created")]
    NoteCreated(NoteCreatedEvent),

    #[serde(rename = "topic.status_changed")]
    TopicStatusChanged(TopicStatusChangedEvent),
}

impl LearningEvent {
    /// Unique id of this event, used by consumers to deduplicate redeliveries.
    pub fn event_id(&self) -> Uuid {
        match self {
            LearningEvent::RoadmapCreated(e) => e.event_id,
            LearningEvent::NoteCreated(e) => e.event_id,
            LearningEvent::TopicStatusChanged(e) => e.event_id,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            LearningEvent::RoadmapCreated(e) => &e.user_id,
            LearningEvent::NoteCreated(e) => &e.user_id,
            LearningEvent::TopicStatusChanged(e) => &e.user_id,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LearningEvent::RoadmapCreated(e) => e.occurred_at,
            LearningEvent::NoteCreated(e) => e.occurred_at,
            LearningEvent::TopicStatusChanged(e) => e.occurred_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadmapCreatedEvent {
    pub event_id: Uuid,
    pub user_id: String,
    pub roadmap_id: String,
    pub title: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteCreatedEvent {
    pub event_id: Uuid,
    pub user_id: String,
    pub note_id: String,
    pub topic_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicStatusChangedEvent {
    pub event_id: Uuid,
    pub user_id: String,
    pub topic_id: String,
    pub roadmap_id: String,
    pub new_status: TopicStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Kanban column a topic sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    Todo,
    InProgress,
    Completed,
}
