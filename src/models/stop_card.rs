use crate::database::{get_db, guarded};
use crate::error::AppError;
use crate::models::report::matches_period;
use futures::StreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime},
    Collection, Database,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopCardKind {
    SafeAct,
    UnsafeAct,
    UnsafeCondition,
}

/// A STOP observation card. Cards are plain submissions with no approval
/// workflow attached; audit reports carry the routed follow-up work.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StopCard {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub emp_code: i32,
    pub date: DateTime,
    pub location: String,
    pub department: String,
    pub kind: StopCardKind,
    pub category: String,
    pub description: String,
    pub action_taken: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: DateTime,
}
#[derive(Debug, Deserialize)]
pub struct StopCardRequest {
    /// Observation date as epoch milliseconds.
    pub date: i64,
    pub location: String,
    pub department: String,
    pub kind: StopCardKind,
    pub category: String,
    pub description: String,
    pub action_taken: String,
    pub image_url: Option<String>,
}
#[derive(Debug)]
pub struct StopCardQuery {
    pub emp_code: Option<i32>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub limit: Option<usize>,
}

impl StopCard {
    pub fn new(emp_code: i32, payload: StopCardRequest) -> StopCard {
        StopCard {
            _id: None,
            emp_code,
            date: DateTime::from_millis(payload.date),
            location: payload.location,
            department: payload.department,
            kind: payload.kind,
            category: payload.category,
            description: payload.description,
            action_taken: payload.action_taken,
            image_url: payload.image_url,
            created_at: DateTime::now(),
        }
    }
    pub async fn save(&mut self) -> Result<ObjectId, AppError> {
        let db: Database = get_db();
        let collection: Collection<StopCard> = db.collection::<StopCard>("stop_cards");

        self._id = Some(ObjectId::new());

        guarded(collection.insert_one(&*self, None), "INSERTING_FAILED")
            .await
            .map(|result| result.inserted_id.as_object_id().unwrap())
    }
    pub async fn find_many(query: &StopCardQuery) -> Result<Vec<StopCard>, AppError> {
        let db: Database = get_db();
        let collection: Collection<StopCard> = db.collection::<StopCard>("stop_cards");

        let mut filter = doc! {};
        if let Some(emp_code) = query.emp_code {
            filter.insert("emp_code", emp_code);
        }

        let cards = guarded(
            async move {
                let mut cursor = collection.find(filter, None).await?;
                let mut cards: Vec<StopCard> = Vec::new();
                while let Some(card) = cursor.next().await {
                    cards.push(card?);
                }
                Ok(cards)
            },
            "STOP_CARD_LOOKUP_FAILED",
        )
        .await?;

        Ok(cards
            .into_iter()
            .filter(|card| matches_period(card.created_at, query.month, query.year))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }
}
