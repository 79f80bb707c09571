use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use serde_aux::field_attributes::deserialize_option_number_from_string;

use crate::db::Question;

/// Category type the frontend sends when the player picked "All".
pub const ALL_CATEGORIES: &str = "click";

/// `id` is kept raw: it is only read, as a number or numeric string, for a concrete category.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuizCategory {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizScope {
    All,
    Category(i64),
}

impl QuizScope {
    pub fn category(&self) -> Option<i64> {
        match self {
            QuizScope::All => None,
            QuizScope::Category(id) => Some(*id),
        }
    }

    pub fn label(&self) -> String {
        match self {
            QuizScope::All => "all".to_owned(),
            QuizScope::Category(id) => id.to_string(),
        }
    }
}

impl QuizCategory {
    /// `None` when a concrete category was asked for without a numeric id.
    pub fn scope(&self) -> Option<QuizScope> {
        if self.kind == ALL_CATEGORIES {
            return Some(QuizScope::All);
        }
        let id = self.id.clone()?;
        deserialize_option_number_from_string::<i64, _>(id)
            .ok()
            .flatten()
            .map(QuizScope::Category)
    }
}

/// Uniform pick over the remaining candidates.
pub fn choose_question<R>(candidates: &[Question], rng: &mut R) -> Option<Question>
where
    R: Rng + ?Sized,
{
    candidates.choose(rng).cloned()
}
