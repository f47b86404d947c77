//! Keyword-weighted specialization routing.

use crate::config::{SpecializationProfile, SpecializationSettings};
use agrisearch_core::{AppError, AppResult};
use serde::Serialize;

const FOCUS_WEIGHT: usize = 2;
const EXPERTISE_WEIGHT: usize = 1;

/// A named domain-focus profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Specialization {
    pub name: String,
    /// Focus phrase as declared, e.g. "soil health, nutrients"
    pub focus: String,
    /// Expertise phrase as declared
    pub expertise: String,
    #[serde(skip)]
    focus_keywords: Vec<String>,
    #[serde(skip)]
    expertise_keywords: Vec<String>,
}

impl Specialization {
    pub fn new(
        name: impl Into<String>,
        focus: impl Into<String>,
        expertise: impl Into<String>,
    ) -> Self {
        let focus = focus.into();
        let expertise = expertise.into();
        Self {
            name: name.into(),
            focus_keywords: split_keywords(&focus),
            expertise_keywords: split_keywords(&expertise),
            focus,
            expertise,
        }
    }

    /// Weighted keyword score against an already lowercased text.
    fn score(&self, lowered: &str) -> usize {
        let focus_hits = self
            .focus_keywords
            .iter()
            .filter(|k| lowered.contains(k.as_str()))
            .count();
        let expertise_hits = self
            .expertise_keywords
            .iter()
            .filter(|k| lowered.contains(k.as_str()))
            .count();

        FOCUS_WEIGHT * focus_hits + EXPERTISE_WEIGHT * expertise_hits
    }
}

fn split_keywords(phrase: &str) -> Vec<String> {
    phrase
        .split(',')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

/// The outcome of routing one sub-query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub tag: String,
    pub enhanced_query: String,
    pub score: usize,
}

/// Ordered, non-empty registry of specializations.
#[derive(Debug, Clone)]
pub struct SpecializationRegistry {
    specializations: Vec<Specialization>,
    default_index: usize,
}

impl SpecializationRegistry {
    /// Build a registry. Declaration order breaks score ties.
    pub fn new(specializations: Vec<Specialization>, default_name: &str) -> AppResult<Self> {
        if specializations.is_empty() {
            return Err(AppError::Config(
                "Specialization registry cannot be empty".to_string(),
            ));
        }

        let default_index = specializations
            .iter()
            .position(|s| s.name == default_name)
            .ok_or_else(|| {
                AppError::Config(format!(
                    "Default specialization '{}' is not in the registry",
                    default_name
                ))
            })?;

        Ok(Self {
            specializations,
            default_index,
        })
    }

    /// The built-in agricultural registry.
    pub fn agricultural() -> Self {
        Self {
            specializations: vec![
                Specialization::new(
                    "crop_specialist",
                    "crops, varieties, cultivation, planting",
                    "plant breeding, seed selection, crop rotation",
                ),
                Specialization::new(
                    "soil_expert",
                    "soil health, nutrients, fertilizers, amendments",
                    "soil chemistry, pH, organic matter, erosion",
                ),
                Specialization::new(
                    "pest_manager",
                    "pests, diseases, IPM, biological control",
                    "insect control, fungal diseases, resistance",
                ),
                Specialization::new(
                    "sustainability_advisor",
                    "sustainable practices, organic farming, environment",
                    "conservation, renewable energy, water management",
                ),
            ],
            default_index: 0,
        }
    }

    /// Registry from `research.yaml` settings.
    pub fn from_settings(settings: &SpecializationSettings) -> AppResult<Self> {
        let specializations = settings
            .profiles
            .iter()
            .map(|SpecializationProfile { name, focus, expertise }| {
                Specialization::new(name.as_str(), focus.as_str(), expertise.as_str())
            })
            .collect();
        Self::new(specializations, &settings.default)
    }

    pub fn specializations(&self) -> &[Specialization] {
        &self.specializations
    }

    pub fn default_specialization(&self) -> &Specialization {
        &self.specializations[self.default_index]
    }

    /// Pick the highest-scoring specialization and enhance the query with its phrases.
    pub fn route(&self, sub_query: &str) -> Route {
        let lowered = sub_query.to_lowercase();

        let mut best: Option<(&Specialization, usize)> = None;
        for specialization in &self.specializations {
            let score = specialization.score(&lowered);
            // Strict comparison keeps the first declared on ties
            if score > 0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((specialization, score));
            }
        }

        let (winner, score) = best.unwrap_or((self.default_specialization(), 0));

        Route {
            tag: winner.name.clone(),
            enhanced_query: format!("{} {} {}", sub_query, winner.focus, winner.expertise),
            score,
        }
    }
}

impl Default for SpecializationRegistry {
    fn default() -> Self {
        Self::agricultural()
    }
}
