//! Runtime configuration read from the environment.

use std::{env, path::PathBuf};

use crate::challonge::DEFAULT_BASE_URL;

const ROSTER_PATH_ENV: &str = "OVERLAY_ROSTER_PATH";
const SCENE_PATH_ENV: &str = "OVERLAY_SCENE_PATH";
const API_KEY_ENV: &str = "CHALLONGE_API_KEY";
const TOURNAMENT_ENV: &str = "CHALLONGE_TOURNAMENT_ID";
const BASE_URL_ENV: &str = "CHALLONGE_BASE_URL";

const DEFAULT_ROSTER_PATH: &str = "roster.json";
const DEFAULT_SCENE_PATH: &str = "scene.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub roster_path: PathBuf,
    pub scene_path: PathBuf,
    pub api_key: String,
    pub tournament_id: String,
    pub base_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            roster_path: var(ROSTER_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ROSTER_PATH)),
            scene_path: var(SCENE_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SCENE_PATH)),
            api_key: var(API_KEY_ENV).unwrap_or_default(),
            tournament_id: var(TOURNAMENT_ENV).unwrap_or_default(),
            base_url: var(BASE_URL_ENV).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}
