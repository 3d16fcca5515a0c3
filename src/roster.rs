use std::{collections::HashMap, fs, path::Path};

use serde_derive::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{error::RosterError, outcome::Outcome};

/// A player filling one position, with an optional stream channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub name: String,
    pub channel: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Helm,
    Flex,
    Mc,
    Bilge,
}

impl Position {
    #[cfg(test)]
    pub const ALL: [Position; 4] = [Position::Helm, Position::Flex, Position::Mc, Position::Bilge];

    pub fn key(self) -> &'static str {
        match self {
            Position::Helm => "helm",
            Position::Flex => "flex",
            Position::Mc => "mc",
            Position::Bilge => "bilge",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub name: String,
    pub helm: Option<Player>,
    pub flex: Option<Player>,
    pub mc: Option<Player>,
    pub bilge: Option<Player>,
}

impl Team {
    pub fn player(&self, position: Position) -> Option<&Player> {
        match position {
            Position::Helm => self.helm.as_ref(),
            Position::Flex => self.flex.as_ref(),
            Position::Mc => self.mc.as_ref(),
            Position::Bilge => self.bilge.as_ref(),
        }
    }

    fn from_raw(name: String, raw: &Value) -> Self {
        let position = |position: Position| raw.get(position.key()).and_then(player_from);
        Self {
            helm: position(Position::Helm),
            flex: position(Position::Flex),
            mc: position(Position::Mc),
            bilge: position(Position::Bilge),
            name,
        }
    }
}

#[derive(Deserialize, Debug)]
struct RawRoster {
    teams: HashMap<String, Value>,
}

// Keys tried, in order, for the player's stream channel before falling back
// to the first other string field of the record.
const CHANNEL_KEYS: [&str; 5] = ["channel", "handle", "twitch", "twitch_username", "twitch_link"];

/// Player for one position record. Anything that is not an object with a
/// non-empty `name` string is an unfilled position.
fn player_from(record: &Value) -> Option<Player> {
    let fields = record.as_object()?;
    let name = fields.get("name")?.as_str().filter(|name| !name.is_empty())?;

    let channel = CHANNEL_KEYS
        .iter()
        .find_map(|key| fields.get(*key).and_then(Value::as_str))
        .or_else(|| {
            fields
                .iter()
                .filter(|(key, _)| key.as_str() != "name")
                .find_map(|(_, value)| value.as_str())
        })
        .filter(|channel| !channel.is_empty());

    Some(Player {
        name: name.to_string(),
        channel: channel.map(str::to_string),
    })
}

/// Team name to roster mapping, replaced wholesale on every successful load.
#[derive(Debug, Default)]
pub struct RosterStore {
    teams: HashMap<String, Team>,
}

impl RosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(json: &str) -> Result<HashMap<String, Team>, serde_json::Error> {
        let raw: RawRoster = serde_json::from_str(json)?;
        Ok(raw
            .teams
            .into_iter()
            .map(|(name, team)| (name.clone(), Team::from_raw(name, &team)))
            .collect())
    }

    fn read(path: &Path) -> Result<HashMap<String, Team>, RosterError> {
        let json = fs::read_to_string(path).map_err(|source| RosterError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&json).map_err(|source| RosterError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reload the roster from `path`. On failure the previous teams are kept.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Outcome {
        let path = path.as_ref();
        match Self::read(path) {
            Ok(teams) => {
                info!(path = %path.display(), count = teams.len(), "loaded teams from roster");
                self.teams = teams;
                Outcome::Updated(self.teams.len())
            }
            Err(err) => {
                let reason = match std::error::Error::source(&err) {
                    Some(source) => format!("{}: {}", err, source),
                    None => err.to_string(),
                };
                warn!(error = %reason, kept = self.teams.len(), "roster not loaded; keeping previous teams");
                Outcome::Failed(reason)
            }
        }
    }

    pub fn lookup(&self, team_name: &str) -> Option<&Team> {
        self.teams.get(team_name)
    }

    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.teams.keys().cloned().collect();
        names.sort();
        names
    }
}
