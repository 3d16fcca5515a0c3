//! Client for the Challonge v2.1 tournament API.
//!
//! Participants and matches are pulled as whole snapshots. A failed fetch
//! never clears what was loaded before.

use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use serde::de::{self, DeserializeOwned, Deserializer};
use serde_derive::Deserialize;
use tracing::{debug, error, info, warn};

use crate::{error::BracketError, outcome::Outcome};

pub const DEFAULT_BASE_URL: &str = "https://api.challonge.com/v2.1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

pub type ParticipantId = u64;
pub type PlayOrder = u64;

/// Authenticated read access to the bracket API.
pub trait BracketApi {
    /// GET `endpoint` (relative to the versioned base path) and return the raw body.
    fn get(&self, endpoint: &str, api_key: &str) -> Result<String, BracketError>;
}

pub struct HttpApi {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: &str) -> Result<Self, BracketError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BracketError::Unexpected {
                endpoint: base_url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl BracketApi for HttpApi {
    fn get(&self, endpoint: &str, api_key: &str) -> Result<String, BracketError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/vnd.api+json")
            .header("Authorization-Type", "v1")
            .header("Authorization", api_key)
            .send()
            .map_err(|e| BracketError::Transport {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(BracketError::HttpStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response.text().map_err(|e| BracketError::Transport {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }
}

#[derive(Deserialize, Debug)]
struct Document<T> {
    data: Vec<T>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Number(ParticipantId),
    Text(String),
}

impl IdRepr {
    fn into_id<E: de::Error>(self) -> Result<ParticipantId, E> {
        match self {
            IdRepr::Number(id) => Ok(id),
            IdRepr::Text(text) => text.trim().parse().map_err(de::Error::custom),
        }
    }
}

#[derive(Deserialize, Debug)]
struct ParticipantRecord {
    #[serde(deserialize_with = "deserialize_id")]
    id: ParticipantId,
    attributes: ParticipantAttributes,
}

#[derive(Deserialize, Debug)]
struct ParticipantAttributes {
    name: String,
}

#[derive(Deserialize, Debug)]
struct MatchRecord {
    attributes: MatchAttributes,
}

#[derive(Deserialize, Debug)]
struct MatchAttributes {
    #[serde(default)]
    suggested_play_order: Option<PlayOrder>,
    #[serde(default)]
    points_by_participant: Option<Vec<ParticipantPoints>>,
}

#[derive(Deserialize, Debug)]
struct ParticipantPoints {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    participant_id: Option<ParticipantId>,
}

// JSON:API ids arrive as strings, but older payloads use plain numbers.
fn deserialize_id<'de, D>(deserializer: D) -> Result<ParticipantId, D::Error>
where
    D: Deserializer<'de>,
{
    <IdRepr as serde::Deserialize>::deserialize(deserializer)?.into_id()
}

fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<ParticipantId>, D::Error>
where
    D: Deserializer<'de>,
{
    <Option<IdRepr> as serde::Deserialize>::deserialize(deserializer)?
        .map(IdRepr::into_id)
        .transpose()
}

/// Both sides of one scheduled game, by resolved display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSlot {
    pub team1: Option<String>,
    pub team2: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub tournament_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub participants: Outcome,
    pub matches: Outcome,
}

pub struct BracketClient<A> {
    api: A,
    credentials: Credentials,
    participants: HashMap<ParticipantId, String>,
    matches: BTreeMap<PlayOrder, MatchSlot>,
}

impl<A: BracketApi> BracketClient<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            credentials: Credentials::default(),
            participants: HashMap::new(),
            matches: BTreeMap::new(),
        }
    }

    /// Accepts either a bare tournament id or a bracket URL ending in it.
    pub fn set_credentials(&mut self, api_key: &str, tournament: &str) {
        self.credentials = Credentials {
            api_key: api_key.trim().to_string(),
            tournament_id: tournament_id_from(tournament),
        };
        info!(
            tournament = %self.credentials.tournament_id,
            has_key = !self.credentials.api_key.is_empty(),
            "bracket credentials set"
        );
    }

    pub fn participants(&self) -> &HashMap<ParticipantId, String> {
        &self.participants
    }

    pub fn matches(&self) -> &BTreeMap<PlayOrder, MatchSlot> {
        &self.matches
    }

    fn fetch<T: DeserializeOwned>(&self, resource: &str) -> Result<Vec<T>, BracketError> {
        if self.credentials.tournament_id.is_empty() {
            return Err(BracketError::MissingCredentials {
                field: "tournament id",
            });
        }
        if self.credentials.api_key.is_empty() {
            return Err(BracketError::MissingCredentials { field: "API key" });
        }

        let endpoint = format!(
            "/tournaments/{}/{}.json",
            self.credentials.tournament_id, resource
        );
        let body = self.api.get(&endpoint, &self.credentials.api_key)?;
        let document: Document<T> =
            serde_json::from_str(&body).map_err(|source| BracketError::Decode { endpoint, source })?;
        Ok(document.data)
    }

    pub fn fetch_participants(&mut self) -> Outcome {
        match self.fetch::<ParticipantRecord>("participants") {
            Ok(records) => {
                self.participants = records
                    .into_iter()
                    .map(|record| (record.id, record.attributes.name))
                    .collect();
                info!(count = self.participants.len(), "loaded participants");
                Outcome::Updated(self.participants.len())
            }
            Err(err) => report_failure(err),
        }
    }

    /// Names are resolved against the participants currently held, so call
    /// [`Self::fetch_participants`] first.
    pub fn fetch_matches(&mut self) -> Outcome {
        match self.fetch::<MatchRecord>("matches") {
            Ok(records) => {
                let mut matches = BTreeMap::new();
                for record in records {
                    let attributes = record.attributes;
                    let Some(play_order) = attributes.suggested_play_order else {
                        continue;
                    };
                    let points = attributes.points_by_participant.unwrap_or_default();
                    let side = |index: usize| {
                        points
                            .get(index)
                            .and_then(|entry| entry.participant_id)
                            .and_then(|id| self.participants.get(&id).cloned())
                    };
                    matches.insert(
                        play_order,
                        MatchSlot {
                            team1: side(0),
                            team2: side(1),
                        },
                    );
                }
                self.matches = matches;
                info!(count = self.matches.len(), "loaded matches");
                Outcome::Updated(self.matches.len())
            }
            Err(err) => report_failure(err),
        }
    }

    pub fn refresh(&mut self) -> RefreshReport {
        let participants = self.fetch_participants();
        let matches = self.fetch_matches();
        debug!(participants = ?self.participants, "bracket participants");
        debug!(matches = ?self.matches, "bracket matches");
        RefreshReport {
            participants,
            matches,
        }
    }

    /// Text source name (`G{n}_T{side}`) to team name for every known game.
    pub fn derive_display_mapping(&self) -> BTreeMap<String, Option<String>> {
        let mut mapping = BTreeMap::new();
        for (play_order, slot) in &self.matches {
            mapping.insert(format!("G{}_T1", play_order), slot.team1.clone());
            mapping.insert(format!("G{}_T2", play_order), slot.team2.clone());
        }
        mapping
    }
}

fn report_failure(err: BracketError) -> Outcome {
    match &err {
        BracketError::MissingCredentials { .. } => {
            warn!(error = %err, "skipping bracket fetch");
            Outcome::Unchanged
        }
        BracketError::Unexpected { .. } => {
            error!(category = err.category(), error = %err, "bracket fetch failed");
            Outcome::failed(&err)
        }
        BracketError::Decode { source, .. } => {
            warn!(category = err.category(), error = %err, details = %source, "bracket fetch failed");
            Outcome::Failed(format!("{}: {}", err, source))
        }
        _ => {
            warn!(category = err.category(), error = %err, "bracket fetch failed");
            Outcome::failed(&err)
        }
    }
}

fn tournament_id_from(input: &str) -> String {
    let input = input.trim();
    let input = input
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');
    if input.contains("://") {
        input.rsplit('/').next().unwrap_or_default().to_string()
    } else {
        input.to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;

    use super::*;

    pub enum FakeResponse {
        Body(String),
        Status(u16, String),
        Down,
    }

    #[derive(Default)]
    pub struct FakeApi {
        responses: RefCell<HashMap<String, FakeResponse>>,
        pub requests: RefCell<Vec<String>>,
    }

    impl FakeApi {
        pub fn respond(&self, endpoint: &str, response: FakeResponse) {
            self.responses
                .borrow_mut()
                .insert(endpoint.to_string(), response);
        }
    }

    impl BracketApi for &FakeApi {
        fn get(&self, endpoint: &str, api_key: &str) -> Result<String, BracketError> {
            assert_eq!(api_key, "key");
            self.requests.borrow_mut().push(endpoint.to_string());
            match self.responses.borrow().get(endpoint) {
                Some(FakeResponse::Body(body)) => Ok(body.clone()),
                Some(FakeResponse::Status(status, body)) => Err(BracketError::HttpStatus {
                    endpoint: endpoint.to_string(),
                    status: *status,
                    body: body.clone(),
                }),
                Some(FakeResponse::Down) | None => Err(BracketError::Transport {
                    endpoint: endpoint.to_string(),
                    reason: "connection refused".into(),
                }),
            }
        }
    }

    pub const PARTICIPANTS: &str = "/tournaments/cup/participants.json";
    pub const MATCHES: &str = "/tournaments/cup/matches.json";

    pub fn participants_body() -> String {
        r#"{"data": [
            {"id": "11", "type": "participant", "attributes": {"name": "Alpha"}},
            {"id": 12, "type": "participant", "attributes": {"name": "Bravo"}},
            {"id": "13", "type": "participant", "attributes": {"name": "Charlie"}}
        ]}"#
        .to_string()
    }

    pub fn matches_body() -> String {
        r#"{"data": [
            {"id": "1", "attributes": {"suggested_play_order": 1,
                "points_by_participant": [{"participant_id": 11}, {"participant_id": 12}]}},
            {"id": "2", "attributes": {"suggested_play_order": 2,
                "points_by_participant": [{"participant_id": 13}]}},
            {"id": "3", "attributes": {"suggested_play_order": null,
                "points_by_participant": [{"participant_id": 11}, {"participant_id": 13}]}},
            {"id": "4", "attributes": {"points_by_participant": []}},
            {"id": "5", "attributes": {"suggested_play_order": 3,
                "points_by_participant": [{"participant_id": 99}, {"participant_id": 12}]}}
        ]}"#
        .to_string()
    }

    fn loaded_client(api: &FakeApi) -> BracketClient<&FakeApi> {
        api.respond(PARTICIPANTS, FakeResponse::Body(participants_body()));
        api.respond(MATCHES, FakeResponse::Body(matches_body()));
        let mut client = BracketClient::new(api);
        client.set_credentials("key", "cup");
        client.refresh();
        client
    }

    #[test]
    fn fetches_are_skipped_without_credentials() {
        let api = FakeApi::default();
        let mut client = BracketClient::new(&api);
        assert_eq!(client.fetch_participants(), Outcome::Unchanged);

        client.set_credentials("", "cup");
        assert_eq!(client.fetch_matches(), Outcome::Unchanged);
        assert!(api.requests.borrow().is_empty());
    }

    #[test]
    fn refresh_loads_participants_before_matches() {
        let api = FakeApi::default();
        let client = loaded_client(&api);

        assert_eq!(*api.requests.borrow(), vec![PARTICIPANTS, MATCHES]);
        assert_eq!(client.participants().len(), 3);
        assert_eq!(client.participants()[&12], "Bravo");
    }

    #[test]
    fn matches_without_play_order_are_dropped() {
        let api = FakeApi::default();
        let client = loaded_client(&api);

        let orders: Vec<_> = client.matches().keys().copied().collect();
        assert_eq!(orders, vec![1, 2, 3]);
        assert_eq!(
            client.matches()[&1],
            MatchSlot {
                team1: Some("Alpha".into()),
                team2: Some("Bravo".into())
            }
        );
    }

    #[test]
    fn missing_sides_and_unknown_ids_resolve_to_none() {
        let api = FakeApi::default();
        let client = loaded_client(&api);

        assert_eq!(client.matches()[&2].team1.as_deref(), Some("Charlie"));
        assert_eq!(client.matches()[&2].team2, None);
        assert_eq!(client.matches()[&3].team1, None);
        assert_eq!(client.matches()[&3].team2.as_deref(), Some("Bravo"));
    }

    #[test]
    fn display_mapping_has_both_sides_per_game() {
        let api = FakeApi::default();
        let client = loaded_client(&api);

        let mapping = client.derive_display_mapping();
        let keys: Vec<_> = mapping.keys().cloned().collect();
        assert_eq!(
            keys,
            vec!["G1_T1", "G1_T2", "G2_T1", "G2_T2", "G3_T1", "G3_T2"]
        );
        assert_eq!(mapping["G1_T2"].as_deref(), Some("Bravo"));
        assert_eq!(mapping["G2_T2"], None);
        assert_eq!(mapping, client.derive_display_mapping());
    }

    #[test]
    fn transport_failure_keeps_previous_matches() {
        let api = FakeApi::default();
        let mut client = loaded_client(&api);
        let before = client.matches().clone();

        api.respond(MATCHES, FakeResponse::Down);
        let outcome = client.fetch_matches();

        assert!(outcome.is_failed());
        assert_eq!(*client.matches(), before);
    }

    #[test]
    fn http_and_decode_failures_keep_previous_participants() {
        let api = FakeApi::default();
        let mut client = loaded_client(&api);
        let before = client.participants().clone();

        api.respond(PARTICIPANTS, FakeResponse::Status(401, "bad key".into()));
        match client.fetch_participants() {
            Outcome::Failed(reason) => assert!(reason.contains("401") && reason.contains("bad key")),
            other => panic!("expected failure, got {other:?}"),
        }

        api.respond(PARTICIPANTS, FakeResponse::Body(r#"{"errors": []}"#.into()));
        assert!(client.fetch_participants().is_failed());

        api.respond(PARTICIPANTS, FakeResponse::Body("<html>".into()));
        assert!(client.fetch_participants().is_failed());

        assert_eq!(*client.participants(), before);
    }

    #[test]
    fn tournament_url_is_reduced_to_its_id() {
        assert_eq!(tournament_id_from("cup"), "cup");
        assert_eq!(tournament_id_from(" https://challonge.com/cup/ "), "cup");
        assert_eq!(tournament_id_from("https://challonge.com/cup?tab=x"), "cup");
        assert_eq!(tournament_id_from("https://challonge.com/cup/#standings"), "cup");
    }

    #[test]
    fn string_and_number_participant_ids_both_resolve() {
        let api = FakeApi::default();
        let mut client = loaded_client(&api);

        api.respond(
            MATCHES,
            FakeResponse::Body(
                r#"{"data": [{"attributes": {"suggested_play_order": 7,
                    "points_by_participant": [{"participant_id": "11"}, {"participant_id": 12}]}},
                    {"attributes": {"suggested_play_order": 8,
                    "points_by_participant": [{"participant_id": null}, {"participant_id": "13"}]}}]}"#
                    .into(),
            ),
        );

        assert_eq!(client.fetch_matches(), Outcome::Updated(2));
        assert_eq!(
            client.matches()[&7],
            MatchSlot {
                team1: Some("Alpha".into()),
                team2: Some("Bravo".into())
            }
        );
        assert_eq!(client.matches()[&8].team1, None);
        assert_eq!(client.matches()[&8].team2.as_deref(), Some("Charlie"));
    }

    mod http {
        use std::{
            io::{Read, Write},
            net::TcpListener,
            thread::{self, JoinHandle},
        };

        use super::super::*;

        // Answers one request with `response` and hands back the raw request text.
        fn serve_once(response: String) -> (String, JoinHandle<String>) {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let base_url = format!("http://{}/v2.1/", listener.local_addr().unwrap());
            let handle = thread::spawn(move || {
                let (mut stream, _) = listener.accept().unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = stream.read(&mut buf).unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                }
                stream.write_all(response.as_bytes()).unwrap();
                String::from_utf8_lossy(&request).into_owned()
            });
            (base_url, handle)
        }

        fn response(status_line: &str, body: &str) -> String {
            format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            )
        }

        #[test]
        fn success_returns_body_and_sends_auth_headers() {
            let (base_url, server) = serve_once(response("200 OK", r#"{"data": []}"#));
            let api = HttpApi::new(&base_url).unwrap();

            let body = api.get("/tournaments/cup/matches.json", "secret").unwrap();
            assert_eq!(body, r#"{"data": []}"#);

            let request = server.join().unwrap().to_lowercase();
            assert!(request.starts_with("get /v2.1/tournaments/cup/matches.json http/1.1"));
            assert!(request.contains("authorization: secret\r\n"));
            assert!(request.contains("authorization-type: v1\r\n"));
            assert!(request.contains("content-type: application/vnd.api+json\r\n"));
            assert!(request.contains("accept: application/json\r\n"));
        }

        #[test]
        fn error_status_carries_body() {
            let (base_url, server) = serve_once(response("401 Unauthorized", "bad key"));
            let api = HttpApi::new(&base_url).unwrap();

            match api.get("/tournaments/cup/participants.json", "secret") {
                Err(BracketError::HttpStatus {
                    endpoint,
                    status,
                    body,
                }) => {
                    assert_eq!(endpoint, "/tournaments/cup/participants.json");
                    assert_eq!(status, 401);
                    assert_eq!(body, "bad key");
                }
                other => panic!("expected HTTP status error, got {other:?}"),
            }
            server.join().unwrap();
        }

        #[test]
        fn closed_port_is_transport_error() {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let base_url = format!("http://{}", listener.local_addr().unwrap());
            drop(listener);
            let api = HttpApi::new(&base_url).unwrap();

            let err = api.get("/tournaments/cup/matches.json", "secret").unwrap_err();
            assert_eq!(err.category(), "transport");
        }
    }
}
