use std::{env, process::ExitCode};

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod challonge;
mod config;
mod error;
mod outcome;
mod roster;
mod surface;
mod sync;

use challonge::{BracketClient, HttpApi};
use config::AppConfig;
use roster::RosterStore;
use surface::SceneFile;

const SELECT_PLACEHOLDER: &str = "-- Select Team --";

enum Command {
    Teams,
    Transition { team1: String, team2: String },
    Bracket,
}

impl Command {
    fn parse(args: &[String]) -> Option<Self> {
        match args {
            [cmd] if cmd == "teams" => Some(Command::Teams),
            [cmd] if cmd == "bracket" => Some(Command::Bracket),
            [cmd, team1, team2] if cmd == "transition" => Some(Command::Transition {
                team1: team1.clone(),
                team2: team2.clone(),
            }),
            _ => None,
        }
    }
}

fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn run(command: Command, config: &AppConfig) -> anyhow::Result<()> {
    let mut roster = RosterStore::new();

    match command {
        Command::Teams => {
            let outcome = roster.load(&config.roster_path);
            if outcome.is_failed() {
                anyhow::bail!("roster not loaded: {}", outcome);
            }
            println!("{}", SELECT_PLACEHOLDER);
            for name in roster.list_names() {
                println!("{}", name);
            }
        }
        Command::Transition { team1, team2 } => {
            roster.load(&config.roster_path);
            let mut scene = SceneFile::load(&config.scene_path)
                .with_context(|| format!("loading scene {}", config.scene_path.display()))?;
            sync::execute_transition(&mut scene, &roster, &team1, &team2);
            scene
                .save(&config.scene_path)
                .with_context(|| format!("saving scene {}", config.scene_path.display()))?;
        }
        Command::Bracket => {
            let api = HttpApi::new(&config.base_url)?;
            let mut client = BracketClient::new(api);
            client.set_credentials(&config.api_key, &config.tournament_id);
            let report = client.refresh();
            info!(
                participants = %report.participants,
                matches = %report.matches,
                known_participants = client.participants().len(),
                known_matches = client.matches().len(),
                "bracket refreshed"
            );

            let mut scene = SceneFile::load(&config.scene_path)
                .with_context(|| format!("loading scene {}", config.scene_path.display()))?;
            sync::apply_bracket(&mut scene, &client.derive_display_mapping());
            scene
                .save(&config.scene_path)
                .with_context(|| format!("saving scene {}", config.scene_path.display()))?;
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = Command::parse(&args) else {
        println!("Usage: bracket-overlay teams | transition <team1> <team2> | bracket");
        return ExitCode::from(1);
    };

    let config = AppConfig::from_env();
    match run(command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = ?err, "command failed");
            ExitCode::from(1)
        }
    }
}
