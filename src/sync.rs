use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::{
    outcome::Outcome,
    roster::{Position, RosterStore, Team},
    surface::PresentationSurface,
};

/// Scene sources belonging to one side of the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotConfig {
    pub name_source: &'static str,
    pub helm_prefix: &'static str,
    pub mc_prefix: &'static str,
    pub flex_prefix: &'static str,
    pub bilge_prefix: &'static str,
}

impl SlotConfig {
    pub fn prefix(&self, position: Position) -> &'static str {
        match position {
            Position::Helm => self.helm_prefix,
            Position::Flex => self.flex_prefix,
            Position::Mc => self.mc_prefix,
            Position::Bilge => self.bilge_prefix,
        }
    }
}

pub const TEAM1_SLOTS: SlotConfig = SlotConfig {
    name_source: "Team 1",
    helm_prefix: "T1H -",
    mc_prefix: "T1MC -",
    flex_prefix: "T1F -",
    bilge_prefix: "T1B -",
};

pub const TEAM2_SLOTS: SlotConfig = SlotConfig {
    name_source: "Team 2",
    helm_prefix: "T2H -",
    mc_prefix: "T2MC -",
    flex_prefix: "T2F -",
    bilge_prefix: "T2B -",
};

// Sources are written in the order the overlay was laid out in.
const APPLY_ORDER: [Position; 4] = [Position::Helm, Position::Mc, Position::Flex, Position::Bilge];

/// Twitch popout player URL for `channel`, or an empty string to stop playback.
pub fn build_twitch_url(channel: &str) -> String {
    if channel.is_empty() {
        return String::new();
    }
    format!(
        "https://player.twitch.tv/?channel={}&enableExtensions=true&muted=false&parent=twitch.tv&player=popout&quality=480p30&volume=0.69",
        channel
    )
}

/// Write `team` into the sources named by `slots`.
///
/// Each position's source is found by prefix, renamed to carry the player
/// name and pointed at the player's stream. Unfilled positions get the bare
/// prefix and an empty URL. A position whose source cannot be found is
/// skipped without affecting the others.
pub fn apply_team<S: PresentationSurface>(
    surface: &mut S,
    team: &Team,
    slots: &SlotConfig,
) -> Outcome {
    let mut written = 0;

    if surface.set_text(slots.name_source, &team.name) {
        written += 1;
    } else {
        warn!(source = %slots.name_source, team = %team.name, "team name source not found");
    }

    for position in APPLY_ORDER {
        let prefix = slots.prefix(position);
        let Some(handle) = surface.find_source_by_name_prefix(prefix) else {
            warn!(prefix = %prefix, position = position.key(), "no source found with prefix");
            continue;
        };

        let player = team.player(position);
        let new_name = match player {
            Some(player) => format!("{} {}", prefix, player.name),
            None => prefix.to_string(),
        };
        surface.rename(&handle, &new_name);

        let channel = player
            .and_then(|player| player.channel.as_deref())
            .unwrap_or_default();
        surface.set_embed_url(&handle, &build_twitch_url(channel));
        if channel.is_empty() {
            info!(source = %new_name, "cleared stream");
        } else {
            info!(source = %new_name, channel = %channel, "updated stream");
        }
        written += 1;
    }

    if written == 0 {
        Outcome::Unchanged
    } else {
        Outcome::Updated(written)
    }
}

/// Write bracket names into text sources matched by exact name.
///
/// A side with no resolved team clears its text.
pub fn apply_bracket<S: PresentationSurface>(
    surface: &mut S,
    mapping: &BTreeMap<String, Option<String>>,
) -> Outcome {
    let mut written = 0;
    for (source, team) in mapping {
        if surface.set_text(source, team.as_deref().unwrap_or_default()) {
            written += 1;
        }
    }
    info!(updated = written, total = mapping.len(), "updated bracket text sources");
    if written == 0 {
        Outcome::Unchanged
    } else {
        Outcome::Updated(written)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionReport {
    pub team1: Outcome,
    pub team2: Outcome,
}

fn apply_side<S: PresentationSurface>(
    surface: &mut S,
    roster: &RosterStore,
    side: u8,
    team_name: &str,
    slots: &SlotConfig,
) -> Outcome {
    match roster.lookup(team_name) {
        Some(team) => apply_team(surface, team, slots),
        None => {
            warn!(side, team = %team_name, "team not found in roster");
            Outcome::Failed(format!("team `{}` not in roster", team_name))
        }
    }
}

/// Put the two selected teams on screen. A missing team only skips its own side.
pub fn execute_transition<S: PresentationSurface>(
    surface: &mut S,
    roster: &RosterStore,
    team1: &str,
    team2: &str,
) -> TransitionReport {
    info!(team1 = %team1, team2 = %team2, "executing transition");
    let report = TransitionReport {
        team1: apply_side(surface, roster, 1, team1, &TEAM1_SLOTS),
        team2: apply_side(surface, roster, 2, team2, &TEAM2_SLOTS),
    };
    info!(team1 = %report.team1, team2 = %report.team2, "transition complete");
    report
}
