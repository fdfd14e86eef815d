//! Score update payloads

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One score update as received from the feed
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreUpdate {
    raw: Value,
}

impl ScoreUpdate {
    /// Wrap an already decoded payload
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// Decode one feed message.
    ///
    /// Messages wrapped in an `{"event": .., "data": ..}` envelope are
    /// unwrapped to their `data`.
    pub fn from_message(text: &str) -> Result<Self, serde_json::Error> {
        let mut raw: Value = serde_json::from_str(text)?;
        if let Some(envelope) = raw.as_object_mut() {
            if envelope.contains_key("event") {
                if let Some(data) = envelope.remove("data") {
                    return Ok(Self::new(data));
                }
            }
        }
        Ok(Self::new(raw))
    }

    /// The payload as received
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Typed view of the cricket score, `None` when the payload has no
    /// current score for the batting side
    pub fn summary(&self) -> Option<ScoreSummary> {
        let wire = WireUpdate::deserialize(&self.raw).ok()?;
        let current = wire.curr_score;
        let batting = current.team_score.get(&current.batting_team_name)?;
        let on_pitch = &batting.on_pitch;

        Some(ScoreSummary {
            batting_team: current.batting_team_name.clone(),
            bowling_team: current.bowling_team_name.clone(),
            innings_score: scalar(&batting.inning_score),
            overs: scalar(&batting.overs),
            striker: Batter {
                name: on_pitch.striker.clone(),
                runs: on_pitch.striker_score.runs,
                balls: on_pitch.striker_score.balls,
            },
            non_striker: Batter {
                name: on_pitch.non_striker.clone(),
                runs: on_pitch.non_striker_score.runs,
                balls: on_pitch.non_striker_score.balls,
            },
            bowler: on_pitch.bowler_score.clone(),
            current_over_balls: current.curr_over_detail.balls.iter().map(scalar).collect(),
        })
    }
}

/// Cricket score fields used for logging and rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub batting_team: String,
    pub bowling_team: String,
    pub innings_score: String,
    pub overs: String,
    pub striker: Batter,
    pub non_striker: Batter,
    pub bowler: Bowler,
    /// Outcome of each ball bowled so far in the current over
    pub current_over_balls: Vec<String>,
}

/// A batter at the crease
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batter {
    pub name: String,
    pub runs: u32,
    pub balls: u32,
}

/// The current bowler's figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bowler {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub balls_delivered: u32,
    #[serde(default)]
    pub runs_given: u32,
    #[serde(default)]
    pub wickets: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUpdate {
    curr_score: WireCurrentScore,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCurrentScore {
    batting_team_name: String,
    #[serde(default)]
    bowling_team_name: String,
    team_score: HashMap<String, WireTeamScore>,
    #[serde(default)]
    curr_over_detail: WireOverDetail,
}

#[derive(Default, Deserialize)]
struct WireOverDetail {
    #[serde(default)]
    balls: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTeamScore {
    #[serde(default)]
    inning_score: Value,
    #[serde(default)]
    overs: Value,
    on_pitch: WireOnPitch,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireOnPitch {
    #[serde(default)]
    striker: String,
    #[serde(default)]
    striker_score: WireBatting,
    #[serde(default)]
    non_striker: String,
    #[serde(default)]
    non_striker_score: WireBatting,
    bowler_score: Bowler,
}

#[derive(Default, Deserialize)]
struct WireBatting {
    #[serde(default)]
    runs: u32,
    #[serde(default)]
    balls: u32,
}

/// Strings verbatim, anything else in its JSON form
fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
