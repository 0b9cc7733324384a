// FanGraphs auction-calculator payloads: the projections service.
//
// Batters and pitchers come from separate requests with the same row shape;
// points are already computed for the league's scoring settings.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::player::{stat, RawPlayerRecord, RecordKind, SourceId};
use crate::sources::ProviderError;

#[derive(Debug, Deserialize)]
struct ProjectionPayload {
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ProjectionRow {
    #[serde(rename = "PlayerName", default)]
    player_name: String,
    #[serde(rename = "Team", default)]
    team: Option<String>,
    #[serde(rename = "POS", default)]
    pos: Option<String>,
    #[serde(rename = "rPTS", default)]
    points: Option<Value>,
    #[serde(rename = "PA", default)]
    pa: Option<Value>,
    #[serde(rename = "IP", default)]
    ip: Option<Value>,
    #[serde(flatten)]
    _extra: HashMap<String, Value>,
}

/// A finite number from a JSON number or numeric string.
fn number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Parse one projection payload. `kind` says which request it answered.
pub fn parse_projections(payload: &Value, kind: RecordKind) -> Result<Vec<RawPlayerRecord>, ProviderError> {
    let payload = ProjectionPayload::deserialize(payload)
        .map_err(|e| ProviderError::decode(SourceId::Projections, e))?;

    let mut records = Vec::with_capacity(payload.data.len());
    for row in &payload.data {
        let row = match ProjectionRow::deserialize(row) {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "skipping undecodable projection row");
                continue;
            }
        };
        if row.player_name.trim().is_empty() {
            continue;
        }
        records.push(to_record(row, kind));
    }

    info!(kind = ?kind, records = records.len(), "parsed projections");
    Ok(records)
}

fn to_record(row: ProjectionRow, kind: RecordKind) -> RawPlayerRecord {
    let points = number(row.points.as_ref());
    if points.is_none() {
        debug!(player = %row.player_name, "projection row has no readable points");
    }
    let (volume_stat, rate_stat, volume) = match kind {
        RecordKind::Batter => (stat::PA, stat::PTS_PER_PA, number(row.pa.as_ref())),
        RecordKind::Pitcher => (stat::IP, stat::PTS_PER_IP, number(row.ip.as_ref())),
    };

    let mut record = RawPlayerRecord::new(
        SourceId::Projections,
        row.player_name,
        row.team.unwrap_or_default(),
        row.pos.unwrap_or_default(),
    )
    .with_kind(kind);

    if let Some(points) = points {
        record = record.with_stat(stat::PROJ_PTS, points);
    }
    if let Some(volume) = volume {
        record = record.with_stat(volume_stat, volume);
        if let Some(points) = points.filter(|_| volume > 0.0) {
            record = record.with_stat(rate_stat, points / volume);
        }
    }
    record
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::InjuryField;
    use serde_json::json;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn batter_rows_carry_rate() {
        let payload = json!({
            "data": [
                { "PlayerName": "Aaron Judge", "Team": "NYY", "POS": "OF", "rPTS": 600.0, "PA": 650, "HR": 50 },
                { "PlayerName": "Bench Guy", "Team": "SF", "POS": "2B/SS", "rPTS": "12", "PA": 0 }
            ]
        });
        let records = parse_projections(&payload, RecordKind::Batter).unwrap();
        assert_eq!(records.len(), 2);

        let judge = &records[0];
        assert_eq!(judge.source_id, SourceId::Projections);
        assert_eq!(judge.kind, RecordKind::Batter);
        assert_eq!(judge.team, "NYY");
        assert!(approx_eq(judge.stats[stat::PROJ_PTS], 600.0));
        assert!(approx_eq(judge.stats[stat::PA], 650.0));
        assert!(approx_eq(judge.stats[stat::PTS_PER_PA], 600.0 / 650.0));
        assert_eq!(judge.injury_status, InjuryField::NotProvided);

        let bench = &records[1];
        assert!(approx_eq(bench.stats[stat::PROJ_PTS], 12.0));
        assert!(!bench.stats.contains_key(stat::PTS_PER_PA));
    }

    #[test]
    fn pitcher_rows_use_innings() {
        let payload = json!({
            "data": [ { "PlayerName": "Logan Webb", "Team": "SFG", "POS": "SP", "rPTS": 400, "IP": 200, "PA": 5 } ]
        });
        let records = parse_projections(&payload, RecordKind::Pitcher).unwrap();
        let webb = &records[0];
        assert_eq!(webb.kind, RecordKind::Pitcher);
        assert!(approx_eq(webb.stats[stat::IP], 200.0));
        assert!(approx_eq(webb.stats[stat::PTS_PER_IP], 2.0));
        assert!(!webb.stats.contains_key(stat::PA));
    }

    #[test]
    fn two_way_player_keeps_requested_kind() {
        let payload = json!({
            "data": [ { "PlayerName": "Shohei Ohtani", "Team": "LAD", "POS": "DH", "rPTS": 300, "IP": 100 } ]
        });
        let records = parse_projections(&payload, RecordKind::Pitcher).unwrap();
        assert_eq!(records[0].kind, RecordKind::Pitcher);
        assert_eq!(records[0].position, "DH");
    }

    #[test]
    fn unreadable_values_are_left_out() {
        let payload = json!({
            "data": [
                { "PlayerName": "No Points", "Team": null, "rPTS": "n/a", "PA": 100 },
                { "PlayerName": "" },
                "not a row"
            ]
        });
        let records = parse_projections(&payload, RecordKind::Batter).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].team, "");
        assert!(!records[0].stats.contains_key(stat::PROJ_PTS));
        assert!(approx_eq(records[0].stats[stat::PA], 100.0));
    }

    #[test]
    fn missing_data_key_is_a_decode_error() {
        let err = parse_projections(&json!({ "rows": [] }), RecordKind::Batter).unwrap_err();
        assert_eq!(err.source_id(), SourceId::Projections);
    }
}
