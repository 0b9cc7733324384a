// Valuation engine: composite scores, lineups, waivers, trades and
// streaming starts.
//
// Every analysis is a pure function of a PlayerDatabase snapshot and its
// parameters, and refers to players by canonical id only.

pub mod composite;
pub mod lineup;
pub mod offense;
pub mod post_trade;
pub mod streaming;
pub mod trade;
pub mod waiver;

use serde::Serialize;

use crate::valuation::post_trade::PostTradeWaivers;
use crate::valuation::streaming::StreamingScore;
use crate::valuation::trade::TradeImpact;
use crate::valuation::waiver::WaiverReplacement;

/// Output of one analysis call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ValuationResult {
    WaiverReplacement(WaiverReplacement),
    TradeImpact(TradeImpact),
    PostTradeWaivers(PostTradeWaivers),
    StreamingScore(Vec<StreamingScore>),
}
