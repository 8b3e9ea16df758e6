//! Always the same direction (bullish / bearish).

use super::martingale::Martingale;
use super::{Proposal, Strategy, StrategyContext};
use crate::types::Position;

pub struct Fixed {
    position: Position,
    sizing: Martingale,
}

impl Fixed {
    pub fn new(position: Position, sizing: Martingale) -> Self {
        Self { position, sizing }
    }
}

impl Strategy for Fixed {
    fn name(&self) -> &str {
        match self.position {
            Position::Bull => "bullish",
            Position::Bear => "bearish",
        }
    }

    fn propose(&mut self, ctx: &StrategyContext<'_>) -> Option<Proposal> {
        Some(Proposal {
            position: self.position,
            stake: self.sizing.next_stake(ctx.history),
        })
    }
}
