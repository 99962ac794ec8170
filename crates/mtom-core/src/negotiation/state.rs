use core::fmt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Seat {
    First = 0,
    Second = 1,
}

impl Seat {
    pub const BOTH: [Seat; 2] = [Seat::First, Seat::Second];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn other(self) -> Seat {
        match self {
            Seat::First => Seat::Second,
            Seat::Second => Seat::First,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Seat::First => "first",
            Seat::Second => "second",
        })
    }
}

/// A proposed division: `first` goes to [`Seat::First`], `second` to [`Seat::Second`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Split {
    pub first: u32,
    pub second: u32,
}

impl Split {
    pub const fn new(first: u32, second: u32) -> Self {
        Self { first, second }
    }

    /// Builds the split where `seat` keeps `share` of `total`.
    pub fn keeping(seat: Seat, share: u32, total: u32) -> Self {
        let rest = total.saturating_sub(share);
        match seat {
            Seat::First => Self::new(share, rest),
            Seat::Second => Self::new(rest, share),
        }
    }

    pub const fn total(&self) -> u32 {
        self.first + self.second
    }

    pub const fn share_for(&self, seat: Seat) -> u32 {
        match seat {
            Seat::First => self.first,
            Seat::Second => self.second,
        }
    }

    /// Share of `seat` as a fraction of the split total, 0 for an empty split.
    pub fn ratio_for(&self, seat: Seat) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        f64::from(self.share_for(seat)) / f64::from(total)
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.first, self.second)
    }
}

/// Protocol state shared by both parties.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NegotiationState {
    pub total_resources: u32,
    pub current_turn: u32,
    pub max_turns: u32,
    pub current_proposer: Seat,
    pub offers: Vec<Split>,
    pub responses: Vec<bool>,
    pub final_agreement: Option<Split>,
}

impl NegotiationState {
    pub fn new(total_resources: u32, max_turns: u32) -> Self {
        Self {
            total_resources,
            current_turn: 0,
            max_turns,
            current_proposer: Seat::First,
            offers: Vec::new(),
            responses: Vec::new(),
            final_agreement: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.final_agreement.is_some() || self.current_turn >= self.max_turns
    }

    pub fn turns_remaining(&self) -> u32 {
        self.max_turns.saturating_sub(self.current_turn)
    }

    pub fn last_offer(&self) -> Option<Split> {
        self.offers.last().copied()
    }

    pub fn last_response(&self) -> Option<bool> {
        self.responses.last().copied()
    }

    /// Every split in which both parties receive at least one unit, ascending in `seat`'s share.
    pub fn legal_offers_for(&self, seat: Seat) -> Vec<Split> {
        if self.total_resources < 2 {
            return Vec::new();
        }
        (1..self.total_resources)
            .map(|share| Split::keeping(seat, share, self.total_resources))
            .collect()
    }
}
