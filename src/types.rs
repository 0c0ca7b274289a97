use enum_map::EnumMap;
use serde::{Deserialize, Serialize};

use crate::error::HarnessError;

/// How many times each allocation was chosen
pub type ActionCounts = EnumMap<Allocation, u32>;

/// The asset class the whole portfolio is held in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, enum_map::Enum, Serialize, Deserialize)]
pub enum Allocation {
    /// Risk free savings, accruing the daily rate
    Savings,
    /// Fully invested in the equity
    Stock,
}

impl Allocation {
    pub const ALL: [Allocation; 2] = [Allocation::Savings, Allocation::Stock];

    pub fn index(self) -> usize {
        match self {
            Allocation::Savings => 0,
            Allocation::Stock => 1,
        }
    }

    pub fn from_index(index: usize) -> Result<Self, HarnessError> {
        match index {
            0 => Ok(Allocation::Savings),
            1 => Ok(Allocation::Stock),
            _ => Err(HarnessError::InvalidAction(index as u32)),
        }
    }

    pub fn size() -> usize {
        Self::ALL.len()
    }

    pub fn label(self) -> &'static str {
        match self {
            Allocation::Savings => "Invest in A",
            Allocation::Stock => "Invest in B",
        }
    }
}

impl TryFrom<u32> for Allocation {
    type Error = HarnessError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_index(value as usize)
    }
}

impl From<Allocation> for u32 {
    fn from(action: Allocation) -> Self {
        action.index() as u32
    }
}
