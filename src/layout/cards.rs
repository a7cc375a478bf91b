//! # Ordered Card Registry
//!
//! User-reorderable display order over the fixed set of overview cards.
//!
//! Reordering is a plain list splice: the card at `from` is removed and
//! reinserted at `to`, shifting everything in between by one. The gesture
//! layer translates drag events into [`CardOrder::reorder`] calls.
//!
//! ```
//! use bms_dashboard::layout::cards::CardOrder;
//!
//! let mut order = CardOrder::new(9);
//! order.reorder(2, 5)?;
//! assert_eq!(order.as_slice(), &[0, 1, 3, 4, 5, 2, 6, 7, 8]);
//! # Ok::<(), bms_dashboard::error::DashboardError>(())
//! ```

use serde::Serialize;
use tracing::debug;

use crate::error::{DashboardError, Result};
use crate::stats::PackStats;

/// Number of overview cards.
pub const DEFAULT_CARD_COUNT: usize = 9;

/// Permutation of card identifiers in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardOrder {
    order: Vec<usize>,
}

impl Default for CardOrder {
    fn default() -> Self {
        Self::new(DEFAULT_CARD_COUNT)
    }
}

impl CardOrder {
    /// Identity order `[0, 1, .., count - 1]`.
    pub fn new(count: usize) -> Self {
        Self {
            order: (0..count).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Card identifiers in display order.
    pub fn as_slice(&self) -> &[usize] {
        &self.order
    }

    /// Moves the card at `from` to position `to`.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfRange` if either index is outside `0..len`; the
    /// order is left unchanged.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.order.len();
        for index in [from, to] {
            if index >= len {
                return Err(DashboardError::IndexOutOfRange { index, len });
            }
        }

        if from == to {
            return Ok(());
        }

        let card = self.order.remove(from);
        self.order.insert(to, card);
        debug!("Moved card {} from {} to {}", card, from, to);
        Ok(())
    }

    /// Overview cards in display order. Identifiers without a catalog entry are skipped.
    pub fn cards(&self) -> impl Iterator<Item = StatCard> + '_ {
        self.order.iter().filter_map(|&id| StatCard::from_id(id))
    }
}

/// Pack power state reported alongside cell data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerStatus {
    Charging,
    Discharging,
    Idle,
}

impl PowerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerStatus::Charging => "Charging",
            PowerStatus::Discharging => "Discharging",
            PowerStatus::Idle => "Idle",
        }
    }
}

/// Pack-level readings that do not come from the cell grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerReadings {
    /// State of charge (%).
    pub state_of_charge: f64,
    /// Pack current (A).
    pub current_amps: f64,
    pub status: PowerStatus,
}

impl Default for PowerReadings {
    fn default() -> Self {
        Self {
            state_of_charge: 0.0,
            current_amps: 0.0,
            status: PowerStatus::Idle,
        }
    }
}

/// The fixed overview card catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatCard {
    TotalVoltage,
    AvgTemperature,
    StateOfCharge,
    CellDelta,
    PowerStatus,
    CellBalancing,
    PackCurrent,
    PackPower,
    VoltageRange,
}

impl StatCard {
    /// All cards in identifier order.
    pub const ALL: [StatCard; DEFAULT_CARD_COUNT] = [
        StatCard::TotalVoltage,
        StatCard::AvgTemperature,
        StatCard::StateOfCharge,
        StatCard::CellDelta,
        StatCard::PowerStatus,
        StatCard::CellBalancing,
        StatCard::PackCurrent,
        StatCard::PackPower,
        StatCard::VoltageRange,
    ];

    pub fn from_id(id: usize) -> Option<Self> {
        Self::ALL.get(id).copied()
    }

    pub fn id(&self) -> usize {
        *self as usize
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatCard::TotalVoltage => "Total Voltage",
            StatCard::AvgTemperature => "Avg Temperature",
            StatCard::StateOfCharge => "State of Charge",
            StatCard::CellDelta => "Cell Delta (ΔV)",
            StatCard::PowerStatus => "Power Status",
            StatCard::CellBalancing => "Cell Balancing",
            StatCard::PackCurrent => "Pack Current",
            StatCard::PackPower => "Pack Power",
            StatCard::VoltageRange => "Voltage Range",
        }
    }

    /// Formats the card's value text.
    pub fn value(&self, stats: &PackStats, power: &PowerReadings) -> String {
        match self {
            StatCard::TotalVoltage => format!("{:.1}V", stats.total_voltage),
            StatCard::AvgTemperature => format!("{:.1}°C", stats.avg_temperature),
            StatCard::StateOfCharge => format!("{}%", power.state_of_charge),
            StatCard::CellDelta => format!("{:.0}mV", stats.cell_delta * 1000.0),
            StatCard::PowerStatus => power.status.as_str().to_string(),
            StatCard::CellBalancing => {
                let state = if stats.balancing_active { "Active" } else { "Inactive" };
                state.to_string()
            }
            StatCard::PackCurrent => format!("{:.1}A", power.current_amps),
            StatCard::PackPower => {
                format!("{:.2}kW", stats.total_voltage * power.current_amps / 1000.0)
            }
            StatCard::VoltageRange => {
                format!("{:.3}V - {:.3}V", stats.min_voltage, stats.max_voltage)
            }
        }
    }
}
