//! Gas species table.

use serde::{Deserialize, Serialize};

/// Number of simulated gas species.
pub const GAS_COUNT: usize = 6;

/// A simulated gas species. The discriminant is the index into mole arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Gas {
    Oxygen = 0,
    Nitrogen = 1,
    CarbonDioxide = 2,
    Plasma = 3,
    Tritium = 4,
    WaterVapor = 5,
}

/// Specific heat per species in J/(mol·K), indexed by `Gas as usize`.
pub const SPECIFIC_HEATS: [f32; GAS_COUNT] = [20.0, 30.0, 30.0, 200.0, 10.0, 40.0];

impl Gas {
    pub const ALL: [Gas; GAS_COUNT] = [
        Gas::Oxygen,
        Gas::Nitrogen,
        Gas::CarbonDioxide,
        Gas::Plasma,
        Gas::Tritium,
        Gas::WaterVapor,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Look up a species by index. Returns `None` past the table.
    pub fn from_index(index: usize) -> Option<Gas> {
        Self::ALL.get(index).copied()
    }

    pub fn specific_heat(self) -> f32 {
        SPECIFIC_HEATS[self.index()]
    }

    pub fn label(self) -> &'static str {
        match self {
            Gas::Oxygen => "O2",
            Gas::Nitrogen => "N2",
            Gas::CarbonDioxide => "CO2",
            Gas::Plasma => "Plasma",
            Gas::Tritium => "Tritium",
            Gas::WaterVapor => "H2O",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrips_through_table() {
        for gas in Gas::ALL {
            assert_eq!(Gas::from_index(gas.index()), Some(gas));
        }
        assert_eq!(Gas::from_index(GAS_COUNT), None);
    }

    #[test]
    fn test_plasma_holds_the_most_heat() {
        let max = Gas::ALL
            .iter()
            .max_by(|a, b| a.specific_heat().total_cmp(&b.specific_heat()))
            .copied();
        assert_eq!(max, Some(Gas::Plasma));
    }
}
