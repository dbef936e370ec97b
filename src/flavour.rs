use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use thiserror::Error;

/// Neutrino flavour, including antineutrinos
#[derive(
    Copy,
    Clone,
    Debug,
    Display,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    EnumIter,
    EnumString,
    Deserialize,
    Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Flavour {
    Nue,
    Numu,
    Nutau,
    NueBar,
    NumuBar,
    NutauBar,
}

impl Flavour {
    /// The three neutrino flavours, without antineutrinos
    pub const PARTICLES: [Flavour; 3] = [Flavour::Nue, Flavour::Numu, Flavour::Nutau];

    /// The antiparticle of a neutrino and vice versa
    pub fn bar(self) -> Self {
        use Flavour::*;
        match self {
            Nue => NueBar,
            Numu => NumuBar,
            Nutau => NutauBar,
            NueBar => Nue,
            NumuBar => Numu,
            NutauBar => Nutau,
        }
    }

    pub fn is_antiparticle(self) -> bool {
        matches!(self, Flavour::NueBar | Flavour::NumuBar | Flavour::NutauBar)
    }

    /// Particle ID used in the simulation files
    pub fn pid(self, convention: PidConvention) -> i32 {
        use Flavour::*;
        match convention {
            PidConvention::Pdg => match self {
                Nue => 12,
                Numu => 14,
                Nutau => 16,
                NueBar => -12,
                NumuBar => -14,
                NutauBar => -16,
            },
            PidConvention::Legacy => match self {
                Nue => 66,
                Numu => 68,
                Nutau => 133,
                NueBar => 67,
                NumuBar => 69,
                NutauBar => 134,
            },
        }
    }
}

/// Numbering scheme for particle IDs
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum PidConvention {
    /// Particle Data Group Monte Carlo numbering
    #[default]
    Pdg,
    /// Numbering used in older simulation sets
    Legacy,
}

/// Charged-current or neutral-current interaction
#[derive(
    Copy,
    Clone,
    Debug,
    Display,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    EnumIter,
    Deserialize,
    Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Interaction {
    Cc,
    Nc,
}

impl Interaction {
    /// Value of the `InteractionType` column for this interaction
    pub fn code(self) -> i32 {
        match self {
            Interaction::Cc => 1,
            Interaction::Nc => 2,
        }
    }
}

#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("Invalid interaction type `{0}`: expected `cc` or `nc`")]
pub struct InvalidInteractionType(pub String);

impl std::str::FromStr for Interaction {
    type Err = InvalidInteractionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cc" => Ok(Self::Cc),
            "nc" => Ok(Self::Nc),
            _ => Err(InvalidInteractionType(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;
    use strum::IntoEnumIterator;

    #[test]
    fn names() {
        assert_eq!(Flavour::NumuBar.to_string(), "numu_bar");
        assert_eq!("nutau_bar".parse::<Flavour>(), Ok(Flavour::NutauBar));
        assert_eq!(Interaction::Nc.to_string(), "nc");
        assert_eq!("cc".parse::<Interaction>(), Ok(Interaction::Cc));
        assert_eq!(
            "CC".parse::<Interaction>(),
            Err(InvalidInteractionType("CC".to_owned()))
        );
    }

    #[test]
    fn antiparticles() {
        for flavour in Flavour::iter() {
            assert_eq!(flavour.bar().bar(), flavour);
            assert_ne!(flavour.is_antiparticle(), flavour.bar().is_antiparticle());
            assert_eq!(
                flavour.pid(PidConvention::Pdg),
                -flavour.bar().pid(PidConvention::Pdg)
            );
        }
        let all: Vec<_> = Flavour::PARTICLES
            .into_iter()
            .flat_map(|f| [f, f.bar()])
            .sorted()
            .collect();
        assert_eq!(all, Flavour::iter().sorted().collect::<Vec<_>>());
        assert!(Flavour::PARTICLES.iter().all(|f| !f.is_antiparticle()));
    }

    #[test]
    fn legacy_pids() {
        let pids: Vec<_> = Flavour::iter()
            .map(|f| f.pid(PidConvention::Legacy))
            .collect();
        assert_eq!(pids, [66, 68, 133, 67, 69, 134]);
    }
}
