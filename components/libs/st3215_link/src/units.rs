//! Presentation units for raw encoder ticks.

use crate::packet::Position;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uom::si::angle::{degree, radian, revolution};
use uom::si::f32::Angle;

/// One full turn of the output shaft.
const TICKS_PER_REV: f32 = 4096.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Register value, 0 to 4095.
    #[default]
    Raw,
    Deg,
    Rad,
}

/// Angle of `position` away from `center`, both in ticks.
pub fn offset(position: Position, center: f32) -> Angle {
    Angle::new::<revolution>((position.clamped() as f32 - center) / TICKS_PER_REV)
}

impl Units {
    /// `position` as a number in these units.  Deg and rad count from `center`.
    pub fn present(self, position: Position, center: f32) -> f32 {
        match self {
            Self::Raw => position.clamped() as f32,
            Self::Deg => offset(position, center).get::<degree>(),
            Self::Rad => offset(position, center).get::<radian>(),
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Self::Raw => "",
            Self::Deg => "°",
            Self::Rad => " rad",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Raw => "raw",
            Self::Deg => "deg",
            Self::Rad => "rad",
        })
    }
}

impl FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Raw, Self::Deg, Self::Rad]
            .into_iter()
            .find(|u| u.to_string() == s)
            .ok_or_else(|| format!("unknown units '{s}' (expected raw, deg or rad)"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_it_prints() {
        for units in [Units::Raw, Units::Deg, Units::Rad] {
            assert_eq!(units.to_string().parse::<Units>(), Ok(units));
        }
        assert!("furlong".parse::<Units>().is_err());
    }

    #[test]
    fn quarter_turn_either_side_of_center() {
        let center = 2048.0;
        assert!((Units::Deg.present(Position(3072), center) - 90.0).abs() < 1e-3);
        assert!(
            (Units::Rad.present(Position(1024), center) + core::f32::consts::FRAC_PI_2).abs()
                < 1e-4
        );
        assert_eq!(Units::Raw.present(Position(3072), center), 3072.0);
    }

    #[test]
    fn out_of_range_ticks_are_clamped_first() {
        assert_eq!(Units::Raw.present(Position(u16::MAX), 0.0), 4095.0);
        let deg = Units::Deg.present(Position(u16::MAX), 2047.5);
        assert!((deg - 180.0).abs() < 0.1, "{deg}");
    }
}
