//! Light-curve model parameterizations.
//!
//! A [`FitModel`] states which fitted parameter is the flux-scale amplitude and which ones are
//! the shape/color parameters, in the order they appear in the observable vector. The
//! magnitude-scale observable always comes first, so for SALT2 the light-curve block of the
//! schema reads `[mB, x1, c]`.
use std::{fmt, str::FromStr};

use crate::{
    constants::SALT2_X0_ZERO_POINT, conversion::MagnitudeModel, prep_errors::PrepError,
};

/// Name of the magnitude observable replacing the amplitude.
pub const MAGNITUDE_OBSERVABLE: &str = "mB";

#[derive(Debug, Clone, PartialEq)]
pub enum FitModel {
    /// SALT2: amplitude `x0`, stretch `x1`, color `c`.
    Salt2,
    /// SNEMO2: amplitude `c0`, one spectral component `c1`, color law amplitude `As`.
    Snemo2,
    /// SNEMO7: amplitude `c0`, components `c1..c6`, color law amplitude `As`.
    Snemo7,
    /// Any other parameterization.
    Custom {
        name: String,
        amplitude: String,
        shape: Vec<String>,
        magnitude: MagnitudeModel,
    },
}

impl FitModel {
    pub fn name(&self) -> &str {
        match self {
            FitModel::Salt2 => "salt2",
            FitModel::Snemo2 => "snemo2",
            FitModel::Snemo7 => "snemo7",
            FitModel::Custom { name, .. } => name,
        }
    }

    /// Fitted parameter carrying the flux scale.
    pub fn amplitude_param(&self) -> &str {
        match self {
            FitModel::Salt2 => "x0",
            FitModel::Snemo2 | FitModel::Snemo7 => "c0",
            FitModel::Custom { amplitude, .. } => amplitude,
        }
    }

    /// Shape and color parameters, in observable order.
    pub fn shape_params(&self) -> Vec<String> {
        let names: &[&str] = match self {
            FitModel::Salt2 => &["x1", "c"],
            FitModel::Snemo2 => &["c1", "As"],
            FitModel::Snemo7 => &["c1", "c2", "c3", "c4", "c5", "c6", "As"],
            FitModel::Custom { shape, .. } => return shape.clone(),
        };
        names.iter().map(|s| s.to_string()).collect()
    }

    /// Where the magnitude value comes from.
    ///
    /// SALT2 uses the `x0` zero point; SNEMO magnitudes are synthesized by the external fitter
    /// from the full spectral model and travel with the fit result.
    pub fn magnitude_model(&self) -> MagnitudeModel {
        match self {
            FitModel::Salt2 => MagnitudeModel::ZeroPoint(SALT2_X0_ZERO_POINT),
            FitModel::Snemo2 | FitModel::Snemo7 => MagnitudeModel::External,
            FitModel::Custom { magnitude, .. } => magnitude.clone(),
        }
    }

    /// Observable names of the light-curve block: `[mB, shape...]`.
    pub fn observable_names(&self) -> Vec<String> {
        std::iter::once(MAGNITUDE_OBSERVABLE.to_string())
            .chain(self.shape_params())
            .collect()
    }
}

impl fmt::Display for FitModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FitModel {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "salt2" => Ok(FitModel::Salt2),
            "snemo2" => Ok(FitModel::Snemo2),
            "snemo7" => Ok(FitModel::Snemo7),
            _ => Err(PrepError::InvalidConfig(format!("Unknown fit model: {s}"))),
        }
    }
}

#[cfg(test)]
mod fit_model_test {
    use super::*;

    #[test]
    fn test_observable_names() {
        assert_eq!(FitModel::Salt2.observable_names(), vec!["mB", "x1", "c"]);
        assert_eq!(FitModel::Snemo2.observable_names().len(), 3);
        // 1 magnitude + 7 shape/color, the host mass is appended by the merger
        assert_eq!(FitModel::Snemo7.observable_names().len(), 8);
        assert_eq!("SNEMO7".parse::<FitModel>().unwrap(), FitModel::Snemo7);
    }

    #[test]
    fn test_magnitude_model() {
        assert_eq!(
            FitModel::Salt2.magnitude_model(),
            MagnitudeModel::ZeroPoint(10.63)
        );
        assert_eq!(FitModel::Snemo7.magnitude_model(), MagnitudeModel::External);
    }
}
