//! # Constants and type definitions for unity_prep
//!
//! This module centralizes the **physical constants**, the **empirical corrections** carried
//! over from the survey-specific preparation scripts, and the **type aliases** used throughout
//! the crate.
//!
//! ## Overview
//!
//! - Physical constants (speed of light, CMB dipole)
//! - Magnitude-system constants used by the unit converter
//! - Empirical corrections applied after cuts (systematic floors, exploratory shifts)
//! - Pass-through priors forwarded to the external sampler
//! - Core type aliases
//!
//! The empirical values are exposed as named constants so that every pipeline run states
//! explicitly which of them it applies. None of them is applied implicitly: each one is the
//! default of a configuration field that the caller can override.

// -------------------------------------------------------------------------------------------------
// Physical constants and unit conversions
// -------------------------------------------------------------------------------------------------

/// Speed of light in km/s
pub const VLIGHT: f64 = 2.99792458e5;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

/// Heliocentric velocity relative to the CMB rest frame, in km/s (NED)
pub const CMB_DIPOLE_VELOCITY: f64 = 371.0;

/// Right ascension of the CMB dipole apex, J2000 degrees (NED)
pub const CMB_DIPOLE_RA: Degree = 168.01190437;

/// Declination of the CMB dipole apex, J2000 degrees (NED)
pub const CMB_DIPOLE_DEC: Degree = -6.98296811;

/// Pogson ratio: magnitudes per decade of flux
pub const POGSON: f64 = 2.5;

/// Numerical tolerance for covariance symmetry checks
pub const SYMMETRY_EPS: f64 = 1e-10;

/// Relative tolerance below zero for covariance eigenvalues (positive semi-definiteness)
pub const PSD_EPS: f64 = 1e-10;

// -------------------------------------------------------------------------------------------------
// Empirical corrections
// -------------------------------------------------------------------------------------------------

/// Zero point turning SALT2 `x0` into a rest-frame B magnitude: `mB = -2.5 log10(x0) + 10.63`.
///
/// Read off an `mB + 2.5 log10(x0)` versus color diagram; it only offsets `mB` and has no effect
/// on the propagated covariance.
pub const SALT2_X0_ZERO_POINT: f64 = 10.63;

/// Systematic floor (dex) added in quadrature to the host-mass variance after cuts.
pub const HOST_MASS_FLOOR: f64 = 0.1;

/// Host-mass split between the low- and high-mass populations, log10(M/M☉).
pub const HOST_MASS_SPLIT: f64 = 10.0;

/// Exploratory additive shift used for the color-sensitivity variants.
pub const EXPLORATORY_COLOR_SHIFT: f64 = 0.1;

/// Alternate exploratory color offset. Kept as a named value; its intended scope is unknown.
pub const ALTERNATE_COLOR_SHIFT: f64 = -0.27;

/// Default bound on `|v[j]|` for shape and color parameters in the quality cut.
pub const DEFAULT_MAX_ABS_PARAMETER: f64 = 5.0;

/// Default bound on the 1-σ uncertainty of shape and color parameters in the quality cut.
pub const DEFAULT_MAX_UNCERTAINTY: f64 = 2.0;

/// Host-mass uncertainty assigned when a mass table gives no error column.
pub const DEFAULT_MASS_ERR: f64 = 0.3;

// -------------------------------------------------------------------------------------------------
// Sampler pass-through priors
// -------------------------------------------------------------------------------------------------

/// Mean of the log outlier-fraction prior.
pub const OUTLIER_FRACTION_PRIOR_LNMEAN: f64 = -4.6;

/// Width of the log outlier-fraction prior.
pub const OUTLIER_FRACTION_PRIOR_LNWIDTH: f64 = 1.0;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Angle in radians
pub type Radian = f64;
/// Magnitude (AB)
pub type Magnitude = f64;
/// Dimensionless redshift
pub type Redshift = f64;
/// Canonical supernova name, the join key across catalogs
pub type ObjectName = String;
