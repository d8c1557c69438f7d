//! # Heliocentric ↔ CMB-frame redshifts
//!
//! Some metadata tables publish only one of the two redshifts together with the sky position.
//! The other one is recovered with a fixed peculiar-velocity model: the Sun moves at
//! [`CMB_DIPOLE_VELOCITY`] toward the dipole apex ([`CMB_DIPOLE_RA`], [`CMB_DIPOLE_DEC`]), so an
//! object at unit direction `n̂` sees a line-of-sight velocity `v·(n̂_cmb · n̂)`.
//!
//! ```text
//! dz            = (v / c) · (n̂_cmb · n̂)
//! 1 + z_pec     = sqrt((1 - dz) / (1 + dz))
//! 1 + z_cmb     = (1 + z_helio) / (1 + z_pec)
//! ```
use nalgebra::Vector3;

use crate::constants::{
    Degree, Redshift, CMB_DIPOLE_DEC, CMB_DIPOLE_RA, CMB_DIPOLE_VELOCITY, RADEG, VLIGHT,
};

/// Unit vector of an equatorial direction given in degrees.
pub fn radec_to_unit_vector(ra: Degree, dec: Degree) -> Vector3<f64> {
    let (ra, dec) = (ra * RADEG, dec * RADEG);
    Vector3::new(dec.cos() * ra.cos(), dec.cos() * ra.sin(), dec.sin())
}

/// Dipole redshift projected on the line of sight, `(v/c)·(n̂_cmb · n̂)`.
pub fn dipole_dz(ra: Degree, dec: Degree) -> f64 {
    let apex = radec_to_unit_vector(CMB_DIPOLE_RA, CMB_DIPOLE_DEC);
    CMB_DIPOLE_VELOCITY / VLIGHT * apex.dot(&radec_to_unit_vector(ra, dec))
}

/// `1 + z_pec` of the solar motion along the line of sight.
fn one_plus_z_pec(ra: Degree, dec: Degree) -> f64 {
    let dz = -dipole_dz(ra, dec);
    ((1.0 + dz) / (1.0 - dz)).sqrt()
}

/// Convert a heliocentric redshift to the CMB frame.
pub fn helio_to_cmb(ra: Degree, dec: Degree, z_helio: Redshift) -> Redshift {
    (1.0 + z_helio) / one_plus_z_pec(ra, dec) - 1.0
}

/// Convert a CMB-frame redshift to the heliocentric frame.
pub fn cmb_to_helio(ra: Degree, dec: Degree, z_cmb: Redshift) -> Redshift {
    (1.0 + z_cmb) * one_plus_z_pec(ra, dec) - 1.0
}
