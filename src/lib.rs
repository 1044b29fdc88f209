//! Pre-match probability modelling for association football statistics.
//! Estimates team rates from bounded history, corrects the independent-Poisson
//! assumption for low scorelines, derives market probabilities from a score grid and
//! blends multiple models into a confidence-weighted, league-calibrated prediction.

#![allow(clippy::too_many_arguments)]

pub mod cache;
pub mod calibrate;
pub mod data;
pub mod dixon_coles;
pub mod domain;
pub mod ensemble;
pub mod factorial;
pub mod league;
pub mod linear;
pub mod market;
pub mod model;
pub mod opt;
pub mod poisson;
pub mod probs;
pub mod rates;
pub mod scoregrid;

#[doc = include_str!("../README.md")]
#[cfg(doc)]
fn readme() {}
