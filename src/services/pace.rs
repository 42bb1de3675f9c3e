// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Speed to pace conversion.

/// Minutes per kilometre at 1 m/s.
const MINUTES_PER_KM_AT_1_MPS: f64 = 1000.0 / 60.0;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum PaceError {
    #[error("speed must be a positive finite number, got {0}")]
    InvalidSpeed(f64),
}

/// Convert a speed in metres per second to a `M:SS/km` pace string.
pub fn format_pace(speed_mps: f64) -> Result<String, PaceError> {
    if !speed_mps.is_finite() || speed_mps <= 0.0 {
        return Err(PaceError::InvalidSpeed(speed_mps));
    }

    let pace = MINUTES_PER_KM_AT_1_MPS / speed_mps;
    if !pace.is_finite() {
        // Denormal speeds overflow to an infinite pace.
        return Err(PaceError::InvalidSpeed(speed_mps));
    }

    let mut minutes = pace.trunc() as u64;
    let mut seconds = ((pace - pace.trunc()) * 60.0).round() as u64;
    if seconds >= 60 {
        minutes += 1;
        seconds = 0;
    }

    Ok(format!("{}:{:02}/km", minutes, seconds))
}
