//! MB-006: Rate-limited ramp toward a channel's target setpoint.

use super::error::Result;
use super::store::{VariableStore, RAMPED_CHANNELS};

/// Advance `channel.PV` toward `channel.PV.TSP` by at most
/// `dt * rate / 60` (rate is per minute). Clamps exactly onto the target
/// once the remaining gap is no larger than one step.
pub fn advance(store: &mut VariableStore, dt: f64, channel: &str) -> Result<()> {
    let pv_key = format!("{channel}.PV");
    let pv = store.get_f64(&pv_key)?;
    let tsp = store.get_f64(&format!("{channel}.PV.TSP"))?;
    let rate = store.get_f64(&format!("{channel}.PV.Rate"))?;

    let diff = tsp - pv;
    if diff == 0.0 {
        return Ok(());
    }

    let step = dt * rate / 60.0 * diff.signum();
    if step.abs() < diff.abs() {
        store.set(pv_key, pv + step);
    } else {
        store.set(pv_key, tsp);
    }
    Ok(())
}

/// Advance every ramped channel by one step. Channels are independent.
pub fn advance_all(store: &mut VariableStore, dt: f64) -> Result<()> {
    for channel in RAMPED_CHANNELS {
        advance(store, dt, channel)?;
    }
    Ok(())
}
