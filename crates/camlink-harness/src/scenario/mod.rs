//! Scenario testing with mandatory oracles.
//!
//! A scenario scripts operator commands, peer status pushes, and the passage
//! of time against a console wired to a [`crate::SimPeer`]. Every scenario
//! must end in an oracle that checks the final [`World`].

mod builder;
mod world;

pub use builder::{RunnableScenario, Scenario, Step};
pub use world::World;

/// Verification run on the final world.
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;

/// Reusable oracles.
pub mod oracle {
    use camlink_core::handshake::{CommandKind, LatchState};
    use camlink_proto::{Control, Request};

    use super::{OracleFn, World};

    /// Every latch with feedback bits (trigger, program change) on every
    /// device is back to idle.
    pub fn latches_idle() -> OracleFn {
        Box::new(|world: &World| {
            for device in world.registry().devices() {
                let Some(session) = world.registry().session(device) else { continue };
                for kind in [CommandKind::Trigger, CommandKind::ProgramChange] {
                    if session.latch(kind) != LatchState::Idle {
                        return Err(format!("{device}: {kind} latch still requested"));
                    }
                }
            }
            Ok(())
        })
    }

    /// Exactly `count` control requests `(control, value)` were sent to
    /// `device`.
    pub fn sent_count(device: &str, control: Control, value: bool, count: usize) -> OracleFn {
        let device = device.to_string();
        Box::new(move |world: &World| {
            let sent = world
                .sent()
                .iter()
                .filter(|r| {
                    matches!(r, Request::Control { device: d, control: c, value: v }
                        if *d == device && *c == control && *v == value)
                })
                .count();
            if sent == count {
                Ok(())
            } else {
                Err(format!("{device}: expected {count} {control}={value} requests, saw {sent}"))
            }
        })
    }

    /// `device` is the active device.
    pub fn active(device: &str) -> OracleFn {
        let device = device.to_string();
        Box::new(move |world: &World| match world.registry().active() {
            Some(active) if active == device => Ok(()),
            other => Err(format!("expected {device} active, found {other:?}")),
        })
    }

    /// All of the given oracles hold.
    pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
        Box::new(move |world: &World| oracles.iter().try_for_each(|oracle| oracle(world)))
    }
}
