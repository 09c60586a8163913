//! Simulated inspection peer.
//!
//! [`SimPeer`] is a pure model of the device side of the protocol: it takes
//! one request text and returns the status pushes a real peer would answer
//! with. [`serve`] puts it behind a websocket listener inside a turmoil host.
//!
//! Device behaviour:
//!
//! - `frontend connected` announcement: device list, then a full dump of
//!   every section for every device
//! - trigger raised: acknowledge (or error if not ready), device goes busy
//! - trigger cleared: acknowledge drops, a new image completes, statistics
//!   and output registers update, device ready again
//! - program change raised: acknowledge, loaded program number reported
//! - reset raised: status returns to ready/run with every feedback bit low
//! - register write: value stored and echoed back

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use camlink_proto::{
    Control, DeviceId, FRONTEND_PERIPHERAL, FrameKind, MANAGER_PERIPHERAL, OutboundFrame,
    RegisterValue, Section, Statistics, StatusBits, Variable, VariableSchema,
};
use futures::{SinkExt, StreamExt};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info};
use turmoil::net::TcpListener;

/// State of one simulated device.
#[derive(Debug, Clone, PartialEq)]
pub struct SimDevice {
    /// Status bits.
    pub status: StatusBits,
    /// Cycle statistics, in seconds.
    pub statistics: Statistics,
    /// Program selected for the next program change.
    pub program_number: i64,
    /// Program currently loaded.
    pub program_acknowledge: Option<i64>,
    /// Input register values.
    pub inputs_register: Vec<RegisterValue>,
    /// Input schema.
    pub inputs_variables: VariableSchema,
    /// Output register values.
    pub outputs_register: Vec<RegisterValue>,
    /// Output schema.
    pub outputs_variables: VariableSchema,
    /// Boolean outputs.
    pub outputs_bool_register: Vec<RegisterValue>,
    /// Completed inspections.
    pub images: u64,
}

impl Default for SimDevice {
    fn default() -> Self {
        Self {
            status: StatusBits { ready: true, run: true, ..StatusBits::default() },
            statistics: Statistics::default(),
            program_number: 0,
            program_acknowledge: Some(0),
            inputs_register: vec![RegisterValue::Float(0.5), RegisterValue::Null, RegisterValue::Int(0)],
            inputs_variables: vec![
                Some(Variable::new("threshold", "float")),
                None,
                Some(Variable::new("id", "int")),
            ],
            outputs_register: vec![RegisterValue::Float(0.0), RegisterValue::Int(0)],
            outputs_variables: vec![
                Some(Variable::new("score", "float")),
                Some(Variable::new("count", "int")),
            ],
            outputs_bool_register: vec![RegisterValue::Bool(false)],
            images: 0,
        }
    }
}

/// The simulated peer.
#[derive(Debug, Clone)]
pub struct SimPeer {
    devices: BTreeMap<DeviceId, SimDevice>,
    order: Vec<DeviceId>,
    received: Vec<OutboundFrame>,
    rng: ChaCha8Rng,
}

impl SimPeer {
    /// Peer serving `devices`, in that order. `seed` drives the statistics.
    pub fn new(devices: &[&str], seed: u64) -> Self {
        Self {
            devices: devices.iter().map(|d| ((*d).to_string(), SimDevice::default())).collect(),
            order: devices.iter().map(|d| (*d).to_string()).collect(),
            received: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Device state.
    pub fn device(&self, device: &str) -> Option<&SimDevice> {
        self.devices.get(device)
    }

    /// Every request frame received, in order.
    pub fn received(&self) -> &[OutboundFrame] {
        &self.received
    }

    /// Received control requests for `device`, as `(control, value)`.
    pub fn controls(&self, device: &str) -> Vec<(Control, bool)> {
        self.received
            .iter()
            .filter(|f| f.peripheral == device && f.section.as_deref() == Some("control"))
            .filter_map(|f| {
                let control = Control::from_wire(f.data.as_deref()?)?;
                Some((control, f.value.as_deref()? == "true"))
            })
            .collect()
    }

    /// Replace a device's status and return the push for it.
    pub fn set_status(&mut self, device: &str, status: StatusBits) -> Vec<String> {
        match self.devices.get_mut(device) {
            Some(state) => {
                state.status = status;
                vec![push(device, Section::Status, json_value(&state.status))]
            },
            None => Vec::new(),
        }
    }

    /// Handle one request text. Returns the frames to send back.
    pub fn handle(&mut self, text: &str) -> Vec<String> {
        let frame = match OutboundFrame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "peer dropped undecodable request");
                return Vec::new();
            },
        };

        if frame.peripheral == FRONTEND_PERIPHERAL {
            if frame.kind == FrameKind::Status && frame.data.as_deref() == Some("connected") {
                return self.announce();
            }
            return Vec::new();
        }

        if frame.kind != FrameKind::Request || !self.devices.contains_key(&frame.peripheral) {
            return Vec::new();
        }
        self.received.push(frame.clone());

        let device = frame.peripheral.clone();
        match frame.section.as_deref() {
            Some("control") => {
                let control = frame.data.as_deref().and_then(Control::from_wire);
                let value = frame.value.as_deref() == Some("true");
                match control {
                    Some(control) => self.control(&device, control, value),
                    None => Vec::new(),
                }
            },
            Some("program_number") => {
                let number = frame.value.as_deref().and_then(|v| v.trim().parse().ok());
                if let (Some(number), Some(state)) = (number, self.devices.get_mut(&device)) {
                    state.program_number = number;
                }
                Vec::new()
            },
            Some("inputs_register") => {
                let index = frame.index.as_deref().and_then(|i| i.trim().parse::<usize>().ok());
                let (Some(index), Some(state)) = (index, self.devices.get_mut(&device)) else {
                    return Vec::new();
                };
                let value_type = frame.value_type.as_deref().unwrap_or("string");
                let value = RegisterValue::coerce(value_type, frame.value.as_deref().unwrap_or(""));
                let registers = &mut state.inputs_register;
                if index < registers.len() {
                    registers[index] = value;
                } else if index == registers.len() {
                    registers.push(value);
                } else {
                    return Vec::new();
                }
                vec![push(&device, Section::InputsRegister, json_value(&state.inputs_register))]
            },
            _ => Vec::new(),
        }
    }

    fn announce(&mut self) -> Vec<String> {
        let mut out = vec![
            json!({
                "peripheral": MANAGER_PERIPHERAL,
                "type": "response",
                "data": self.order,
            })
            .to_string(),
        ];
        for device in &self.order {
            if let Some(state) = self.devices.get(device) {
                out.extend(dump(device, state));
            }
        }
        out
    }

    fn control(&mut self, device: &str, control: Control, value: bool) -> Vec<String> {
        let run_time = self.rng.gen_range(0.010..0.050);
        let Some(state) = self.devices.get_mut(device) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        match (control, value) {
            (Control::Trigger, true) => {
                if state.status.ready {
                    state.status.trigger_acknowledge = true;
                    state.status.ready = false;
                    state.status.new_image = false;
                } else {
                    state.status.trigger_error = true;
                }
            },
            (Control::Trigger, false) => {
                let completed = state.status.trigger_acknowledge;
                state.status.trigger_acknowledge = false;
                state.status.trigger_error = false;
                if completed {
                    state.images += 1;
                    state.status.new_image = true;
                    state.status.ready = true;
                    state.statistics = next_statistics(state.statistics, run_time);
                    state.outputs_register =
                        vec![RegisterValue::Float(run_time * 20.0), RegisterValue::Int(state.images as i64)];
                    out.push(push(device, Section::Statistics, json_value(&state.statistics)));
                    out.push(push(device, Section::OutputsRegister, json_value(&state.outputs_register)));
                }
            },
            (Control::ProgramChange, true) => {
                state.program_acknowledge = Some(state.program_number);
                state.status.program_change_acknowledge = true;
                out.push(push(
                    device,
                    Section::ProgramNumberAcknowledge,
                    json_value(&state.program_acknowledge),
                ));
            },
            (Control::ProgramChange, false) => {
                state.status.program_change_acknowledge = false;
                state.status.program_change_error = false;
            },
            (Control::Reset, true) => {
                state.status = StatusBits { ready: true, run: true, ..StatusBits::default() };
            },
            (Control::Reset, false) => return out,
        }
        out.insert(0, push(device, Section::Status, json_value(&state.status)));
        out
    }
}

fn next_statistics(previous: Statistics, run_time: f64) -> Statistics {
    let min = if previous.min_run_time == 0.0 { run_time } else { previous.min_run_time.min(run_time) };
    Statistics { min_run_time: min, run_time, max_run_time: previous.max_run_time.max(run_time) }
}

fn json_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn push(device: &str, section: Section, value: Value) -> String {
    json!({
        "peripheral": device,
        "type": "status",
        "section": section.as_str(),
        "value": value,
    })
    .to_string()
}

fn dump(device: &str, state: &SimDevice) -> Vec<String> {
    vec![
        push(device, Section::Status, json_value(&state.status)),
        push(device, Section::Statistics, json_value(&state.statistics)),
        push(device, Section::ProgramNumberAcknowledge, json_value(&state.program_acknowledge)),
        push(device, Section::InputsVariables, json_value(&state.inputs_variables)),
        push(device, Section::InputsRegister, json_value(&state.inputs_register)),
        push(device, Section::OutputsVariables, json_value(&state.outputs_variables)),
        push(device, Section::OutputsRegister, json_value(&state.outputs_register)),
        push(device, Section::OutputsBoolRegister, json_value(&state.outputs_bool_register)),
    ]
}

/// Serve `peer` over websockets on `addr` inside a turmoil host.
///
/// Connections are handled one at a time. If `close_first_after` is set, the
/// first connection is closed by the peer after that many device requests,
/// to exercise the console's reconnect.
pub async fn serve(
    peer: Arc<Mutex<SimPeer>>,
    addr: &str,
    close_first_after: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    let mut connection = 0usize;

    loop {
        let (stream, remote) = listener.accept().await?;
        connection += 1;
        info!(%remote, connection, "peer accepted connection");

        let mut ws = tokio_tungstenite::accept_async(stream).await?;
        let limit = if connection == 1 { close_first_after } else { None };
        let mut requests = 0usize;

        while let Some(message) = ws.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    debug!(error = %e, "peer connection error");
                    break;
                },
            };
            if !message.is_text() {
                continue;
            }
            let Ok(text) = message.to_text() else { continue };

            let (replies, is_request) = {
                let mut peer = peer.lock().map_err(|_| "peer state poisoned")?;
                let before = peer.received().len();
                let replies = peer.handle(text);
                (replies, peer.received().len() > before)
            };
            for reply in replies {
                ws.send(WsMessage::text(reply)).await?;
            }

            if is_request {
                requests += 1;
                if limit.is_some_and(|limit| requests >= limit) {
                    info!(connection, "peer closing connection");
                    ws.close(None).await?;
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use camlink_proto::{Message, Request, SectionUpdate};

    use super::*;

    fn request(peer: &mut SimPeer, request: &Request) -> Vec<Message> {
        peer.handle(&request.encode().unwrap())
            .iter()
            .map(|text| Message::parse(text).unwrap())
            .collect()
    }

    #[test]
    fn announce_lists_devices_then_dumps() {
        let mut peer = SimPeer::new(&["camA", "camB"], 1);
        let replies = request(&mut peer, &Request::Announce);

        assert_eq!(replies[0], Message::DeviceList(vec!["camA".into(), "camB".into()]));
        assert_eq!(replies.len(), 1 + 2 * 8);
        assert!(replies[1..].iter().all(|m| matches!(m, Message::Status { .. })));
    }

    #[test]
    fn trigger_cycle_completes_an_image() {
        let mut peer = SimPeer::new(&["camA"], 1);
        let raise = Request::Control { device: "camA".into(), control: Control::Trigger, value: true };
        let clear = Request::Control { device: "camA".into(), control: Control::Trigger, value: false };

        let replies = request(&mut peer, &raise);
        let Message::Status { update: SectionUpdate::Status(bits), .. } = &replies[0] else {
            panic!("expected status, got {replies:?}");
        };
        assert!(bits.trigger_acknowledge);
        assert!(!bits.ready);

        let replies = request(&mut peer, &clear);
        assert_eq!(replies.len(), 3);
        let device = peer.device("camA").unwrap();
        assert!(device.status.new_image && device.status.ready);
        assert_eq!(device.images, 1);
        assert!(device.statistics.run_time >= 0.010);
        assert_eq!(peer.controls("camA"), vec![(Control::Trigger, true), (Control::Trigger, false)]);
    }

    #[test]
    fn program_change_reports_program() {
        let mut peer = SimPeer::new(&["camA"], 1);
        request(&mut peer, &Request::ProgramNumber { device: "camA".into(), number: 12 });
        let replies = request(
            &mut peer,
            &Request::Control { device: "camA".into(), control: Control::ProgramChange, value: true },
        );
        assert!(replies.contains(&Message::Status {
            device: "camA".into(),
            update: SectionUpdate::ProgramNumberAcknowledge(Some(12)),
        }));
    }

    #[test]
    fn register_writes_past_the_end_ignored() {
        let mut peer = SimPeer::new(&["camA"], 1);
        let write = |index| Request::InputRegister {
            device: "camA".into(),
            index,
            value_type: "int".into(),
            value: RegisterValue::Int(5),
        };

        assert!(request(&mut peer, &write(usize::MAX)).is_empty());
        assert!(request(&mut peer, &write(9)).is_empty());
        assert_eq!(request(&mut peer, &write(3)).len(), 1);
        assert_eq!(peer.device("camA").unwrap().inputs_register.len(), 4);
    }

    #[test]
    fn unknown_device_requests_ignored() {
        let mut peer = SimPeer::new(&["camA"], 1);
        let replies = request(
            &mut peer,
            &Request::Control { device: "camZ".into(), control: Control::Reset, value: true },
        );
        assert!(replies.is_empty());
        assert!(peer.received().is_empty());
    }
}
