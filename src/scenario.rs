//! Deployment scenario loading, parsing, and validation.
//!
//! A scenario is a JSON file describing one simulation run: the deployment
//! area, the nodes with their protocol stacks, the packets to inject, and
//! the trace artifacts to produce.

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;

use crate::link::mac::MAX_MAC_PAYLOAD;
use crate::link::ShortAddress;
use crate::net::ping_pong::PingPong;
use crate::net::protocol::Protocol;
use crate::sim::SimTime;

/// Error type for scenario loading failures.
#[derive(Debug)]
pub enum ScenarioLoadError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
}

impl fmt::Display for ScenarioLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioLoadError::FileReadError(msg) => write!(f, "Failed to read file: {}", msg),
            ScenarioLoadError::ParseError(msg) => write!(f, "Failed to parse JSON: {}", msg),
            ScenarioLoadError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ScenarioLoadError {}

/// Rectangular deployment area.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Area {
    pub max_x: f64,
    pub max_y: f64,
}

/// A protocol stack entry, tagged by type.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type")]
pub enum ProtocolSpec {
    #[serde(rename = "ping-pong-initiator")]
    PingPongInitiator {
        #[serde(default)]
        start_delay_secs: Option<f64>,
    },
    #[serde(rename = "ping-pong-responder")]
    PingPongResponder,
}

impl ProtocolSpec {
    pub fn build(&self) -> Box<dyn Protocol> {
        match self {
            ProtocolSpec::PingPongInitiator { start_delay_secs } => match start_delay_secs {
                Some(secs) => Box::new(PingPong::with_start_delay(SimTime::from_secs_f64(*secs))),
                None => Box::new(PingPong::initiator()),
            },
            ProtocolSpec::PingPongResponder => Box::new(PingPong::responder()),
        }
    }
}

/// One node of the deployment.
#[derive(Debug, Deserialize, Clone)]
pub struct NodeSpec {
    pub protocols: Vec<ProtocolSpec>,
    /// Explicit short address applied after placement; auto-allocated when
    /// absent.
    #[serde(default)]
    pub address: Option<String>,
    /// Transmit power in dBm; the PHY default when absent.
    #[serde(default)]
    pub tx_power_dbm: Option<f64>,
    #[serde(default)]
    pub sink: bool,
}

/// A packet injection issued by the driver.
#[derive(Debug, Deserialize, Clone)]
pub struct Injection {
    /// Index into the scenario's node list.
    pub node: usize,
    #[serde(default)]
    pub data: Vec<u8>,
    /// Destination short address; broadcast when absent.
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub delay_secs: f64,
    #[serde(default)]
    pub ack: bool,
}

/// Trace artifacts to produce for every node.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TraceSpec {
    #[serde(default)]
    pub pcap_prefix: Option<String>,
    #[serde(default)]
    pub ascii_prefix: Option<String>,
    #[serde(default)]
    pub promiscuous: bool,
}

/// Root structure representing one simulation run.
#[derive(Debug, Deserialize, Clone)]
pub struct Scenario {
    pub area: Area,
    pub duration_secs: f64,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub injections: Vec<Injection>,
    #[serde(default)]
    pub trace: Option<TraceSpec>,
}

/// Load, parse, and validate a scenario file.
pub fn load_scenario(path: &str) -> Result<Scenario, ScenarioLoadError> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path))
        .map_err(|e| ScenarioLoadError::FileReadError(e.to_string()))?;

    let scenario = serde_json::from_str::<Scenario>(&data)
        .context("Invalid JSON format")
        .map_err(|e| ScenarioLoadError::ParseError(e.to_string()))?;

    validate_scenario(&scenario).map_err(ScenarioLoadError::ValidationError)?;

    Ok(scenario)
}

/// Validate scenario invariants before anything is built.
pub fn validate_scenario(scenario: &Scenario) -> Result<(), String> {
    const MAX_NODES: usize = 10_000;

    if scenario.area.max_x <= 0.0 || scenario.area.max_y <= 0.0 {
        return Err(format!(
            "Deployment area {}x{} must have positive bounds",
            scenario.area.max_x, scenario.area.max_y
        ));
    }
    if scenario.duration_secs <= 0.0 {
        return Err("Simulation duration must be positive".to_string());
    }
    if scenario.nodes.is_empty() {
        return Err("Scenario must contain at least one node".to_string());
    }
    if scenario.nodes.len() > MAX_NODES {
        return Err(format!(
            "Node count {} exceeds maximum of {}",
            scenario.nodes.len(),
            MAX_NODES
        ));
    }

    const MIN_TX_POWER_DBM: f64 = -50.0;
    const MAX_TX_POWER_DBM: f64 = 50.0;

    let mut explicit_addresses = HashSet::new();
    for (idx, node) in scenario.nodes.iter().enumerate() {
        if let Some(power) = node.tx_power_dbm {
            if !(MIN_TX_POWER_DBM..=MAX_TX_POWER_DBM).contains(&power) {
                return Err(format!(
                    "Node {} tx power {} dBm outside realistic range ({} to {} dBm)",
                    idx, power, MIN_TX_POWER_DBM, MAX_TX_POWER_DBM
                ));
            }
        }
        if let Some(address) = &node.address {
            let parsed: ShortAddress = address
                .parse()
                .map_err(|e| format!("Node {} address {:?}: {}", idx, address, e))?;
            if parsed.is_broadcast() {
                return Err(format!("Node {} may not use the broadcast address", idx));
            }
            if !explicit_addresses.insert(parsed) {
                return Err(format!("Duplicate explicit address: {}", address));
            }
        }
    }

    for (idx, injection) in scenario.injections.iter().enumerate() {
        if injection.node >= scenario.nodes.len() {
            return Err(format!(
                "Injection {} references node {} but only {} nodes exist",
                idx,
                injection.node,
                scenario.nodes.len()
            ));
        }
        if injection.data.len() > MAX_MAC_PAYLOAD {
            return Err(format!(
                "Injection {} payload of {} bytes exceeds the {} byte maximum",
                idx,
                injection.data.len(),
                MAX_MAC_PAYLOAD
            ));
        }
        if let Some(destination) = &injection.destination {
            destination
                .parse::<ShortAddress>()
                .map_err(|e| format!("Injection {} destination {:?}: {}", idx, destination, e))?;
        }
        if injection.delay_secs < 0.0 {
            return Err(format!("Injection {} delay must be non-negative", idx));
        }
    }

    Ok(())
}
