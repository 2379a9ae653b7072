use anyhow::{Context, anyhow};
use env_logger::Builder;
use log::{LevelFilter, debug, info};
use std::env;
use std::rc::Rc;

use crate::config::SimConfig;
use crate::link::{AddressConfig, ShortAddress};
use crate::net::{Node, SendRequest, Wsn};
use crate::scenario::{Scenario, load_scenario};
use crate::sim::{Scheduler, SimTime};
use crate::trace::Tracer;

mod config;
mod link;
mod net;
mod scenario;
mod sim;
mod trace;

fn run(scenario: &Scenario, config: &SimConfig) -> anyhow::Result<()> {
    let scheduler = Rc::new(Scheduler::new());
    let tracer = Rc::new(match &config.trace_dir {
        Some(dir) => Tracer::with_output_dir(dir),
        None => Tracer::new(),
    });

    let mut wsn = match config.seed {
        Some(seed) => Wsn::with_seed(scenario.area.max_x, scenario.area.max_y, &scheduler, seed),
        None => Wsn::new(scenario.area.max_x, scenario.area.max_y, &scheduler),
    };

    let mut batch = Vec::with_capacity(scenario.nodes.len());
    for spec in &scenario.nodes {
        let protocols = spec.protocols.iter().map(|p| p.build()).collect();
        let node = if spec.sink {
            Node::new_sink(protocols, &scheduler, &tracer)
        } else {
            Node::new(protocols, &scheduler, &tracer)
        };
        batch.push(node);
    }
    wsn.place(batch);

    // Explicit addresses override the placement-time allocation.
    for (node, spec) in wsn.view_nodes().iter().zip(&scenario.nodes) {
        if let Some(address) = &spec.address {
            let address: ShortAddress = address
                .parse()
                .map_err(|e| anyhow!("address {address:?}: {e}"))?;
            node.set_address(AddressConfig::Explicit(address));
        }
        if let Some(power) = spec.tx_power_dbm {
            node.set_tx_power_dbm(power);
        }
    }

    for node in wsn.view_nodes() {
        node.init_protocols();
    }

    if let Some(trace) = &scenario.trace {
        for node in wsn.view_nodes() {
            if let Some(prefix) = &trace.pcap_prefix {
                node.enable_pcap(prefix, trace.promiscuous, false)
                    .with_context(|| format!("enabling pcap trace for {node}"))?;
            }
            if let Some(prefix) = &trace.ascii_prefix {
                node.enable_ascii(prefix, false)
                    .with_context(|| format!("enabling ascii trace for {node}"))?;
            }
        }
    }

    for injection in &scenario.injections {
        let destination = match &injection.destination {
            Some(address) => address
                .parse()
                .map_err(|e| anyhow!("destination {address:?}: {e}"))?,
            None => ShortAddress::BROADCAST,
        };
        wsn.view_nodes()[injection.node].send_packet(SendRequest {
            data: injection.data.clone(),
            destination,
            delay: SimTime::from_secs_f64(injection.delay_secs),
            ack: injection.ack,
        });
    }

    let duration = SimTime::from_secs_f64(scenario.duration_secs);
    let executed = scheduler.run_until(duration);
    info!(
        "simulation complete: {} events over {} with {} nodes",
        executed,
        scheduler.now(),
        wsn.view_nodes().len()
    );

    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Logging setup
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("wsn_simulator"), LevelFilter::Debug)
        .init();

    info!("Starting up");

    let scenario_path = env::args()
        .nth(1)
        .context("usage: wsn-simulator <scenario.json>")?;
    let scenario = load_scenario(&scenario_path)?;

    let config_path = SimConfig::config_path_from_scenario(&scenario_path);
    let config = if config_path.exists() {
        SimConfig::load(&config_path).map_err(|e| anyhow!(e))?
    } else {
        debug!("no config file at {}, using defaults", config_path.display());
        SimConfig::default()
    };

    run(&scenario, &config)
}
