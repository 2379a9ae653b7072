//! Network deployment manager.
//!
//! Owns the shared medium, a randomized position source, and the registry
//! of placed nodes. Placement is the only way a node enters the registry,
//! and there is no removal: once placed, a node belongs to the deployment
//! for the rest of the run.

use std::rc::Rc;

use log::info;
use rand::SeedableRng;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;

use crate::link::propagation::{ConstantSpeedDelay, LogDistanceLoss};
use crate::link::{AddressConfig, Medium, PanConfig};
use crate::sim::Scheduler;

use super::node::Node;
use super::point::Point3;

/// Source of deployment positions.
pub trait PositionAllocator {
    fn next(&mut self) -> Point3;
}

/// Independent uniform draws over `[0, max_x) × [0, max_y)` on the ground
/// plane. Overlapping positions are permitted by design.
pub struct RandomRectangleAllocator {
    x: Uniform<f64>,
    y: Uniform<f64>,
    rng: StdRng,
}

impl RandomRectangleAllocator {
    pub fn new(max_x: f64, max_y: f64) -> RandomRectangleAllocator {
        RandomRectangleAllocator {
            x: Uniform::new(0.0, max_x),
            y: Uniform::new(0.0, max_y),
            rng: StdRng::from_entropy(),
        }
    }

    /// Seeded variant for reproducible deployments.
    pub fn with_seed(max_x: f64, max_y: f64, seed: u64) -> RandomRectangleAllocator {
        RandomRectangleAllocator {
            x: Uniform::new(0.0, max_x),
            y: Uniform::new(0.0, max_y),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl PositionAllocator for RandomRectangleAllocator {
    fn next(&mut self) -> Point3 {
        Point3::new([self.x.sample(&mut self.rng), self.y.sample(&mut self.rng), 0.0])
    }
}

pub struct Wsn {
    nodes: Vec<Rc<Node>>,
    medium: Rc<Medium>,
    positions: Box<dyn PositionAllocator>,
}

impl Wsn {
    /// Deployment over a `max_x` by `max_y` rectangle. The shared medium
    /// carries a log-distance loss model and a constant-speed delay model.
    pub fn new(max_x: f64, max_y: f64, scheduler: &Rc<Scheduler>) -> Wsn {
        Wsn::with_allocator(
            scheduler,
            Box::new(RandomRectangleAllocator::new(max_x, max_y)),
        )
    }

    /// Seeded deployment for reproducible placement.
    pub fn with_seed(max_x: f64, max_y: f64, scheduler: &Rc<Scheduler>, seed: u64) -> Wsn {
        Wsn::with_allocator(
            scheduler,
            Box::new(RandomRectangleAllocator::with_seed(max_x, max_y, seed)),
        )
    }

    pub fn with_allocator(
        scheduler: &Rc<Scheduler>,
        positions: Box<dyn PositionAllocator>,
    ) -> Wsn {
        let medium = Rc::new(Medium::new(
            scheduler.clone(),
            Box::new(LogDistanceLoss::default()),
            Box::new(ConstantSpeedDelay::default()),
        ));
        Wsn {
            nodes: Vec::new(),
            medium,
            positions,
        }
    }

    pub fn medium(&self) -> &Rc<Medium> {
        &self.medium
    }

    /// Deploy a batch of nodes. For each node in batch order: draw a fresh
    /// position, bind the shared medium, auto-assign a short address, and
    /// join the default PAN, then append it to the registry.
    pub fn place(&mut self, nodes: Vec<Node>) {
        for node in nodes {
            node.set_position(self.positions.next());
            node.set_channel(&self.medium);
            node.set_address(AddressConfig::AutoAllocate);
            node.set_pan(PanConfig::Default);
            info!("placed {node}");
            self.nodes.push(node.into_shared());
        }
    }

    /// Read-only, insertion-ordered view of every node placed so far.
    pub fn view_nodes(&self) -> &[Rc<Node>] {
        &self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{Packet, PanId, ShortAddress};
    use crate::net::node::SendRequest;
    use crate::net::ping_pong::PingPong;
    use crate::net::point::Vector3;
    use crate::net::protocol::{Protocol, TxOutcome};
    use crate::sim::SimTime;
    use crate::trace::Tracer;
    use std::cell::RefCell;

    fn context() -> (Rc<Scheduler>, Rc<Tracer>) {
        (Rc::new(Scheduler::new()), Rc::new(Tracer::new()))
    }

    fn bare_node(scheduler: &Rc<Scheduler>, tracer: &Rc<Tracer>) -> Node {
        Node::new(Vec::new(), scheduler, tracer)
    }

    #[test]
    fn placed_positions_stay_within_bounds() {
        let (scheduler, tracer) = context();
        let mut wsn = Wsn::new(150.0, 150.0, &scheduler);
        let batch: Vec<Node> = (0..25).map(|_| bare_node(&scheduler, &tracer)).collect();
        wsn.place(batch);

        for node in wsn.view_nodes() {
            let position = node.position().expect("placement binds a position");
            assert!((0.0..150.0).contains(&position.x));
            assert!((0.0..150.0).contains(&position.y));
            assert_eq!(position.z, 0.0);
        }
    }

    #[test]
    fn placement_configures_address_and_pan() {
        let (scheduler, tracer) = context();
        let mut wsn = Wsn::new(100.0, 100.0, &scheduler);
        wsn.place(vec![bare_node(&scheduler, &tracer)]);

        let node = &wsn.view_nodes()[0];
        assert_ne!(node.address(), ShortAddress::UNASSIGNED);
        assert!(!node.address().is_broadcast());
        assert_eq!(node.pan_id(), PanId::DEFAULT);
    }

    #[test]
    fn registry_keeps_batch_order() {
        let (scheduler, tracer) = context();
        let mut wsn = Wsn::new(100.0, 100.0, &scheduler);
        wsn.place(vec![
            bare_node(&scheduler, &tracer),
            Node::new_sink(Vec::new(), &scheduler, &tracer),
            bare_node(&scheduler, &tracer),
        ]);

        let nodes = wsn.view_nodes();
        assert_eq!(nodes.len(), 3);
        assert_eq!(wsn.medium().device_count(), 3);
        // The sink marker identifies the middle node of the batch, and
        // auto-allocated addresses grow in placement order.
        assert!(!nodes[0].is_sink());
        assert!(nodes[1].is_sink());
        assert!(!nodes[2].is_sink());
        assert!(nodes[0].address() < nodes[1].address());
        assert!(nodes[1].address() < nodes[2].address());
    }

    #[test]
    fn view_nodes_is_idempotent() {
        let (scheduler, tracer) = context();
        let mut wsn = Wsn::new(100.0, 100.0, &scheduler);
        wsn.place(vec![
            bare_node(&scheduler, &tracer),
            bare_node(&scheduler, &tracer),
        ]);

        let first: Vec<_> = wsn.view_nodes().iter().map(Rc::as_ptr).collect();
        let second: Vec<_> = wsn.view_nodes().iter().map(Rc::as_ptr).collect();
        assert_eq!(first, second);
    }

    struct Observer {
        tx_times: Rc<RefCell<Vec<(SimTime, TxOutcome)>>>,
        rx_payloads: Rc<RefCell<Vec<Vec<u8>>>>,
        scheduler: Rc<Scheduler>,
    }

    impl Protocol for Observer {
        fn init(&mut self, _node: &Node) {}

        fn on_tx(&mut self, _node: &Node, outcome: TxOutcome) {
            self.tx_times
                .borrow_mut()
                .push((self.scheduler.now(), outcome));
        }

        fn on_rx(&mut self, _node: &Node, packet: &Packet) {
            self.rx_payloads.borrow_mut().push(packet.payload().to_vec());
        }
    }

    // The end-to-end deployment scenario: 150 by 150 area, two ping-pong
    // nodes, a delayed broadcast from the first node.
    #[test]
    fn broadcast_scenario_delivers_and_confirms() {
        let (scheduler, tracer) = context();
        let mut wsn = Wsn::new(150.0, 150.0, &scheduler);

        let tx_times = Rc::new(RefCell::new(Vec::new()));
        let rx_payloads = Rc::new(RefCell::new(Vec::new()));

        let node_a = Node::new(
            vec![
                Box::new(PingPong::with_start_delay(SimTime::from_secs(1))),
                Box::new(Observer {
                    tx_times: tx_times.clone(),
                    rx_payloads: Rc::new(RefCell::new(Vec::new())),
                    scheduler: scheduler.clone(),
                }),
            ],
            &scheduler,
            &tracer,
        );
        let node_b = Node::new(
            vec![
                Box::new(PingPong::responder()),
                Box::new(Observer {
                    tx_times: Rc::new(RefCell::new(Vec::new())),
                    rx_payloads: rx_payloads.clone(),
                    scheduler: scheduler.clone(),
                }),
            ],
            &scheduler,
            &tracer,
        );

        wsn.place(vec![node_a, node_b]);

        // Random placement may exceed radio range; pin positions inside it.
        // set_position is last-write-wins, so this overrides the draw.
        wsn.view_nodes()[0].set_position(Vector3::new(10.0, 10.0, 0.0));
        wsn.view_nodes()[1].set_position(Vector3::new(60.0, 10.0, 0.0));

        for node in wsn.view_nodes() {
            node.init_protocols();
        }

        wsn.view_nodes()[0].send_packet(SendRequest {
            data: vec![0xab, 0xcd],
            destination: ShortAddress::BROADCAST,
            delay: SimTime::from_secs(2),
            ack: false,
        });

        scheduler.run_until(SimTime::from_secs(10));

        // Node B heard the raw broadcast payload.
        assert!(rx_payloads.borrow().contains(&vec![0xab, 0xcd]));
        // Node A saw a confirm for it no earlier than the send delay, with
        // the outcome a no-ack-requested transmission produces.
        let broadcast_confirms: Vec<_> = tx_times
            .borrow()
            .iter()
            .filter(|(at, _)| *at >= SimTime::from_secs(2))
            .cloned()
            .collect();
        assert!(!broadcast_confirms.is_empty());
        assert!(
            broadcast_confirms
                .iter()
                .any(|(_, outcome)| *outcome == TxOutcome::Acknowledged)
        );
    }
}
