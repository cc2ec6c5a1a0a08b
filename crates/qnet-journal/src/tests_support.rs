//! Shared fixture: a small simulated order log

use indexmap::IndexMap;
use qnet_core::{BindingFunction, CollectionCounter, ItemCounter, ObjectStore, ObjectType, QuantityNet};
use qnet_sim::{DurationSpec, EventLog, Simulation, SimulationConfig};

/// Three orders placed and shipped; every shipment takes one `A` from the warehouse
pub(crate) fn simulated_log() -> EventLog {
    let mut net =
        QuantityNet::from_arcs(&[("p1", "t1"), ("t1", "p2"), ("p2", "t2"), ("t2", "p3"), ("c1", "t2")]).unwrap();
    let types: IndexMap<String, ObjectType> = ["p1", "p2", "p3"]
        .into_iter()
        .map(|p| (p.to_string(), ObjectType::new("order")))
        .collect();
    net.set_place_types(&types).unwrap();
    let labels: IndexMap<String, String> = [("t1", "place order"), ("t2", "ship order")]
        .into_iter()
        .map(|(t, l)| (t.to_string(), l.to_string()))
        .collect();
    net.set_transition_labels(&labels).unwrap();
    let cp_labels: IndexMap<String, String> = [("c1".to_string(), "warehouse".to_string())].into_iter().collect();
    net.set_collection_point_labels(&cp_labels).unwrap();
    net.set_qalculator(
        "t2",
        Box::new(|_: &CollectionCounter, _: &BindingFunction, _: &ObjectStore| -> CollectionCounter {
            [("c1", ItemCounter::from([("A", -1)]))].into_iter().collect()
        }),
    )
    .unwrap();

    let config = SimulationConfig::new().with_default_duration(DurationSpec::Fixed { minutes: 30.0 });
    let mut sim = Simulation::new(net, config).unwrap();
    sim.set_initial_stock(&[("c1", ItemCounter::from([("A", 10)]))].into_iter().collect())
        .unwrap();
    sim.add_initial_objects(&"order".into(), 3).unwrap();
    sim.run().unwrap();
    sim.log().clone()
}
