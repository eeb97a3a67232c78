mod common;

use linkme::distributed_slice;
use parcelhub_core::{CARRIER_PLUGINS, PluginDescriptor, PluginRegistry, Uid};
use pretty_assertions::assert_eq;

use common::{Alpha, Beta};

#[distributed_slice(CARRIER_PLUGINS)]
static ALPHA: PluginDescriptor = PluginDescriptor::of::<Alpha>();

#[distributed_slice(CARRIER_PLUGINS)]
static BETA: PluginDescriptor = PluginDescriptor::of::<Beta>();

#[test]
fn discover_finds_carriers_registered_at_link_time() {
    let registry = PluginRegistry::discover().expect("no duplicate uids");

    assert_eq!(
        registry.uids().into_iter().collect::<Vec<_>>(),
        vec![Uid::from("alpha"), Uid::from("beta")]
    );
}

#[test]
fn discover_is_repeatable() {
    let first = PluginRegistry::discover().expect("first discovery");
    let second = PluginRegistry::discover().expect("second discovery");

    assert_eq!(first.uids(), second.uids());
}
