//! Every registered command answers malformed input with exactly one
//! terminal error line, and concurrent clients never lose updates.

use std::sync::Arc;
use std::thread;

use rstest::{fixture, rstest};

use crate::dispatch::{ClientInfo, Dispatcher, ResponseWriter, default_registry};

use super::support::TestDaemon;

#[fixture]
fn daemon() -> TestDaemon {
    TestDaemon::new()
}

/// Sends `line` and returns the rendered wire lines.
fn exchange(dispatcher: &Dispatcher, line: &str) -> Vec<String> {
    let reply = dispatcher.dispatch(&ClientInfo::new("surface"), line);
    let mut output = Vec::new();
    ResponseWriter::new(&mut output)
        .write_reply(&reply)
        .expect("write reply");
    String::from_utf8(output)
        .expect("valid utf8")
        .lines()
        .map(str::to_owned)
        .collect()
}

/// Code of the single terminal line, failing if there is not exactly one.
fn terminal_code(line: &str, rendered: &[String]) -> u16 {
    let codes: Vec<u16> = rendered
        .iter()
        .map(|wire| {
            wire.split_once(' ')
                .and_then(|(code, _)| code.parse().ok())
                .unwrap_or_else(|| panic!("`{line}` produced malformed line {wire:?}"))
        })
        .collect();
    let terminals: Vec<u16> = codes.iter().copied().filter(|code| *code >= 200).collect();
    assert_eq!(terminals.len(), 1, "`{line}` replied {rendered:?}");
    assert_eq!(
        codes.last(),
        terminals.first(),
        "`{line}` put items after its terminal line"
    );
    terminals[0]
}

fn assert_rejected(dispatcher: &Dispatcher, line: &str) {
    let rendered = exchange(dispatcher, line);
    let code = terminal_code(line, &rendered);
    assert!(
        matches!(code, 500 | 501),
        "`{line}` should be rejected, got {rendered:?}"
    );
}

#[rstest]
fn bare_command_names_are_rejected(daemon: TestDaemon) {
    let dispatcher = daemon.dispatcher();
    let registry = default_registry().expect("registry");

    for name in registry.names() {
        let rendered = exchange(&dispatcher, name);
        let code = terminal_code(name, &rendered);
        if name != "list_ttys" {
            assert!(
                matches!(code, 500 | 501),
                "`{name}` should be rejected, got {rendered:?}"
            );
        }
    }
}

#[rstest]
fn unknown_sub_commands_are_rejected(daemon: TestDaemon) {
    let dispatcher = daemon.dispatcher();
    let registry = default_registry().expect("registry");

    for name in registry.names() {
        assert_rejected(&dispatcher, &format!("{name} bogus"));
    }
}

#[rstest]
#[case("interface getcfg")]
#[case("interface setcfg wlan0")]
#[case("interface setmtu wlan0")]
#[case("interface ipv6 wlan0")]
#[case("interface clearaddrs")]
#[case("interface getcfg ..")]
#[case("interface setcfg .. 10.0.0.1 24 up")]
#[case("interface clearaddrs .")]
#[case("tether interface")]
#[case("tether interface add")]
#[case("tether dns")]
#[case("tether dns set 100")]
#[case("ipv6tether enable wlan0")]
#[case("ipv6tether disable")]
#[case("ipfwd enable")]
#[case("ipfwd disable")]
#[case("ipv6fwd enable")]
#[case("ipv6fwd disable")]
#[case("nat enable wlan0")]
#[case("nat disable")]
#[case("pppd attach ttyS0")]
#[case("pppd detach")]
#[case("pppoectl start eth0 user")]
#[case("pppoectl stop")]
#[case("pppoectl status")]
#[case("softap fwreload wlan0")]
#[case("softap set wlan0")]
#[case("bandwidth setiquota rmnet0")]
#[case("bandwidth removeiquota")]
#[case("bandwidth getiquota")]
#[case("bandwidth setglobalalert")]
#[case("bandwidth addnaughtyapps")]
#[case("bandwidth removenaughtyapps")]
#[case("bandwidth addniceapps")]
#[case("bandwidth removeniceapps")]
#[case("idletimer add rmnet0 5")]
#[case("idletimer remove")]
#[case("resolver setnetdns 100")]
#[case("resolver clearnetdns")]
#[case("resolver getnetdns")]
#[case("resolver flushnet")]
#[case("firewall enable")]
#[case("firewall set_interface_rule wlan0")]
#[case("firewall set_egress_source_rule")]
#[case("firewall set_egress_dest_rule 1.2.3.4 80")]
#[case("firewall set_uid_rule dozable 1000")]
#[case("firewall enable_chain")]
#[case("firewall disable_chain")]
#[case("strict set_uid_cleartext_policy 1000")]
#[case("clatd start")]
#[case("clatd stop")]
#[case("clatd status")]
#[case("throttle set wlan0 1")]
#[case("throttle get wlan0")]
#[case("throttle reset")]
#[case("dualon enable wlan0")]
#[case("throughput testsim")]
fn short_argument_lists_are_rejected(daemon: TestDaemon, #[case] line: &str) {
    daemon.add_interface("wlan0");
    assert_rejected(&daemon.dispatcher(), line);
}

#[rstest]
fn concurrent_nat_commands_are_all_recorded(daemon: TestDaemon) {
    let dispatcher = daemon.dispatcher();

    let clients: Vec<_> = (0..8)
        .map(|client| {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || {
                for pair in 0..50 {
                    let line = format!("nat enable in{client} out{pair}");
                    assert_eq!(
                        exchange(&dispatcher, &line),
                        vec!["200 Nat operation succeeded".to_owned()],
                        "`{line}`"
                    );
                }
            })
        })
        .collect();
    for client in clients {
        client.join().expect("client panicked");
    }

    assert_eq!(dispatcher.controllers().nat.pairs().len(), 400);
}
