// In-memory stand-ins for the host and the VM, shared by unit tests

use async_trait::async_trait;
use ipnetwork::Ipv4Network;
use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::context::Context;
use crate::error::{RoutingError, RoutingResult};
use crate::exec::{CommandOutput, CommandRunner, command_line};
use crate::vm::VmControl;

/// Answers commands from a fixed script keyed by the full command line
#[derive(Default)]
pub struct ScriptedRunner {
    responses: Mutex<HashMap<String, CommandOutput>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, line: &str, output: CommandOutput) {
        self.responses.lock().unwrap().insert(line.to_string(), output);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, _ctx: &Context, program: &str, args: &[&str]) -> RoutingResult<CommandOutput> {
        let line = command_line(program, args);
        self.calls.lock().unwrap().push(line.clone());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(&line)
            .cloned()
            .unwrap_or_else(|| CommandOutput::failed(127, format!("{}: not scripted", line))))
    }
}

/// Simulates the macOS routing table behind `route add|delete|-n get`
pub struct FakeRouteTable {
    routes: Mutex<BTreeMap<String, (Ipv4Network, Ipv4Addr)>>,
    calls: Mutex<Vec<String>>,
    fail_add: AtomicBool,
    fail_delete: AtomicBool,
}

impl FakeRouteTable {
    pub fn new() -> Self {
        FakeRouteTable {
            routes: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_add: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    pub fn with_route(self, cidr: &str, gateway: &str) -> Self {
        let net: Ipv4Network = cidr.parse().unwrap();
        self.routes
            .lock()
            .unwrap()
            .insert(cidr.to_string(), (net, gateway.parse().unwrap()));
        self
    }

    pub fn failing_add(self) -> Self {
        self.fail_add.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_delete(self) -> Self {
        self.fail_delete.store(true, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Only the privileged invocations
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("sudo "))
            .collect()
    }

    pub fn gateway(&self, cidr: &str) -> Option<Ipv4Addr> {
        self.routes.lock().unwrap().get(cidr).map(|(_, gw)| *gw)
    }

    fn get(&self, cidr: &str) -> CommandOutput {
        match self.routes.lock().unwrap().get(cidr) {
            Some((net, gw)) => CommandOutput::ok(route_get_output(
                &net.network().to_string(),
                &net.mask().to_string(),
                &gw.to_string(),
                "bridge100",
            )),
            None => CommandOutput::ok(route_get_output("default", "default", "192.168.1.1", "en0")),
        }
    }

    fn add(&self, cidr: &str, gateway: &str) -> CommandOutput {
        let net: Ipv4Network = cidr.parse().unwrap();
        if self.fail_add.load(Ordering::SeqCst) {
            return CommandOutput::failed(
                1,
                format!(
                    "route: writing to routing socket: Operation not permitted\nadd net {}: gateway {}: Operation not permitted\n",
                    net.network(),
                    gateway
                ),
            );
        }
        let mut routes = self.routes.lock().unwrap();
        if routes.contains_key(cidr) {
            return CommandOutput::failed(
                1,
                format!("add net {}: gateway {}: File exists\n", net.network(), gateway),
            );
        }
        routes.insert(cidr.to_string(), (net, gateway.parse().unwrap()));
        CommandOutput::ok(format!("add net {}: gateway {}\n", net.network(), gateway))
    }

    fn delete(&self, cidr: &str) -> CommandOutput {
        let net: Ipv4Network = cidr.parse().unwrap();
        if self.fail_delete.load(Ordering::SeqCst) {
            return CommandOutput::failed(
                1,
                "route: writing to routing socket: Operation not permitted\n",
            );
        }
        match self.routes.lock().unwrap().remove(cidr) {
            Some(_) => CommandOutput::ok(format!("delete net {}\n", net.network())),
            None => CommandOutput::failed(
                1,
                format!(
                    "route: writing to routing socket: not in table\ndelete net {}: not in table\n",
                    net.network()
                ),
            ),
        }
    }
}

#[async_trait]
impl CommandRunner for FakeRouteTable {
    async fn run(&self, ctx: &Context, program: &str, args: &[&str]) -> RoutingResult<CommandOutput> {
        let line = command_line(program, args);
        self.calls.lock().unwrap().push(line.clone());
        if ctx.is_cancelled() {
            return Err(RoutingError::Cancelled(line));
        }
        let out = match (program, args) {
            ("route", ["-n", "get", cidr]) => self.get(cidr),
            ("sudo", ["route", "add", cidr, gateway]) => self.add(cidr, gateway),
            ("sudo", ["route", "delete", cidr]) => self.delete(cidr),
            _ => CommandOutput::failed(64, format!("usage: {}", line)),
        };
        Ok(out)
    }
}

/// Output of `route -n get` in the shape macOS prints it
pub fn route_get_output(destination: &str, mask: &str, gateway: &str, interface: &str) -> String {
    format!(
        "   route to: {destination}\n\
         destination: {destination}\n\
         \x20      mask: {mask}\n\
         \x20   gateway: {gateway}\n\
         \x20 interface: {interface}\n\
         \x20     flags: <UP,GATEWAY,DONE,STATIC,PRCLONING>\n\
         \x20recvpipe  sendpipe  ssthresh  rtt,msec    rttvar  hopcount      mtu     expire\n\
         \x20      0         0         0         0         0         0      1500         0\n"
    )
}

/// A VM with a fixed status, address and guest command outputs
pub struct FakeVm {
    running: bool,
    ip: String,
    outputs: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl FakeVm {
    pub fn running(ip: &str) -> Self {
        FakeVm {
            running: true,
            ip: ip.to_string(),
            outputs: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn stopped() -> Self {
        FakeVm {
            running: false,
            ..FakeVm::running("")
        }
    }

    pub fn with_running(mut self, running: bool) -> Self {
        self.running = running;
        self
    }

    pub fn with_output(mut self, line: &str, output: &str) -> Self {
        self.outputs.insert(line.to_string(), output.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VmControl for FakeVm {
    async fn running(&self, _ctx: &Context) -> bool {
        self.calls.lock().unwrap().push("running".to_string());
        self.running
    }

    async fn run_output(&self, _ctx: &Context, command: &str, args: &[&str]) -> RoutingResult<String> {
        let line = command_line(command, args);
        self.calls.lock().unwrap().push(line.clone());
        if !self.running {
            return Err(RoutingError::GuestCommandFailed {
                command: line,
                output: "instance is not running".to_string(),
            });
        }
        self.outputs
            .get(&line)
            .cloned()
            .ok_or(RoutingError::GuestCommandFailed {
                command: line,
                output: "Error from server (NotFound)".to_string(),
            })
    }

    async fn ip_address(&self, _ctx: &Context, profile: &str) -> String {
        self.calls.lock().unwrap().push(format!("ip_address {}", profile));
        self.ip.clone()
    }
}
