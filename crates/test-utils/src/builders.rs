#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use scatter::config::NodeDescriptor;

/// Builder for `NodeDescriptor` to simplify test setup.
///
/// Defaults: host `<name>.test`, `root@…:22`, stop-on-error on, logging on,
/// 5 second connect timeout, no commands.
pub struct NodeBuilder {
    node: NodeDescriptor,
}

impl NodeBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            node: NodeDescriptor {
                name: name.to_string(),
                host: format!("{name}.test"),
                port: 22,
                user: "root".to_string(),
                commands: vec![],
                stop_on_error: true,
                no_logs: false,
                work_dir: None,
                ssh_key: PathBuf::from("/dev/null"),
                timeout: Duration::from_secs(5),
            },
        }
    }

    pub fn host(mut self, host: &str) -> Self {
        self.node.host = host.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.node.port = port;
        self
    }

    pub fn user(mut self, user: &str) -> Self {
        self.node.user = user.to_string();
        self
    }

    pub fn command(mut self, cmd: &str) -> Self {
        self.node.commands.push(cmd.to_string());
        self
    }

    pub fn commands(mut self, cmds: &[&str]) -> Self {
        self.node.commands.extend(cmds.iter().map(|c| c.to_string()));
        self
    }

    pub fn stop_on_error(mut self, val: bool) -> Self {
        self.node.stop_on_error = val;
        self
    }

    pub fn no_logs(mut self, val: bool) -> Self {
        self.node.no_logs = val;
        self
    }

    pub fn work_dir(mut self, dir: &str) -> Self {
        self.node.work_dir = Some(dir.to_string());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.node.timeout = timeout;
        self
    }

    pub fn build(self) -> NodeDescriptor {
        self.node
    }
}
