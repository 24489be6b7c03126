// src/config/validate.rs

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use crate::config::model::{
    expand_tilde, Config, DefaultsSection, NodeDescriptor, RawConfigFile, RawNode,
};
use crate::errors::{Result, ScatterError};

/// Prefix marking an explicit command group reference in a node's
/// `commands` list.
pub const GROUP_REF_PREFIX: char = '@';

impl TryFrom<RawConfigFile> for Config {
    type Error = ScatterError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_nodes(&raw)?;
        validate_defaults(&raw.defaults)?;

        let mut seen = HashSet::new();
        let mut nodes = Vec::with_capacity(raw.nodes.len());
        for (idx, node_raw) in raw.nodes.iter().enumerate() {
            let node = resolve_node(idx, node_raw, &raw.defaults, &raw.command_groups)?;
            if !seen.insert(node.name.clone()) {
                return Err(ScatterError::ConfigError(format!(
                    "duplicate node name '{}'",
                    node.name
                )));
            }
            nodes.push(node);
        }

        Ok(Config {
            nodes,
            log_dir: expand_tilde(&raw.log_dir),
            source_path: None,
        })
    }
}

fn ensure_has_nodes(cfg: &RawConfigFile) -> Result<()> {
    if cfg.nodes.is_empty() {
        return Err(ScatterError::ConfigError(
            "no nodes defined in configuration".to_string(),
        ));
    }
    Ok(())
}

fn validate_defaults(defaults: &DefaultsSection) -> Result<()> {
    if defaults.port == 0 {
        return Err(ScatterError::ConfigError(
            "[defaults].port must be between 1 and 65535 (got 0)".to_string(),
        ));
    }
    if defaults.timeout == 0 {
        return Err(ScatterError::ConfigError(
            "[defaults].timeout must be >= 1 second (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn resolve_node(
    idx: usize,
    raw: &RawNode,
    defaults: &DefaultsSection,
    groups: &BTreeMap<String, Vec<String>>,
) -> Result<NodeDescriptor> {
    let name = match raw.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            return Err(ScatterError::ConfigError(format!(
                "node #{} must have a 'name' field",
                idx + 1
            )));
        }
    };

    // Node names become log file names.
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(ScatterError::ConfigError(format!(
            "node name '{name}' must not contain path separators"
        )));
    }

    let host = match raw.host.as_deref().map(str::trim) {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => {
            return Err(ScatterError::ConfigError(format!(
                "node '{name}' must have a 'host' field"
            )));
        }
    };

    let port = raw.port.unwrap_or(defaults.port);
    if port == 0 {
        return Err(ScatterError::ConfigError(format!(
            "node '{name}' has invalid port 0"
        )));
    }

    let timeout = raw.timeout.unwrap_or(defaults.timeout);
    if timeout == 0 {
        return Err(ScatterError::ConfigError(format!(
            "node '{name}' must have a timeout >= 1 second"
        )));
    }

    let commands = resolve_commands(&name, &raw.commands, groups)?;
    if commands.is_empty() {
        return Err(ScatterError::ConfigError(format!(
            "node '{name}' must have at least one command"
        )));
    }

    let ssh_key = raw.ssh_key.as_deref().unwrap_or(&defaults.ssh_key);

    Ok(NodeDescriptor {
        name,
        host,
        port,
        user: raw.user.clone().unwrap_or_else(|| defaults.user.clone()),
        commands,
        stop_on_error: raw.stop_on_error.unwrap_or(defaults.stop_on_error),
        no_logs: raw.no_logs.unwrap_or(defaults.no_logs),
        work_dir: raw.work_dir.clone().or_else(|| defaults.work_dir.clone()),
        ssh_key: expand_tilde(ssh_key),
        timeout: Duration::from_secs(timeout),
    })
}

/// Expand group references into their commands, keeping order.
///
/// - `"@name"` must name an existing group.
/// - A bare entry equal to a group name also expands to that group.
/// - Anything else is a literal command.
pub fn resolve_commands(
    node: &str,
    entries: &[String],
    groups: &BTreeMap<String, Vec<String>>,
) -> Result<Vec<String>> {
    let mut commands = Vec::new();

    for entry in entries {
        if let Some(group) = entry.strip_prefix(GROUP_REF_PREFIX) {
            let cmds = groups.get(group).ok_or_else(|| {
                ScatterError::ConfigError(format!(
                    "node '{node}' references unknown command group '{group}'"
                ))
            })?;
            commands.extend(cmds.iter().cloned());
        } else if let Some(cmds) = groups.get(entry) {
            commands.extend(cmds.iter().cloned());
        } else {
            commands.push(entry.clone());
        }
    }

    Ok(commands)
}
