// Copyright (c) 2025 - Cowboy AI, Inc.
//! Launch environment of an application node
//!
//! The product ships a `setenv.sh` that assigns shell variables. Our tuning
//! replaces those assignments in place; variables the script does not
//! assign yet are appended.

use crate::domain::NodeConfig;

/// Variables written into the launch environment file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchEnvironment {
    settings: Vec<(String, String)>,
}

impl LaunchEnvironment {
    /// Tuning for one node listening on `node_address`
    pub fn for_node(config: &NodeConfig, gc_log: &str, node_address: &str) -> Self {
        let mut args = config.jvm_args.extra.clone();
        args.push(format!("-Xloggc:{}", gc_log));
        args.extend(
            [
                "-XX:+PrintGCDetails",
                "-XX:+PrintGCDateStamps",
                "-XX:+UseGCLogFileRotation",
                "-XX:NumberOfGCLogFiles=5",
                "-XX:GCLogFileSize=20M",
            ]
            .iter()
            .map(|flag| flag.to_string()),
        );
        args.push(format!("-Djava.rmi.server.hostname={}", node_address));
        if let Some(port) = config.diagnostics.remote_jmx_port {
            args.push(format!("-Dcom.sun.management.jmxremote.port={}", port));
            args.push(format!("-Dcom.sun.management.jmxremote.rmi.port={}", port));
            args.push("-Dcom.sun.management.jmxremote.authenticate=false".to_string());
            args.push("-Dcom.sun.management.jmxremote.ssl=false".to_string());
        }

        Self {
            settings: vec![
                ("JVM_MINIMUM_MEMORY".to_string(), config.jvm_args.xms.clone()),
                ("JVM_MAXIMUM_MEMORY".to_string(), config.jvm_args.xmx.clone()),
                ("JVM_SUPPORT_RECOMMENDED_ARGS".to_string(), args.join(" ")),
                ("JIRA_NODE_NAME".to_string(), config.name.clone()),
            ],
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Apply the settings to the text of an existing launch script
    pub fn apply(&self, script: &str) -> String {
        let mut applied = vec![false; self.settings.len()];
        let mut lines: Vec<String> = script
            .lines()
            .map(|line| {
                let trimmed = line.trim_start();
                for (i, (key, value)) in self.settings.iter().enumerate() {
                    if trimmed.starts_with(&format!("{}=", key)) {
                        applied[i] = true;
                        return assignment(key, value);
                    }
                }
                line.to_string()
            })
            .collect();

        for (i, (key, value)) in self.settings.iter().enumerate() {
            if !applied[i] {
                lines.push(assignment(key, value));
            }
        }
        let mut rendered = lines.join("\n");
        rendered.push('\n');
        rendered
    }
}

fn assignment(key: &str, value: &str) -> String {
    format!("{}=\"{}\"", key, value.replace('"', "\\\""))
}
