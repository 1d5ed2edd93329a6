// Copyright (c) 2025 - Cowboy AI, Inc.
//! Declarative Remote Actions
//!
//! Every command the orchestrator runs on a machine is a [`RemoteAction`]
//! value: an action kind plus structured parameters. The remote-execution
//! collaborator turns it into a program and an argument vector, so no
//! parameter is ever interpolated into a shell string.
//!
//! ```text
//! RemoteAction::Download { url, destination }
//!        │
//!        └── program: "wget"   argv: ["-q", url, "-O", destination]
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::provider::StorageLocation;

/// NFS export options of the shared home
pub const NFS_EXPORT_OPTIONS: &str = "rw,sync,no_subtree_check,no_root_squash";

/// One command to run on a remote machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteAction {
    /// Install OS packages
    InstallPackages { packages: Vec<String> },

    /// Fetch a URL into a file
    Download { url: String, destination: String },

    /// List the entries of an archive
    ListArchive { archive: String },

    /// Unpack a gzipped archive into a directory
    Extract { archive: String, destination: String },

    /// Create a directory and its parents
    MakeDirectory { path: String },

    /// Copy a file or directory tree
    Copy { source: String, destination: String },

    /// Move a file or directory
    Move { source: String, destination: String },

    /// Move every entry of `source` into `destination`; an empty source is fine
    MoveContents { source: String, destination: String },

    /// Print a file
    ReadFile { path: String },

    /// Replace a file with `contents`, supplied on standard input
    WriteFile { path: String, contents: String },

    /// Print the canonical absolute path
    ResolvePath { path: String },

    /// Mirror a storage location into a local directory
    SyncFromStorage {
        location: StorageLocation,
        destination: String,
    },

    /// Mirror a local directory into a storage location
    SyncToStorage {
        source: String,
        location: StorageLocation,
    },

    /// Restart a system service
    RestartService { service: String },

    /// Run a script with extra environment variables
    RunScript {
        script: String,
        args: Vec<String>,
        environment: Vec<(String, String)>,
    },

    /// Succeed only if the URL answers with a 2xx status
    HttpProbe { url: String },

    /// Mount an NFS export
    MountNfs {
        server: String,
        export: String,
        mount_point: String,
    },

    /// Export a directory over NFS to every client
    ExportNfs { path: String },

    /// Run the wrapped action as root
    Privileged(Box<RemoteAction>),
}

impl RemoteAction {
    /// Wrap this action to run as root
    pub fn privileged(self) -> Self {
        RemoteAction::Privileged(Box::new(self))
    }

    /// Executable to invoke
    pub fn program(&self) -> &str {
        match self {
            RemoteAction::InstallPackages { .. }
            | RemoteAction::RestartService { .. }
            | RemoteAction::MountNfs { .. }
            | RemoteAction::ExportNfs { .. }
            | RemoteAction::Privileged(_) => "sudo",
            RemoteAction::Download { .. } => "wget",
            RemoteAction::ListArchive { .. } | RemoteAction::Extract { .. } => "tar",
            RemoteAction::MakeDirectory { .. } => "mkdir",
            RemoteAction::Copy { .. } => "cp",
            RemoteAction::Move { .. } => "mv",
            RemoteAction::MoveContents { .. } => "find",
            RemoteAction::ReadFile { .. } => "cat",
            RemoteAction::WriteFile { .. } => "tee",
            RemoteAction::ResolvePath { .. } => "realpath",
            RemoteAction::SyncFromStorage { .. } | RemoteAction::SyncToStorage { .. } => "aws",
            RemoteAction::RunScript {
                script,
                environment,
                ..
            } => {
                if environment.is_empty() {
                    script.as_str()
                } else {
                    "env"
                }
            }
            RemoteAction::HttpProbe { .. } => "curl",
        }
    }

    /// Arguments passed to [`RemoteAction::program`]
    pub fn argv(&self) -> Vec<String> {
        match self {
            RemoteAction::InstallPackages { packages } => {
                let mut argv = strings(&["apt-get", "install", "-qq", "-y"]);
                argv.extend(packages.iter().cloned());
                argv
            }
            RemoteAction::Download { url, destination } => {
                vec!["-q".into(), url.clone(), "-O".into(), destination.clone()]
            }
            RemoteAction::ListArchive { archive } => vec!["-tf".into(), archive.clone()],
            RemoteAction::Extract {
                archive,
                destination,
            } => vec![
                "-xzf".into(),
                archive.clone(),
                "-C".into(),
                destination.clone(),
            ],
            RemoteAction::MakeDirectory { path } => vec!["-p".into(), path.clone()],
            RemoteAction::Copy {
                source,
                destination,
            } => vec!["-r".into(), source.clone(), destination.clone()],
            RemoteAction::Move {
                source,
                destination,
            } => vec![source.clone(), destination.clone()],
            RemoteAction::MoveContents {
                source,
                destination,
            } => {
                let mut argv = vec![source.clone()];
                argv.extend(strings(&["-mindepth", "1", "-maxdepth", "1", "-exec", "mv", "-t"]));
                argv.push(destination.clone());
                argv.extend(strings(&["{}", "+"]));
                argv
            }
            RemoteAction::ReadFile { path } | RemoteAction::ResolvePath { path } => {
                vec![path.clone()]
            }
            RemoteAction::WriteFile { path, .. } => vec![path.clone()],
            RemoteAction::SyncFromStorage {
                location,
                destination,
            } => sync_argv(location, location.uri.clone(), destination.clone()),
            RemoteAction::SyncToStorage { source, location } => {
                sync_argv(location, source.clone(), location.uri.clone())
            }
            RemoteAction::RestartService { service } => {
                vec!["systemctl".into(), "restart".into(), service.clone()]
            }
            RemoteAction::RunScript {
                script,
                args,
                environment,
            } => {
                if environment.is_empty() {
                    args.clone()
                } else {
                    let mut argv: Vec<String> = environment
                        .iter()
                        .map(|(key, value)| format!("{}={}", key, value))
                        .collect();
                    argv.push(script.clone());
                    argv.extend(args.iter().cloned());
                    argv
                }
            }
            RemoteAction::HttpProbe { url } => vec![
                "--silent".into(),
                "--fail".into(),
                "--output".into(),
                "/dev/null".into(),
                url.clone(),
            ],
            RemoteAction::MountNfs {
                server,
                export,
                mount_point,
            } => vec![
                "mount".into(),
                "-t".into(),
                "nfs".into(),
                format!("{}:{}", server, export),
                mount_point.clone(),
            ],
            RemoteAction::ExportNfs { path } => vec![
                "exportfs".into(),
                "-o".into(),
                NFS_EXPORT_OPTIONS.into(),
                format!("*:{}", path),
            ],
            RemoteAction::Privileged(inner) => {
                let mut argv = vec![inner.program().to_string()];
                argv.extend(inner.argv());
                argv
            }
        }
    }

    /// Data fed to standard input, if any
    pub fn stdin(&self) -> Option<&str> {
        match self {
            RemoteAction::WriteFile { contents, .. } => Some(contents),
            RemoteAction::Privileged(inner) => inner.stdin(),
            _ => None,
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn sync_argv(location: &StorageLocation, from: String, to: String) -> Vec<String> {
    vec![
        "s3".into(),
        "sync".into(),
        "--only-show-errors".into(),
        format!("--region={}", location.region),
        from,
        to,
    ]
}

impl fmt::Display for RemoteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program())?;
        for arg in self.argv() {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}
