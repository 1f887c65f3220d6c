use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::http::{AuthClient, AuthTokens};
use crate::errors::CliError;

/// Credentials saved at login for silent reauthentication, stored in a
/// netrc-style file: `machine <name>` / `login <user>` / `password <pw>`
/// triples keyed by the context's machine name.
pub struct NetrcHandler {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetrcMachine {
    pub name: String,
    pub login: String,
    pub password: String,
}

impl NetrcHandler {
    pub fn default_path() -> Result<PathBuf, CliError> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| CliError::HomeNotSet)?;
        Ok(Path::new(&home).join(".braid").join("netrc"))
    }

    fn read_machines(&self) -> Result<Vec<NetrcMachine>, CliError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(CliError::UnableToReadConfig {
                    path: self.path.clone(),
                    source: err,
                })
            }
        };
        let tokens: Vec<&str> = contents.split_whitespace().collect();
        let mut machines = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            if tokens[i] != "machine" || i + 1 >= tokens.len() {
                i += 1;
                continue;
            }
            let mut machine = NetrcMachine {
                name: tokens[i + 1].to_string(),
                login: String::new(),
                password: String::new(),
            };
            i += 2;
            while i + 1 < tokens.len() {
                match tokens[i] {
                    "login" => machine.login = tokens[i + 1].to_string(),
                    "password" => machine.password = tokens[i + 1].to_string(),
                    _ => break,
                }
                i += 2;
            }
            machines.push(machine);
        }
        Ok(machines)
    }

    fn write_machines(&self, machines: &[NetrcMachine]) -> Result<(), CliError> {
        let write_err = |err| CliError::UnableToWriteConfig {
            path: self.path.clone(),
            source: err,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let mut contents = String::new();
        for machine in machines {
            contents.push_str(&format!(
                "machine {}\n  login {}\n  password {}\n",
                machine.name, machine.login, machine.password
            ));
        }
        fs::write(&self.path, contents).map_err(write_err)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600));
        }
        Ok(())
    }

    pub fn get_machine(&self, name: &str) -> Result<Option<NetrcMachine>, CliError> {
        Ok(self
            .read_machines()?
            .into_iter()
            .find(|machine| machine.name == name))
    }

    pub fn save_machine(&self, machine: NetrcMachine) -> Result<(), CliError> {
        let mut machines = self.read_machines()?;
        machines.retain(|existing| existing.name != machine.name);
        machines.push(machine);
        self.write_machines(&machines)
    }

    pub fn delete_machine(&self, name: &str) -> Result<(), CliError> {
        let mut machines = self.read_machines()?;
        machines.retain(|existing| existing.name != name);
        self.write_machines(&machines)
    }
}

/// Silent-reauthentication seam used by the pre-run pipeline when a stored
/// token is expired or unusable.
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    async fn refresh(&self, machine_name: &str, server: &str) -> Result<AuthTokens, CliError>;
}

pub struct NetrcRefresher<'a> {
    pub netrc: NetrcHandler,
    pub auth_client: &'a dyn AuthClient,
}

#[async_trait]
impl CredentialRefresher for NetrcRefresher<'_> {
    async fn refresh(&self, machine_name: &str, server: &str) -> Result<AuthTokens, CliError> {
        let machine = self
            .netrc
            .get_machine(machine_name)?
            .ok_or_else(|| CliError::Auth {
                message: format!("no saved credentials for \"{machine_name}\""),
            })?;
        debug!(machine = %machine_name, "attempting silent reauthentication");
        self.auth_client
            .login(server, &machine.login, &machine.password)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn machine_roundtrip() {
        let dir = TempDir::new().expect("tempdir");
        let handler = NetrcHandler {
            path: dir.path().join("netrc"),
        };
        assert_eq!(handler.get_machine("dev").expect("get"), None);
        handler
            .save_machine(NetrcMachine {
                name: "dev".to_string(),
                login: "user@example.com".to_string(),
                password: "hunter2".to_string(),
            })
            .expect("save");
        handler
            .save_machine(NetrcMachine {
                name: "prod".to_string(),
                login: "ops@example.com".to_string(),
                password: "hunter3".to_string(),
            })
            .expect("save");
        let machine = handler.get_machine("dev").expect("get").expect("machine");
        assert_eq!(machine.login, "user@example.com");
        assert_eq!(machine.password, "hunter2");

        handler
            .save_machine(NetrcMachine {
                name: "dev".to_string(),
                login: "user@example.com".to_string(),
                password: "rotated".to_string(),
            })
            .expect("overwrite");
        let machine = handler.get_machine("dev").expect("get").expect("machine");
        assert_eq!(machine.password, "rotated");

        handler.delete_machine("dev").expect("delete");
        assert_eq!(handler.get_machine("dev").expect("get"), None);
        assert!(handler.get_machine("prod").expect("get").is_some());
    }
}
