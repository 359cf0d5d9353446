use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::config::SignerConfig;

/// Logical roles a tool can act as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Lender,
    Borrower,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Owner, Role::Lender, Role::Borrower];

    /// Environment variable that supplies this role's signing key.
    pub fn key_env(&self) -> &'static str {
        match self {
            Role::Owner => "PRIVATE_KEY",
            Role::Lender => "LENDER_PRIVATE_KEY",
            Role::Borrower => "BORROWER_PRIVATE_KEY",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Owner => "Owner",
            Role::Lender => "Lender",
            Role::Borrower => "Borrower",
        };
        f.write_str(name)
    }
}

/// Who signs for a role.
#[derive(Clone)]
pub enum Signer {
    /// Key held by this process; transactions are signed and broadcast here.
    Local(PrivateKeySigner),
    /// External wallet; the dispatcher only prepares unsigned requests.
    Delegated(Address),
}

impl Signer {
    pub fn address(&self) -> Address {
        match self {
            Signer::Local(key) => key.address(),
            Signer::Delegated(address) => *address,
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Signer::Local(_) => "local",
            Signer::Delegated(_) => "delegated",
        }
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signer::Local(key) => f.debug_tuple("Local").field(&key.address()).finish(),
            Signer::Delegated(address) => f.debug_tuple("Delegated").field(address).finish(),
        }
    }
}

/// Addresses assigned to roles from the browser wallet at session start.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleAddresses {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub lender: Option<String>,
    #[serde(default)]
    pub borrower: Option<String>,
}

impl RoleAddresses {
    fn get(&self, role: Role) -> Option<&str> {
        match role {
            Role::Owner => self.owner.as_deref(),
            Role::Lender => self.lender.as_deref(),
            Role::Borrower => self.borrower.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleSummary {
    pub role: Role,
    pub mode: &'static str,
    pub address: Address,
}

/// Role-to-signer mapping, resolved once when a session starts.
#[derive(Debug, Clone, Default)]
pub struct RoleSigners {
    signers: HashMap<Role, Signer>,
}

impl RoleSigners {
    /// A usable key wins over an address. The Owner role falls back to the
    /// default signing key; Lender and Borrower only use their own keys.
    /// Session-assigned addresses take precedence over configured ones.
    pub fn resolve(config: &SignerConfig, assigned: &RoleAddresses) -> Self {
        let mut signers = HashMap::new();

        for role in Role::ALL {
            let key = match role {
                Role::Owner => config.owner_private_key.as_deref().or(config.private_key.as_deref()),
                Role::Lender => config.lender_private_key.as_deref(),
                Role::Borrower => config.borrower_private_key.as_deref(),
            };

            if let Some(signer) = key.and_then(|raw| parse_key(role, raw)) {
                info!("  {} signs locally as {}", role, signer.address());
                signers.insert(role, Signer::Local(signer));
                continue;
            }

            let configured = match role {
                Role::Owner => config.owner_address.as_deref(),
                Role::Lender => config.lender_address.as_deref(),
                Role::Borrower => config.borrower_address.as_deref(),
            };
            let address = assigned
                .get(role)
                .or(configured)
                .and_then(|raw| match Address::from_str(raw.trim()) {
                    Ok(address) => Some(address),
                    Err(e) => {
                        warn!("Ignoring invalid {} address '{}': {}", role, raw, e);
                        None
                    }
                });

            if let Some(address) = address {
                info!("  {} delegates signing to wallet {}", role, address);
                signers.insert(role, Signer::Delegated(address));
            }
        }

        Self { signers }
    }

    pub fn get(&self, role: Role) -> Option<&Signer> {
        self.signers.get(&role)
    }

    pub fn summary(&self) -> Vec<RoleSummary> {
        Role::ALL
            .iter()
            .filter_map(|role| {
                self.signers.get(role).map(|signer| RoleSummary {
                    role: *role,
                    mode: signer.mode(),
                    address: signer.address(),
                })
            })
            .collect()
    }
}

fn parse_key(role: Role, raw: &str) -> Option<PrivateKeySigner> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match PrivateKeySigner::from_str(raw) {
        Ok(signer) => Some(signer),
        Err(e) => {
            warn!("Ignoring unparsable {} signing key: {}", role, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const LENDER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    #[test]
    fn test_owner_falls_back_to_default_key() {
        let config = SignerConfig {
            private_key: Some(OWNER_KEY.to_string()),
            ..Default::default()
        };
        let signers = RoleSigners::resolve(&config, &RoleAddresses::default());

        let owner = signers.get(Role::Owner).expect("owner resolved");
        assert!(matches!(owner, Signer::Local(_)));
        assert_eq!(
            owner.address(),
            Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap()
        );
        // Lender and borrower never borrow the default key.
        assert!(signers.get(Role::Lender).is_none());
        assert!(signers.get(Role::Borrower).is_none());
    }

    #[test]
    fn test_key_beats_assigned_address() {
        let config = SignerConfig {
            lender_private_key: Some(LENDER_KEY.to_string()),
            ..Default::default()
        };
        let assigned = RoleAddresses {
            lender: Some("0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC".to_string()),
            borrower: Some("0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC".to_string()),
            ..Default::default()
        };
        let signers = RoleSigners::resolve(&config, &assigned);

        assert_eq!(signers.get(Role::Lender).unwrap().mode(), "local");
        assert_eq!(signers.get(Role::Borrower).unwrap().mode(), "delegated");
        assert_eq!(signers.summary().len(), 2);
    }

    #[test]
    fn test_invalid_key_and_address_leave_role_unavailable() {
        let config = SignerConfig {
            borrower_private_key: Some("not-a-key".to_string()),
            borrower_address: Some("0x1234".to_string()),
            ..Default::default()
        };
        let signers = RoleSigners::resolve(&config, &RoleAddresses::default());
        assert!(signers.get(Role::Borrower).is_none());
    }

    #[test]
    fn test_debug_does_not_print_key_material() {
        let signer = Signer::Local(PrivateKeySigner::from_str(OWNER_KEY).unwrap());
        let rendered = format!("{:?}", signer);
        assert!(rendered.starts_with("Local("));
        assert!(!rendered.contains("ac0974bec39a17e3"));
    }
}
