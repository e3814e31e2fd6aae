//! Session configuration, loaded from `wave.toml` and `WAVE_` environment variables.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_primitives::{Address, address};
use figment::{
    Error, Figment, Metadata, Profile, Provider,
    providers::{Data, Env, Format, Serialized, Toml},
    value::{Dict, Map},
};
use serde::{Deserialize, Serialize};

/// Configuration for a wave session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WavePortalConfig {
    /// Address of the deployed WavePortal contract.
    pub contract_address: Address,
    /// JSON-RPC endpoint used by the rpc-backed wallet and contract.
    pub rpc_url: String,
    /// Gas ceiling attached to every `wave(message)` call.
    pub gas_limit: u64,
    /// How long to wait for a submitted wave to be mined, in seconds.
    pub confirmation_timeout: u64,
    /// How long to wait for a contract read or a silent account check, in seconds.
    pub request_timeout: u64,
    /// How long to wait for the user to answer a wallet connection prompt, in seconds.
    pub prompt_timeout: u64,
    /// Number of blocks required before a receipt counts as final.
    pub confirmations: u64,
    /// Polling interval for event filters and receipts, in milliseconds.
    pub poll_interval: u64,
    /// Maximum length of a wave message, in characters.
    pub max_message_len: usize,
}

impl WavePortalConfig {
    /// The default config profile.
    pub const DEFAULT_PROFILE: Profile = Profile::const_new("default");

    /// File name of the project config.
    pub const FILE_NAME: &'static str = "wave.toml";

    /// Environment variable prefix.
    pub const ENV_PREFIX: &'static str = "WAVE_";

    /// The WavePortal deployment this client was written against.
    pub const DEFAULT_CONTRACT_ADDRESS: Address =
        address!("0x35A644F750B0B48712ea850ed323D3Ab494eaFbf");

    pub const DEFAULT_GAS_LIMIT: u64 = 300_000;

    /// Loads the config from the current directory.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_with_root(".")
    }

    /// Loads the config from `root/wave.toml`, with environment overrides.
    pub fn load_with_root(root: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Self::figment_with_root(root).extract()
    }

    /// Returns the layered figment: defaults, then `wave.toml`, then `WAVE_*` variables.
    ///
    /// The toml file is profile-nested (`[profile.default]`); `WAVE_PROFILE` selects the profile.
    pub fn figment_with_root(root: impl AsRef<Path>) -> Figment {
        let path: PathBuf = root.as_ref().join(Self::FILE_NAME);
        Figment::from(Serialized::defaults(Self::default()))
            .merge(ProfileSections(Toml::file(path)))
            .merge(Env::prefixed(Self::ENV_PREFIX).ignore(&["PROFILE"]).global())
            .select(Profile::from_env_or("WAVE_PROFILE", Self::DEFAULT_PROFILE))
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_secs(self.prompt_timeout)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval)
    }
}

/// Turns the `[profile.<name>]` tables of a toml file into figment profiles.
struct ProfileSections(Data<Toml>);

impl ProfileSections {
    const SECTION: &'static str = "profile";
}

impl Provider for ProfileSections {
    fn metadata(&self) -> Metadata {
        self.0.metadata()
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut profiles = Map::new();
        for (_, mut dict) in self.0.data()? {
            let Some(section) = dict.remove(Self::SECTION) else { continue };
            let section = section
                .into_dict()
                .ok_or_else(|| Error::from(format!("`{}` must be a table", Self::SECTION)))?;
            for (name, table) in section {
                let table = table.into_dict().ok_or_else(|| {
                    Error::from(format!("`{}.{name}` must be a table", Self::SECTION))
                })?;
                profiles.insert(Profile::new(&name), table);
            }
        }
        Ok(profiles)
    }
}

impl Default for WavePortalConfig {
    fn default() -> Self {
        Self {
            contract_address: Self::DEFAULT_CONTRACT_ADDRESS,
            rpc_url: "http://localhost:8545".to_string(),
            gas_limit: Self::DEFAULT_GAS_LIMIT,
            confirmation_timeout: 120,
            request_timeout: 30,
            prompt_timeout: 300,
            confirmations: 1,
            poll_interval: 1000,
            max_message_len: 280,
        }
    }
}
