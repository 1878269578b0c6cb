//! Client identities presented to the remote service.

use std::fmt;
use std::str::FromStr;

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Which official client the requests impersonate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ClientKind {
    Web,
    MobileWeb,
    #[default]
    AndroidApp,
    Smartbox,
}

/// Base URL, client id and user-agent pool of one client kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientInfo {
    pub client_url: &'static str,
    pub client_id: &'static str,
    pub user_agents: &'static [&'static str],
}

const WEB: ClientInfo = ClientInfo {
    client_url: "https://www.twitch.tv",
    client_id: "kimne78kx3ncx6brgo4mv6wki5h1ko",
    user_agents: &[
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    ],
};

const MOBILE_WEB: ClientInfo = ClientInfo {
    client_url: "https://m.twitch.tv",
    client_id: "r8s4dac0uhzifbpu9sjdiwzctle17ff",
    user_agents: &[
        "Mozilla/5.0 (Linux; Android 13) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/119.0.6045.66 Mobile Safari/537.36",
        "Mozilla/5.0 (Linux; Android 13; SM-A205U) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/119.0.6045.66 Mobile Safari/537.36",
        "Mozilla/5.0 (Linux; Android 13; SM-A102U) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/119.0.6045.66 Mobile Safari/537.36",
        "Mozilla/5.0 (Linux; Android 13; SM-G960U) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/119.0.6045.66 Mobile Safari/537.36",
        "Mozilla/5.0 (Linux; Android 13; SM-N960U) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/119.0.6045.66 Mobile Safari/537.36",
        "Mozilla/5.0 (Linux; Android 13; LM-Q720) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/119.0.6045.66 Mobile Safari/537.36",
        "Mozilla/5.0 (Linux; Android 13; LM-X420) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/119.0.6045.66 Mobile Safari/537.36",
    ],
};

const ANDROID_APP: ClientInfo = ClientInfo {
    client_url: "https://www.twitch.tv",
    client_id: "kd1unb4b3q4t58fwlpcbzcbnm76a8fp",
    user_agents: &[
        "Dalvik/2.1.0 (Linux; U; Android 7.1.2; SM-G977N Build/LMY48Z) \
         tv.twitch.android.app/16.8.1/1608010",
    ],
};

const SMARTBOX: ClientInfo = ClientInfo {
    client_url: "https://android.tv.twitch.tv",
    client_id: "ue6666qo983tsx6so1t0vnawi233wa",
    user_agents: &[
        "Mozilla/5.0 (Linux; Android 7.1; Smart Box C1) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    ],
};

impl ClientKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 4] = [Self::Web, Self::MobileWeb, Self::AndroidApp, Self::Smartbox];

    #[must_use]
    pub fn info(self) -> &'static ClientInfo {
        match self {
            Self::Web => &WEB,
            Self::MobileWeb => &MOBILE_WEB,
            Self::AndroidApp => &ANDROID_APP,
            Self::Smartbox => &SMARTBOX,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::MobileWeb => "mobile-web",
            Self::AndroidApp => "android-app",
            Self::Smartbox => "smartbox",
        }
    }
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized client kind name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown client kind: {0}")]
pub struct UnknownClientKind(pub String);

impl FromStr for ClientKind {
    type Err = UnknownClientKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownClientKind(s.to_string()))
    }
}

impl ClientInfo {
    /// Picks a user agent from the pool using `rng`.
    ///
    /// Single-entry pools always return that entry.
    pub fn user_agent_with<R: Rng + ?Sized>(&self, rng: &mut R) -> &'static str {
        self.user_agents.choose(rng).copied().unwrap_or_default()
    }

    /// Picks a user agent using the thread-local RNG.
    #[must_use]
    pub fn user_agent(&self) -> &'static str {
        self.user_agent_with(&mut rand::rng())
    }
}
