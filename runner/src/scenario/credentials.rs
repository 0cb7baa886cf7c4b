//! Credential pool and per-iteration selection strategies

use indexmap::IndexMap;
use rand::SeedableRng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand_chacha::ChaCha8Rng;
use reqwest::header::{HeaderName, HeaderValue};
use std::fmt;

use super::types::{ConfigError, Role};

/// Header the PVZ service reads tokens from
pub const DEFAULT_AUTH_HEADER: &str = "auth-x";
pub const DEFAULT_AUTH_SCHEME: &str = "Bearer";

/// A role-bound bearer token attached to every request of an iteration.
///
/// The token is opaque: it is never decoded or validated here.
#[derive(Clone, PartialEq, Eq)]
pub struct RequestCredential {
    header_name: String,
    scheme: String,
    token: String,
    role: Role,
}

impl RequestCredential {
    pub fn new(header_name: impl Into<String>, token: impl Into<String>, role: Role) -> Self {
        Self {
            header_name: header_name.into(),
            scheme: DEFAULT_AUTH_SCHEME.to_string(),
            token: token.into(),
            role,
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Full header value, e.g. `Bearer <token>`
    pub fn header_value(&self) -> String {
        if self.scheme.is_empty() {
            self.token.clone()
        } else {
            format!("{} {}", self.scheme, self.token)
        }
    }
}

// Tokens stay out of logs
impl fmt::Debug for RequestCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCredential")
            .field("header_name", &self.header_name)
            .field("scheme", &self.scheme)
            .field("token", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// How a credential is picked for each iteration
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionStrategy {
    /// Always the same role
    Static(Role),
    /// Cycle through the pool by iteration index
    RoundRobin,
    /// Weighted draw, seeded per iteration index
    Weighted { weights: Vec<(Role, u32)>, seed: u64 },
}

impl Default for SelectionStrategy {
    fn default() -> Self {
        SelectionStrategy::Static(Role::Moderator)
    }
}

#[derive(Debug, Clone)]
enum Selector {
    Fixed(usize),
    RoundRobin,
    Weighted {
        dist: WeightedIndex<u32>,
        slots: Vec<usize>,
        seed: u64,
    },
}

/// Role-to-credential mapping with a selection strategy.
///
/// Selection is a pure function of the iteration index, so repeated runs
/// attach the same token to the same iteration.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    credentials: Vec<RequestCredential>,
    strategy: SelectionStrategy,
    selector: Selector,
}

impl CredentialPool {
    pub fn new(
        credentials: impl IntoIterator<Item = RequestCredential>,
        strategy: SelectionStrategy,
    ) -> Result<Self, ConfigError> {
        // One credential per role, last one wins
        let by_role: IndexMap<Role, RequestCredential> =
            credentials.into_iter().map(|c| (c.role, c)).collect();
        if by_role.is_empty() {
            return Err(ConfigError::EmptyCredentialPool);
        }

        for credential in by_role.values() {
            HeaderName::from_bytes(credential.header_name.as_bytes())
                .map_err(|_| ConfigError::InvalidHeader(credential.header_name.clone()))?;
            // The error names the role only, never the token
            HeaderValue::from_str(&credential.header_value())
                .map_err(|_| ConfigError::InvalidHeaderValue(credential.role))?;
        }

        let selector = match &strategy {
            SelectionStrategy::Static(role) => {
                let idx = by_role
                    .get_index_of(role)
                    .ok_or(ConfigError::MissingCredential(*role))?;
                Selector::Fixed(idx)
            }
            SelectionStrategy::RoundRobin => Selector::RoundRobin,
            SelectionStrategy::Weighted { weights, seed } => {
                let mut slots = Vec::with_capacity(weights.len());
                let mut values = Vec::with_capacity(weights.len());
                for (role, weight) in weights {
                    let idx = by_role
                        .get_index_of(role)
                        .ok_or(ConfigError::MissingCredential(*role))?;
                    slots.push(idx);
                    values.push(*weight);
                }
                let dist = WeightedIndex::new(values).map_err(|_| ConfigError::ZeroWeights)?;
                Selector::Weighted {
                    dist,
                    slots,
                    seed: *seed,
                }
            }
        };

        Ok(Self {
            credentials: by_role.into_values().collect(),
            strategy,
            selector,
        })
    }

    /// Pick the credential for the given iteration
    pub fn select(&self, iteration: u64) -> &RequestCredential {
        let idx = match &self.selector {
            Selector::Fixed(idx) => *idx,
            Selector::RoundRobin => (iteration % self.credentials.len() as u64) as usize,
            Selector::Weighted { dist, slots, seed } => {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(iteration));
                slots[dist.sample(&mut rng)]
            }
        };
        &self.credentials[idx]
    }

    pub fn get(&self, role: Role) -> Option<&RequestCredential> {
        self.credentials.iter().find(|c| c.role == role)
    }

    pub fn strategy(&self) -> &SelectionStrategy {
        &self.strategy
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}
