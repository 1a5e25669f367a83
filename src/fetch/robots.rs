//! robots.txt fetching, caching, and evaluation.
//!
//! One [`RobotsPolicy`] per origin (scheme + host), fetched lazily on the
//! first request to that origin and cached for the process lifetime. A
//! robots.txt that cannot be fetched or read degrades to allow-all with a
//! logged warning; crawling proceeds.
//!
//! Rule evaluation follows the common longest-match convention: the group
//! whose user-agent token best matches ours applies (falling back to `*`),
//! and within the group the longest matching path prefix wins, with `Allow`
//! beating `Disallow` at equal length. An empty `Disallow:` means
//! unrestricted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tracing::{debug, warn};
use url::Url;

/// One `Allow`/`Disallow` rule.
#[derive(Debug, Clone)]
struct Rule {
    allow: bool,
    path: String,
}

/// A group of rules applying to one or more user-agent tokens.
#[derive(Debug, Clone)]
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
}

/// Parsed robots rules for a single origin.
#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    groups: Vec<Group>,
}

impl RobotsPolicy {
    /// An empty policy permits everything; used when robots.txt is missing
    /// or unreadable.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parse a robots.txt body. Unknown directives are ignored.
    pub fn parse(body: &str) -> Self {
        let mut groups: Vec<Group> = Vec::new();
        let mut current: Option<Group> = None;
        // True while consecutive User-agent lines extend the same group.
        let mut collecting_agents = false;

        for line in body.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_ascii_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    if !collecting_agents {
                        if let Some(group) = current.take() {
                            groups.push(group);
                        }
                        current = Some(Group {
                            agents: Vec::new(),
                            rules: Vec::new(),
                        });
                        collecting_agents = true;
                    }
                    if let Some(group) = current.as_mut() {
                        group.agents.push(value.to_ascii_lowercase());
                    }
                }
                "allow" | "disallow" => {
                    collecting_agents = false;
                    if let Some(group) = current.as_mut() {
                        if value.is_empty() {
                            // "Disallow:" with no path restricts nothing.
                            continue;
                        }
                        group.rules.push(Rule {
                            allow: field == "allow",
                            path: value.to_string(),
                        });
                    }
                }
                _ => {
                    collecting_agents = false;
                }
            }
        }
        if let Some(group) = current.take() {
            groups.push(group);
        }
        Self { groups }
    }

    /// Whether `user_agent` may fetch `path` under this policy.
    pub fn allows(&self, user_agent: &str, path: &str) -> bool {
        let Some(group) = self.group_for(user_agent) else {
            return true;
        };
        let mut verdict = true;
        let mut matched_len = 0usize;
        for rule in &group.rules {
            if path.starts_with(rule.path.as_str()) {
                let len = rule.path.len();
                if len > matched_len || (len == matched_len && rule.allow) {
                    matched_len = len;
                    verdict = rule.allow;
                }
            }
        }
        verdict
    }

    /// Most specific group for the user agent: the longest agent token
    /// contained in the UA string, else the `*` group.
    fn group_for(&self, user_agent: &str) -> Option<&Group> {
        let ua = user_agent.to_ascii_lowercase();
        let mut best: Option<(&Group, usize)> = None;
        for group in &self.groups {
            for agent in &group.agents {
                let specificity = if agent == "*" {
                    Some(0)
                } else if ua.contains(agent.as_str()) {
                    Some(agent.len())
                } else {
                    None
                };
                if let Some(s) = specificity {
                    if best.map_or(true, |(_, b)| s > b) {
                        best = Some((group, s));
                    }
                }
            }
        }
        best.map(|(g, _)| g)
    }
}

/// Per-origin robots.txt cache with lazy fetch.
#[derive(Debug)]
pub struct RobotsGate {
    client: reqwest::Client,
    policies: StdMutex<HashMap<String, Arc<RobotsPolicy>>>,
}

impl RobotsGate {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            policies: StdMutex::new(HashMap::new()),
        }
    }

    /// Whether `user_agent` may fetch `url`. Fetches and caches the origin's
    /// robots.txt on first use; fetch failures allow with a warning.
    pub async fn allowed(&self, url: &Url, user_agent: &str) -> bool {
        let origin = format!(
            "{}://{}",
            url.scheme(),
            url.host_str().unwrap_or_default()
        );
        let policy = self.policy_for(&origin).await;
        let path = match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        };
        let verdict = policy.allows(user_agent, &path);
        if !verdict {
            debug!(%url, "robots.txt disallows");
        }
        verdict
    }

    async fn policy_for(&self, origin: &str) -> Arc<RobotsPolicy> {
        if let Some(policy) = self
            .policies
            .lock()
            .expect("robots cache poisoned")
            .get(origin)
        {
            return policy.clone();
        }

        let robots_url = format!("{origin}/robots.txt");
        let policy = match self.fetch_robots(&robots_url).await {
            Some(body) => Arc::new(RobotsPolicy::parse(&body)),
            None => {
                warn!(url = %robots_url, "failed to read robots.txt; allowing all");
                Arc::new(RobotsPolicy::allow_all())
            }
        };

        self.policies
            .lock()
            .expect("robots cache poisoned")
            .entry(origin.to_string())
            .or_insert(policy)
            .clone()
    }

    async fn fetch_robots(&self, robots_url: &str) -> Option<String> {
        let response = self.client.get(robots_url).send().await.ok()?;
        let response = response.error_for_status().ok()?;
        response.text().await.ok()
    }
}
