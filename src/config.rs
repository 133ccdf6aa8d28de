use std::net::SocketAddr;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_REDIRECTS: usize = 5;
pub const DEFAULT_PLATFORM_DOMAIN: &str = "kuaishou.com";

#[derive(Clone, Debug)]
pub struct Config {
  pub listen_addr: SocketAddr,
  pub max_redirects: usize,
  pub platform_domain: String,
  /// Let the relay reach loopback, private and link-local addresses.
  pub relay_private_hosts: bool,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      listen_addr: DEFAULT_LISTEN_ADDR.parse().expect("valid default address"),
      max_redirects: DEFAULT_MAX_REDIRECTS,
      platform_domain: DEFAULT_PLATFORM_DOMAIN.to_owned(),
      relay_private_hosts: false,
    }
  }
}

impl Config {
  pub fn from_env() -> Self {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
    let default = Self::default();

    let listen_addr = lookup("LISTEN_ADDR")
      .and_then(|s| s.parse::<SocketAddr>().ok())
      .unwrap_or(default.listen_addr);
    let max_redirects = lookup("MAX_REDIRECTS")
      .and_then(|s| s.parse::<usize>().ok())
      .unwrap_or(default.max_redirects);
    let platform_domain = lookup("PLATFORM_DOMAIN")
      .map(|s| s.trim().trim_start_matches('.').to_ascii_lowercase())
      .filter(|s| !s.is_empty())
      .unwrap_or(default.platform_domain);
    let relay_private_hosts = lookup("RELAY_ALLOW_PRIVATE")
      .map(|s| matches!(s.trim(), "1" | "true" | "yes"))
      .unwrap_or(default.relay_private_hosts);

    Self {
      listen_addr,
      max_redirects,
      platform_domain,
      relay_private_hosts,
    }
  }
}
