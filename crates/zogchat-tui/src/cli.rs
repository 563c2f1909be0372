use std::path::PathBuf;

use clap::Parser;
use zogchat_app::session::Role;
use zogchat_core::config::Config;
use zogchat_core::share_link::{ShareLink, ShareLinkError};

#[derive(Parser, Debug)]
#[command(name = "zogchat")]
#[command(version)]
#[command(about = "Peer-to-peer terminal chat with file sharing")]
pub struct Args {
    /// Share link to join. Omit to create a new session.
    pub link: Option<String>,

    /// Directory holding chat.toml (defaults to the platform config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Port to listen on when creating a session (0 picks a free port)
    #[arg(long)]
    pub port: Option<u16>,

    /// Pre-fill the display name
    #[arg(long)]
    pub name: Option<String>,
}

impl Args {
    /// Creator without a link, guest with one.
    pub fn role(&self) -> Result<Role, ShareLinkError> {
        match &self.link {
            Some(link) => Ok(Role::from_share_link(ShareLink::parse(link)?)),
            None => Ok(Role::Creator),
        }
    }

    /// Apply command line overrides on top of the loaded config.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.transport.listen_port = port;
        }
        if let Some(name) = &self.name {
            config.identity.default_username = name.trim().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_link_means_creator() {
        let args = Args::parse_from(["zogchat"]);
        assert_eq!(args.role().unwrap(), Role::Creator);
    }

    #[test]
    fn link_means_guest() {
        let args = Args::parse_from([
            "zogchat",
            "zogchat://join?session=ws%3A%2F%2F10.0.0.2%3A9470%2Fabc&inviter=Ana",
        ]);
        assert_eq!(
            args.role().unwrap(),
            Role::Guest {
                session_id: "ws://10.0.0.2:9470/abc".into(),
                inviter: Some("Ana".into()),
            }
        );
    }

    #[test]
    fn link_without_session_is_an_error() {
        let args = Args::parse_from(["zogchat", "zogchat://join?inviter=Ana"]);
        assert!(args.role().is_err());
    }

    #[test]
    fn overrides_replace_config_values() {
        let args = Args::parse_from(["zogchat", "--port", "0", "--name", " Bob "]);
        let mut config = Config::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.transport.listen_port, 0);
        assert_eq!(config.identity.default_username, "Bob");
    }
}
