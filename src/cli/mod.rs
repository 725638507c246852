use tracing_subscriber::EnvFilter;

#[derive(clap::Parser)]
#[clap(version, about = "Serve SVG cards of GitHub repositories")]
pub struct Args {
    #[clap(subcommand)]
    pub cmd: Cmd,
}

impl Args {
    pub fn run(self) {
        let res = match self.cmd {
            Cmd::Serve(cmd) => cmd.run(),
        };

        if let Err(err) = res {
            eprintln!("Error: {:?}", err);
            std::process::exit(1);
        }
    }
}

#[derive(clap::Subcommand)]
pub enum Cmd {
    /// Run the HTTP server.
    Serve(CmdServe),
}

#[derive(clap::Parser)]
pub struct CmdServe {
    #[clap(long, env = "PORT", default_value_t = repopin::server::DEFAULT_PORT)]
    port: u16,

    /// Github token to use for Github API requests.
    #[clap(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Base url of the Github REST API.
    #[clap(long, env = "GITHUB_API_URL", default_value = repopin::source::github::DEFAULT_API_URL)]
    github_api_url: String,
}

impl CmdServe {
    #[tokio::main]
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(filter).init();

        if self.github_token.is_none() {
            tracing::warn!("GITHUB_TOKEN not set, Github API requests are unauthenticated");
        }

        repopin::server::CtxBuilder::new()
            .github_token(self.github_token)
            .github_api_url(self.github_api_url)
            .build()?
            .run_server(self.port)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn test_serve_args() {
        let args = Args::try_parse_from([
            "repopin",
            "serve",
            "--port",
            "8080",
            "--github-api-url",
            "http://localhost:9999",
        ])
        .unwrap();

        let Cmd::Serve(cmd) = args.cmd;
        assert_eq!(cmd.port, 8080);
        assert_eq!(cmd.github_api_url, "http://localhost:9999");
    }
}
