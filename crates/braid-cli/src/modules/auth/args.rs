use clap::Args;

#[derive(Args)]
pub struct LoginArgs {
    /// Platform URL; cloud login when omitted.
    #[arg(long)]
    pub url: Option<String>,
    /// Account email; prompted for when omitted.
    #[arg(long)]
    pub username: Option<String>,
}

#[derive(Args)]
pub struct LogoutArgs {}
