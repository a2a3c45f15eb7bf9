use clap::Parser;

/// Handler run for each notification when `--command` is not given.
pub const DEFAULT_COMMAND: &str = "~/.config/notifd.sh";

/// Struct that gets generated from `RawOpt`.
#[derive(Debug, PartialEq, Eq)]
pub struct Opt {
    pub log_debug: bool,
    pub command: String,
}

#[derive(Parser, Debug, PartialEq, Eq)]
#[command(name = "notifd", version, about)]
struct RawOpt {
    /// Write out debug logs.
    #[arg(long = "debug")]
    log_debug: bool,

    /// Shell command run in the background for each notification, with the
    /// notification content passed in NOTIF_* environment variables.
    #[arg(short, long, default_value = DEFAULT_COMMAND)]
    command: String,
}

impl Opt {
    pub fn from_env() -> Self {
        let raw = RawOpt::parse();
        raw.into()
    }
}

impl From<RawOpt> for Opt {
    fn from(other: RawOpt) -> Self {
        let RawOpt { log_debug, command } = other;
        Opt { log_debug, command }
    }
}
