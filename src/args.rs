use argh::FromArgs;
use std::path::PathBuf;

#[derive(FromArgs, Debug, Default)]
/// Log heart rate samples to CSV and keep rolling statistics
pub struct TopLevelCmd {
    /// specify config file path, creates file if it doesn't exist
    #[argh(option, short = 'c')]
    pub config_override: Option<PathBuf>,
    /// config file must exist, including "config_override" files
    #[argh(switch, short = 'r')]
    pub config_required: bool,
    /// use config file as-is (don't save over it)
    #[argh(switch, short = 'n')]
    pub no_save: bool,
    #[argh(subcommand)]
    pub subcommands: Option<SubCommands>,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
pub enum SubCommands {
    Simulate(SimulateCmd),
    Live(LiveCmd),
    Scan(ScanCmd),
    Collect(CollectCmd),
    Stats(StatsCmd),
}

/// generate simulated readings (default when no subcommand is given)
#[derive(FromArgs, Debug, Default)]
#[argh(subcommand, name = "simulate")]
pub struct SimulateCmd {
    /// stop after this many seconds, otherwise runs until Ctrl-C
    #[argh(option, short = 'd')]
    pub duration: Option<u64>,
}

/// record readings from a BLE device with the HR Measure characteristic
#[derive(FromArgs, Debug, Default)]
#[argh(subcommand, name = "live")]
pub struct LiveCmd {
    /// name or address of the device, otherwise uses config's device
    #[argh(option)]
    pub device: Option<String>,
    /// stop after this many seconds, otherwise runs until Ctrl-C
    #[argh(option, short = 'd')]
    pub duration: Option<u64>,
}

/// list nearby BLE devices
#[derive(FromArgs, Debug, Default)]
#[argh(subcommand, name = "scan")]
pub struct ScanCmd {
    /// how long to scan for, otherwise uses config's scan length
    #[argh(option, short = 's')]
    pub seconds: Option<u64>,
}

/// collect readings for a set time, then save and share the CSV
#[derive(FromArgs, Debug, Default)]
#[argh(subcommand, name = "collect")]
pub struct CollectCmd {
    /// length of the collection window, otherwise uses config's length
    #[argh(option, short = 's')]
    pub seconds: Option<u32>,
    /// name or address of a BLE device to collect from instead of simulating
    #[argh(option)]
    pub device: Option<String>,
    /// open the CSV with the system's default handler when done
    #[argh(switch)]
    pub open: bool,
    /// copy the finished CSV to this path
    #[argh(option, short = 'o')]
    pub output: Option<PathBuf>,
}

/// print statistics for the most recent readings stored in the CSV
#[derive(FromArgs, Debug, Default)]
#[argh(subcommand, name = "stats")]
pub struct StatsCmd {
    /// number of trailing readings to use, otherwise uses config's window
    #[argh(option, short = 'w')]
    pub window: Option<usize>,
    /// print as JSON
    #[argh(switch)]
    pub json: bool,
}
