use cachet_config::BuildMode;
use clap::ValueEnum;

/// Build mode selected on the command line
#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum ModeArg {
    /// Stable file names, readable module ids, injected styles
    #[value(name = "development", alias = "dev")]
    Development,

    /// Content-hashed file names, hashed module ids, extracted styles
    #[value(name = "production", alias = "release", alias = "prod")]
    Production,
}

impl From<ModeArg> for BuildMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Development => BuildMode::Development,
            ModeArg::Production => BuildMode::Release,
        }
    }
}
